use std::path::Path;

use crate::shared::error::VideoError;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::frame_decoder::{DecodedFrame, FrameDecoder, PacketInfo};

/// Decodes video frames via ffmpeg-next (libavformat + libavcodec).
///
/// Every decoded frame is converted to RGB24, rescaled to the target size
/// when one is given, and stripped of stride padding.
pub struct FfmpegDecoder {
    input: Option<ffmpeg_next::format::context::Input>,
    decoder: Option<ffmpeg_next::decoder::Video>,
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    stream_index: usize,
    time_base: ffmpeg_next::Rational,
    target: Option<(u32, u32)>,
    out_width: u32,
    out_height: u32,
    flushing: bool,
    synthetic_pts: i64,
}

// Safety: FfmpegDecoder is only used from one thread at a time (the reader
// that owns it is behind a lock). The raw pointers inside ffmpeg types are
// never shared across threads.
unsafe impl Send for FfmpegDecoder {}

impl FfmpegDecoder {
    /// `target` is the output `(width, height)`; `None` keeps the native
    /// frame size.
    pub fn new(target: Option<(u32, u32)>) -> Self {
        Self {
            input: None,
            decoder: None,
            scaler: None,
            stream_index: 0,
            time_base: ffmpeg_next::Rational(0, 1),
            target,
            out_width: 0,
            out_height: 0,
            flushing: false,
            synthetic_pts: 0,
        }
    }

    fn not_open() -> VideoError {
        VideoError::Decode("decoder is not open".to_string())
    }

    /// Drains one frame from the codec if it has one ready.
    fn try_receive(&mut self) -> Result<Option<DecodedFrame>, VideoError> {
        let decoder = self.decoder.as_mut().ok_or_else(Self::not_open)?;
        let scaler = self.scaler.as_mut().ok_or_else(Self::not_open)?;

        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        scaler.run(&decoded, &mut rgb)?;

        let pixels = strip_stride_padding(&rgb, self.out_width, self.out_height);
        let pts = decoded
            .timestamp()
            .or(decoded.pts())
            .unwrap_or(self.synthetic_pts);
        self.synthetic_pts = pts + 1;

        Ok(Some(DecodedFrame {
            pixels,
            width: self.out_width,
            height: self.out_height,
            pts,
        }))
    }
}

impl FrameDecoder for FfmpegDecoder {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, VideoError> {
        ffmpeg_next::init()?;

        let ictx = ffmpeg_next::format::input(&path)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| VideoError::Decode("no video stream found".to_string()))?;

        let stream_index = stream.index();
        let time_base = stream.time_base();

        let codec_ctx =
            ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let (out_width, out_height) =
            self.target.unwrap_or((decoder.width(), decoder.height()));

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg_next::format::Pixel::RGB24,
            out_width,
            out_height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            total_frames: stream.frames().max(0) as u64,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };

        self.stream_index = stream_index;
        self.time_base = time_base;
        self.out_width = out_width;
        self.out_height = out_height;
        self.flushing = false;
        self.decoder = Some(decoder);
        self.scaler = Some(scaler);
        self.input = Some(ictx);

        log::debug!(
            "opened {} ({}x{} -> {}x{}, {:.2} fps)",
            path.display(),
            metadata.width,
            metadata.height,
            out_width,
            out_height,
            fps
        );

        Ok(metadata)
    }

    fn scan_index(&mut self) -> Result<Vec<PacketInfo>, VideoError> {
        let stream_index = self.stream_index;
        let mut packets = Vec::new();
        {
            let ictx = self.input.as_mut().ok_or_else(Self::not_open)?;
            let mut fallback_pts = 0i64;
            for (stream, packet) in ictx.packets() {
                if stream.index() != stream_index {
                    continue;
                }
                let pts = packet.pts().or(packet.dts()).unwrap_or(fallback_pts);
                fallback_pts = pts + 1;
                packets.push(PacketInfo {
                    pts,
                    byte_offset: packet.position() as i64,
                    is_key: packet.is_key(),
                });
            }
        }

        // The scan ran the demuxer to the end; land back on the first frame.
        let first_pts = packets.iter().map(|p| p.pts).min().unwrap_or(0);
        self.seek_to_pts(first_pts)?;

        log::debug!(
            "indexed {} packets ({} key frames)",
            packets.len(),
            packets.iter().filter(|p| p.is_key).count()
        );

        Ok(packets)
    }

    fn seek_to_pts(&mut self, pts: i64) -> Result<(), VideoError> {
        let ictx = self.input.as_mut().ok_or_else(Self::not_open)?;

        // avformat seeks take AV_TIME_BASE units when no stream is named.
        // The backward range (`..=ts`) lands on the key frame at or before
        // the requested timestamp; rounding low only costs extra pre-roll
        // that the caller's pts filter discards.
        let num = self.time_base.numerator() as f64;
        let den = self.time_base.denominator() as f64;
        let seconds = if den != 0.0 { pts as f64 * num / den } else { 0.0 };
        let ts = (seconds * f64::from(ffmpeg_next::ffi::AV_TIME_BASE)) as i64;
        ictx.seek(ts, ..ts)?;

        if let Some(decoder) = self.decoder.as_mut() {
            decoder.flush();
        }
        self.flushing = false;
        self.synthetic_pts = pts;
        Ok(())
    }

    fn decode_next(&mut self) -> Result<DecodedFrame, VideoError> {
        loop {
            if let Some(frame) = self.try_receive()? {
                return Ok(frame);
            }
            if self.flushing {
                return Err(VideoError::EndOfStream);
            }

            let next = {
                let ictx = self.input.as_mut().ok_or_else(Self::not_open)?;
                ictx.packets()
                    .next()
                    .map(|(stream, packet)| (stream.index(), packet))
            };

            match next {
                Some((index, packet)) if index == self.stream_index => {
                    let decoder = self.decoder.as_mut().ok_or_else(Self::not_open)?;
                    decoder.send_packet(&packet)?;
                }
                Some(_) => {}
                None => {
                    let decoder = self.decoder.as_mut().ok_or_else(Self::not_open)?;
                    let _ = decoder.send_eof();
                    self.flushing = true;
                }
            }
        }
    }

    fn close(&mut self) {
        self.scaler = None;
        self.decoder = None;
        self.input = None;
        self.flushing = false;
    }
}

/// Copies pixel data out of an ffmpeg frame into a tightly-packed RGB
/// buffer. ffmpeg rows may carry padding bytes (stride > width * 3).
fn strip_stride_padding(
    rgb: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb.stride(0);
    let data = rgb.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + w * 3]);
    }
    pixels
}
