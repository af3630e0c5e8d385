//! Test-only fixtures: a real encoded video on disk and a scripted decoder
//! backend with observable seek/decode counters.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::shared::error::VideoError;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::frame_decoder::{DecodedFrame, FrameDecoder, PacketInfo};

/// Grayscale level encoded into every pixel of test frame `i`. Chosen so
/// that lossy round-trips stay well clear of the neighboring frame's level.
pub(crate) fn test_frame_level(i: usize) -> u8 {
    ((i * 12) % 256) as u8
}

/// Encodes `num_frames` flat grayscale MPEG4 frames with a fixed GOP, so
/// key frames land at multiples of `gop`.
pub(crate) fn encode_test_video(
    path: &Path,
    num_frames: usize,
    width: u32,
    height: u32,
    fps: f64,
    gop: u32,
) {
    ffmpeg_next::init().unwrap();

    let mut octx = ffmpeg_next::format::output(&path).unwrap();

    let global_header = octx
        .format()
        .flags()
        .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

    let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
    let mut ost = octx.add_stream(Some(codec)).unwrap();

    let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
        .encoder()
        .video()
        .unwrap();

    encoder_ctx.set_width(width);
    encoder_ctx.set_height(height);
    encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
    encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps as i32));
    encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps as i32, 1)));
    encoder_ctx.set_gop(gop);
    encoder_ctx.set_bit_rate(2_000_000);

    if global_header {
        encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
    }

    let mut encoder = encoder_ctx
        .open_with(ffmpeg_next::Dictionary::new())
        .unwrap();
    ost.set_parameters(&encoder);

    octx.write_header().unwrap();

    let ost_time_base = octx.stream(0).unwrap().time_base();

    let mut scaler = ffmpeg_next::software::scaling::Context::get(
        ffmpeg_next::format::Pixel::RGB24,
        width,
        height,
        ffmpeg_next::format::Pixel::YUV420P,
        width,
        height,
        ffmpeg_next::software::scaling::Flags::BILINEAR,
    )
    .unwrap();

    for i in 0..num_frames {
        let mut rgb = ffmpeg_next::util::frame::video::Video::new(
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
        );
        let level = test_frame_level(i);
        let stride = rgb.stride(0);
        let data = rgb.data_mut(0);
        for row in 0..height as usize {
            for col in 0..width as usize {
                let offset = row * stride + col * 3;
                data[offset] = level;
                data[offset + 1] = level;
                data[offset + 2] = level;
            }
        }

        let mut yuv = ffmpeg_next::util::frame::video::Video::empty();
        scaler.run(&rgb, &mut yuv).unwrap();
        yuv.set_pts(Some(i as i64));

        encoder.send_frame(&yuv).unwrap();

        let mut encoded = ffmpeg_next::Packet::empty();
        while encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(0);
            // Without an explicit duration the mov muxer records the final
            // sample with duration 0 and the demuxer then drops it, so the
            // file would come back one frame short.
            encoded.set_duration(1);
            encoded.rescale_ts(ffmpeg_next::Rational(1, fps as i32), ost_time_base);
            encoded.write_interleaved(&mut octx).unwrap();
        }
    }

    encoder.send_eof().unwrap();
    let mut encoded = ffmpeg_next::Packet::empty();
    while encoder.receive_packet(&mut encoded).is_ok() {
        encoded.set_stream(0);
        encoded.set_duration(1);
        encoded.rescale_ts(ffmpeg_next::Rational(1, fps as i32), ost_time_base);
        encoded.write_interleaved(&mut octx).unwrap();
    }

    octx.write_trailer().unwrap();
}

/// Observable side of a [`ScriptedDecoder`]: how many demuxer seeks and
/// frame decodes the reader under test has triggered.
#[derive(Clone)]
pub(crate) struct ScriptedProbe {
    seeks: Arc<AtomicUsize>,
    decodes: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    pub fn seeks(&self) -> usize {
        self.seeks.load(Ordering::SeqCst)
    }

    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }
}

/// Deterministic in-memory decoder backend: frame `i` has pts `i`, key
/// frames every `key_interval` ordinals, and every pixel of frame `i`
/// carries the value `i % 251`.
pub(crate) struct ScriptedDecoder {
    frame_count: u64,
    key_interval: u64,
    width: u32,
    height: u32,
    cursor: i64,
    fail_at: Option<u64>,
    seeks: Arc<AtomicUsize>,
    decodes: Arc<AtomicUsize>,
}

impl ScriptedDecoder {
    pub fn new(frame_count: u64, key_interval: u64) -> Self {
        Self {
            frame_count,
            key_interval: key_interval.max(1),
            width: 8,
            height: 8,
            cursor: 0,
            fail_at: None,
            seeks: Arc::new(AtomicUsize::new(0)),
            decodes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Makes decoding the frame at `ordinal` fail with a decode error.
    pub fn with_failure_at(mut self, ordinal: u64) -> Self {
        self.fail_at = Some(ordinal);
        self
    }

    pub fn probe(&self) -> ScriptedProbe {
        ScriptedProbe {
            seeks: self.seeks.clone(),
            decodes: self.decodes.clone(),
        }
    }

    pub fn frame_value(ordinal: u64) -> u8 {
        (ordinal % 251) as u8
    }
}

impl FrameDecoder for ScriptedDecoder {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, VideoError> {
        Ok(VideoMetadata {
            width: self.width,
            height: self.height,
            fps: 30.0,
            total_frames: self.frame_count,
            codec: "scripted".to_string(),
            source_path: Some(path.to_path_buf()),
        })
    }

    fn scan_index(&mut self) -> Result<Vec<PacketInfo>, VideoError> {
        Ok((0..self.frame_count)
            .map(|i| PacketInfo {
                pts: i as i64,
                byte_offset: (i * 1000) as i64,
                is_key: i % self.key_interval == 0,
            })
            .collect())
    }

    fn seek_to_pts(&mut self, pts: i64) -> Result<(), VideoError> {
        self.seeks.fetch_add(1, Ordering::SeqCst);
        self.cursor = pts;
        Ok(())
    }

    fn decode_next(&mut self) -> Result<DecodedFrame, VideoError> {
        if self.cursor >= self.frame_count as i64 {
            return Err(VideoError::EndOfStream);
        }
        let ordinal = self.cursor as u64;
        self.cursor += 1;
        if self.fail_at == Some(ordinal) {
            return Err(VideoError::Decode(format!(
                "scripted failure at ordinal {ordinal}"
            )));
        }
        self.decodes.fetch_add(1, Ordering::SeqCst);
        let len = (self.width * self.height * 3) as usize;
        Ok(DecodedFrame {
            pixels: vec![Self::frame_value(ordinal); len],
            width: self.width,
            height: self.height,
            pts: ordinal as i64,
        })
    }

    fn close(&mut self) {}
}
