use std::path::Path;

use crate::index::frame_index::FrameIndex;
use crate::shared::device::DeviceContext;
use crate::shared::error::VideoError;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::frame_decoder::FrameDecoder;
use crate::video::infrastructure::ffmpeg_decoder::FfmpegDecoder;

/// Random-access reader over one video file.
///
/// Owns the decoder backend and the frame index built at construction.
/// `current_position` always names the ordinal the next [`next_frame`]
/// call returns; it equals `frame_count` once the stream is exhausted.
///
/// Seeking comes in two flavors: [`seek`] repositions to the nearest key
/// frame at or before the target for near-zero cost, [`seek_accurate`]
/// additionally decodes forward to the exact ordinal. Codecs can only
/// reconstruct an intermediate frame by decoding from the preceding key
/// frame, so exactness is paid for in decode work.
///
/// [`next_frame`]: VideoReader::next_frame
/// [`seek`]: VideoReader::seek
/// [`seek_accurate`]: VideoReader::seek_accurate
pub struct VideoReader {
    decoder: Box<dyn FrameDecoder>,
    index: FrameIndex,
    metadata: VideoMetadata,
    current_position: u64,
    // false whenever the demuxer position no longer matches
    // `current_position` (skip past the end, or a decode failure that
    // consumed a packet); the next real seek re-syncs
    synced: bool,
}

impl VideoReader {
    /// Opens `path` with the FFmpeg backend. `target` rescales decoded
    /// frames to `(width, height)`; `None` keeps the native size.
    pub fn open(
        path: &Path,
        device: DeviceContext,
        target: Option<(u32, u32)>,
    ) -> Result<Self, VideoError> {
        if let DeviceContext::Cuda(id) = device {
            return Err(VideoError::Configuration(format!(
                "CUDA decode (device {id}) is not supported by the FFmpeg backend"
            )));
        }
        Self::from_decoder(Box::new(FfmpegDecoder::new(target)), path)
    }

    /// Builds a reader on top of any decoder backend. Opens the file,
    /// runs the demux-only index scan, and positions at ordinal 0.
    pub fn from_decoder(
        mut decoder: Box<dyn FrameDecoder>,
        path: &Path,
    ) -> Result<Self, VideoError> {
        let metadata = decoder.open(path)?;
        let packets = decoder.scan_index()?;
        let index = FrameIndex::build(packets)?;

        log::debug!(
            "{}: {} frames, {} key frames",
            path.display(),
            index.frame_count(),
            index.key_indices().len()
        );

        Ok(Self {
            decoder,
            index,
            metadata,
            current_position: 0,
            synced: true,
        })
    }

    pub fn frame_count(&self) -> u64 {
        self.index.frame_count()
    }

    /// Ordered key-frame ordinals, for planning approximate seeks.
    pub fn key_indices(&self) -> &[u64] {
        self.index.key_indices()
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Ordinal of the frame the next `next_frame` call returns.
    pub fn current_position(&self) -> u64 {
        self.current_position
    }

    fn indexed_pts(&self, ordinal: u64) -> Result<i64, VideoError> {
        self.index
            .entry(ordinal)
            .map(|e| e.pts)
            .ok_or(VideoError::EndOfStream)
    }

    /// Decodes and returns the frame at `current_position`, advancing by
    /// one. Fails with `EndOfStream` at the end of the file; any decode
    /// failure leaves the position at the last successful ordinal and
    /// forces the next seek through the demuxer, since the backend has
    /// already consumed the failed frame's packet.
    pub fn next_frame(&mut self) -> Result<Frame, VideoError> {
        if self.current_position >= self.frame_count() {
            return Err(VideoError::EndOfStream);
        }
        let target_pts = self.indexed_pts(self.current_position)?;

        loop {
            let decoded = match self.decoder.decode_next() {
                Ok(decoded) => decoded,
                Err(VideoError::EndOfStream) => {
                    // the index says this frame exists; the demuxer disagrees
                    self.synced = false;
                    return Err(VideoError::Decode(format!(
                        "stream ended before indexed frame {}",
                        self.current_position
                    )));
                }
                Err(e) => {
                    self.synced = false;
                    return Err(e);
                }
            };

            // pre-roll from a demuxer landing before the requested key frame
            if decoded.pts < target_pts {
                continue;
            }
            if decoded.pts > target_pts {
                // the stream skipped past the frame we are positioned on;
                // returning this frame would mislabel every ordinal that
                // follows
                self.synced = false;
                return Err(VideoError::Decode(format!(
                    "decoder out of sync at frame {}: expected pts {}, got {}",
                    self.current_position, target_pts, decoded.pts
                )));
            }

            let frame = Frame::new(
                decoded.pixels,
                decoded.width,
                decoded.height,
                3,
                self.current_position,
                decoded.pts,
            );
            self.current_position += 1;
            return Ok(frame);
        }
    }

    /// Approximate seek: repositions to the nearest key frame at or before
    /// `pos` without decoding anything. `current_position` ends on that
    /// key frame's ordinal, not on `pos`. `Ok(false)` when `pos` is
    /// outside `[0, frame_count)`; the position is left untouched.
    pub fn seek(&mut self, pos: i64) -> Result<bool, VideoError> {
        if !self.index.contains(pos) {
            return Ok(false);
        }
        let key = self.index.key_at_or_before(pos as u64);
        let pts = self.indexed_pts(key)?;
        self.decoder.seek_to_pts(pts)?;
        self.current_position = key;
        self.synced = true;
        Ok(true)
    }

    /// Exact seek: `seek` to the preceding key frame, then decode-and-
    /// discard until `current_position == pos`. When `pos` lies ahead of
    /// the current position with no key frame in between, the demuxer seek
    /// is skipped entirely and the reader just decodes forward.
    pub fn seek_accurate(&mut self, pos: i64) -> Result<bool, VideoError> {
        if !self.index.contains(pos) {
            return Ok(false);
        }
        let pos = pos as u64;
        if self.synced && pos == self.current_position {
            return Ok(true);
        }

        let key = self.index.key_at_or_before(pos);
        let sequential =
            self.synced && pos >= self.current_position && key <= self.current_position;
        if !sequential {
            self.seek(pos as i64)?;
        }

        while self.current_position < pos {
            self.next_frame()?;
        }
        Ok(true)
    }

    /// Advances the position by `n` frames without handing any frame out.
    /// `n <= 0` is a no-op; running past the last frame parks the reader
    /// at end of stream without decode cost. Skips that stay in range use
    /// the cheapest path `seek_accurate` can find.
    pub fn skip_frames(&mut self, n: i64) -> Result<(), VideoError> {
        if n <= 0 {
            return Ok(());
        }
        let target = self.current_position.saturating_add(n as u64);
        if target >= self.frame_count() {
            self.current_position = self.frame_count();
            self.synced = false;
            return Ok(());
        }
        self.seek_accurate(target as i64)?;
        Ok(())
    }
}

impl Drop for VideoReader {
    fn drop(&mut self) {
        self.decoder.close();
    }
}
