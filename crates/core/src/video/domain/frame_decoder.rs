use std::path::Path;

use crate::shared::error::VideoError;
use crate::shared::video_metadata::VideoMetadata;

/// One video packet as seen during the index scan. No pixel data; demux
/// cost only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketInfo {
    /// Presentation timestamp in the stream's time base (dts fallback when
    /// the container omits pts).
    pub pts: i64,
    /// Byte position of the packet in the file, -1 when unknown.
    pub byte_offset: i64,
    /// Whether the packet starts an independently decodable segment.
    pub is_key: bool,
}

/// One decoded picture in display order, before the reader assigns it an
/// ordinal.
#[derive(Clone, Debug)]
pub struct DecodedFrame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub pts: i64,
}

/// Boundary to the container/codec library.
///
/// The reader assumes nothing codec-specific beyond "decoding must start
/// from a key frame to reconstruct intermediate frames"; everything
/// format-dependent stays behind this trait.
pub trait FrameDecoder: Send {
    /// Opens the container and reports stream metadata.
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, VideoError>;

    /// One forward pass over the packet stream recording pts, byte offset,
    /// and key flag for every video packet. No frame is decoded. Leaves the
    /// demuxer repositioned at the start of the stream.
    fn scan_index(&mut self) -> Result<Vec<PacketInfo>, VideoError>;

    /// Repositions the demuxer at the key frame whose pts is `pts` (or the
    /// nearest one before it) and resets codec state. No decoding.
    fn seek_to_pts(&mut self, pts: i64) -> Result<(), VideoError>;

    /// Decodes the next frame in display order, or `EndOfStream`.
    fn decode_next(&mut self) -> Result<DecodedFrame, VideoError>;

    /// Releases codec and container resources.
    fn close(&mut self);
}
