use std::path::PathBuf;

/// Stream-level facts reported by the decoder backend at open time.
///
/// `total_frames` is the container's own frame count and may be zero for
/// formats that do not record it; the authoritative count comes from the
/// packet index built afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: u64,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}
