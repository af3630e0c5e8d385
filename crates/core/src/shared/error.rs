use thiserror::Error;

/// Errors surfaced by readers, schedulers, and loaders.
///
/// Out-of-range seek positions are not errors: `seek`/`seek_accurate`
/// return `Ok(false)` so callers can probe boundaries cheaply.
#[derive(Error, Debug)]
pub enum VideoError {
    /// The container/codec library failed.
    #[error("decoder backend error: {0}")]
    Backend(#[from] ffmpeg_next::Error),

    /// The stream produced no usable frame data (corrupt packet, empty
    /// container, indexed frame missing from the decode stream).
    #[error("decode failed: {0}")]
    Decode(String),

    /// `next_frame` called with the reader positioned past the last frame.
    /// Recoverable: any in-range seek repositions the reader.
    #[error("end of stream")]
    EndOfStream,

    /// `next` called after the last complete batch of the pass.
    #[error("end of pass")]
    EndOfPass,

    /// Rejected at construction, before any file is opened or worker spawned.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}
