pub mod batch;
pub mod config;
pub(crate) mod prefetch;
pub mod scheduler;
pub mod video_loader;
