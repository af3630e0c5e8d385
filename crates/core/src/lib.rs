//! Frame-accurate random access into compressed video files and a batched,
//! multi-threaded prefetch pipeline for machine-learning consumers.
//!
//! [`reader::video_reader::VideoReader`] gives exact, index-driven seeks into
//! a single file; [`loader::video_loader::VideoLoader`] turns one or more
//! files into an ordered stream of fixed-shape batches.

pub mod index;
pub mod loader;
pub mod reader;
pub mod shared;
pub mod video;
