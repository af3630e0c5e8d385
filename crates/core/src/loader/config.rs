use std::path::PathBuf;

use crate::loader::batch::BatchShape;
use crate::shared::device::DeviceContext;
use crate::shared::error::VideoError;

/// Loader configuration; immutable once a loader is built around it.
/// `reset()` restarts iteration under the same configuration.
#[derive(Clone, Debug)]
pub struct LoaderConfig {
    pub filenames: Vec<PathBuf>,
    pub device: DeviceContext,
    pub batch_size: usize,
    pub height: u32,
    pub width: u32,
    pub channels: u8,
    /// Step between sampled ordinals within a file.
    pub interval: u64,
    /// First sampled ordinal within each file.
    pub skip: u64,
    pub shuffle: bool,
    /// Fixed seed makes shuffled passes reproducible; `None` draws a fresh
    /// permutation each pass.
    pub seed: Option<u64>,
    /// Completed batches buffered ahead of the consumer.
    pub prefetch_depth: usize,
}

impl LoaderConfig {
    pub fn new<I, P>(filenames: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            filenames: filenames.into_iter().map(Into::into).collect(),
            device: DeviceContext::Cpu,
            batch_size: 1,
            height: 0,
            width: 0,
            channels: 3,
            interval: 1,
            skip: 0,
            shuffle: false,
            seed: None,
            prefetch_depth: 2,
        }
    }

    pub fn with_batch_shape(mut self, batch_size: usize, height: u32, width: u32) -> Self {
        self.batch_size = batch_size;
        self.height = height;
        self.width = width;
        self
    }

    pub fn with_sampling(mut self, interval: u64, skip: u64) -> Self {
        self.interval = interval;
        self.skip = skip;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_prefetch_depth(mut self, depth: usize) -> Self {
        self.prefetch_depth = depth;
        self
    }

    pub fn with_device(mut self, device: DeviceContext) -> Self {
        self.device = device;
        self
    }

    pub fn batch_shape(&self) -> BatchShape {
        BatchShape {
            batch_size: self.batch_size,
            height: self.height,
            width: self.width,
            channels: self.channels,
        }
    }

    /// Rejects invalid configurations before any file is opened or worker
    /// thread spawned.
    pub fn validate(&self) -> Result<(), VideoError> {
        fn invalid(msg: &str) -> Result<(), VideoError> {
            Err(VideoError::Configuration(msg.to_string()))
        }

        if self.filenames.is_empty() {
            return invalid("filename list is empty");
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be > 0");
        }
        if self.height == 0 || self.width == 0 {
            return invalid("batch height and width must be > 0");
        }
        if self.channels != 3 {
            return invalid("only 3-channel RGB batches are supported");
        }
        if self.interval == 0 {
            return invalid("interval must be >= 1");
        }
        if self.prefetch_depth == 0 {
            return invalid("prefetch_depth must be >= 1");
        }
        Ok(())
    }
}
