use std::sync::Arc;

use parking_lot::Mutex;

use crate::loader::batch::Batch;
use crate::loader::config::LoaderConfig;
use crate::loader::prefetch::{PrefetchPipeline, SharedReader};
use crate::loader::scheduler::SampleScheduler;
use crate::reader::video_reader::VideoReader;
use crate::shared::error::VideoError;

/// Workers beyond this gain nothing: decoding is serialized per reader.
const MAX_WORKERS: usize = 4;

/// Turns one or more video files into an ordered stream of fixed-shape
/// batches.
///
/// Owns one reader per file, the sample scheduler, and the prefetch
/// pipeline. A pass emits `length()` complete batches; a trailing group of
/// coordinates smaller than `batch_size` is dropped by design, since
/// training pipelines require uniform batch shape.
pub struct VideoLoader {
    config: LoaderConfig,
    readers: Vec<SharedReader>,
    scheduler: SampleScheduler,
    pipeline: Option<PrefetchPipeline>,
    length: usize,
    emitted: usize,
}

impl VideoLoader {
    /// Validates the configuration, opens every file, and starts the
    /// prefetch pipeline. Any failure here aborts construction entirely;
    /// no partially built loader is returned.
    pub fn new(config: LoaderConfig) -> Result<Self, VideoError> {
        config.validate()?;

        let target = Some((config.width, config.height));
        let mut readers: Vec<SharedReader> = Vec::with_capacity(config.filenames.len());
        for path in &config.filenames {
            let reader = VideoReader::open(path, config.device, target)?;
            readers.push(Arc::new(Mutex::new(reader)));
        }

        let frame_counts: Vec<u64> = readers.iter().map(|r| r.lock().frame_count()).collect();
        let scheduler = SampleScheduler::new(
            &frame_counts,
            config.interval,
            config.skip,
            config.shuffle,
            config.seed,
        );
        let length = scheduler.len() / config.batch_size;

        log::info!(
            "loader over {} file(s): {} sampled frames, {} batches of {}",
            readers.len(),
            scheduler.len(),
            length,
            config.batch_size
        );

        let mut loader = Self {
            config,
            readers,
            scheduler,
            pipeline: None,
            length,
            emitted: 0,
        };
        loader.start_pipeline();
        Ok(loader)
    }

    fn start_pipeline(&mut self) {
        let schedule = Arc::new(self.scheduler.pass_order().to_vec());
        let workers = self.readers.len().min(MAX_WORKERS).max(1);
        self.pipeline = Some(PrefetchPipeline::spawn(
            self.readers.clone(),
            schedule,
            self.config.batch_shape(),
            self.config.prefetch_depth,
            workers,
        ));
    }

    /// Complete batches per pass: `floor(sampled frames / batch_size)`.
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn has_next(&self) -> bool {
        self.emitted < self.length
    }

    /// Blocks until the next in-order batch is ready. A decode failure
    /// inside a batch surfaces here as an error and consumes that batch's
    /// place in the pass; later batches are unaffected. `EndOfPass` once
    /// `has_next()` is false.
    pub fn next(&mut self) -> Result<Batch, VideoError> {
        if !self.has_next() {
            return Err(VideoError::EndOfPass);
        }
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or_else(|| VideoError::Decode("prefetch pipeline not running".to_string()))?;
        let result = pipeline.next_batch();
        self.emitted += 1;
        result
    }

    /// Restarts the pass: cancels and joins all in-flight prefetch work,
    /// reshuffles when configured, and spawns a fresh pipeline. Files are
    /// not reopened.
    pub fn reset(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.shutdown();
        }
        self.scheduler.reset();
        self.emitted = 0;
        self.start_pipeline();
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }
}

impl Drop for VideoLoader {
    fn drop(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.shutdown();
        }
    }
}
