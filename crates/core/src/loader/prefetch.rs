use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use ndarray::{Array4, ArrayView3, Axis};
use parking_lot::Mutex;

use crate::loader::batch::{Batch, BatchShape};
use crate::loader::scheduler::Coordinate;
use crate::reader::video_reader::VideoReader;
use crate::shared::error::VideoError;
use crate::shared::frame::Frame;

pub(crate) type SharedReader = Arc<Mutex<VideoReader>>;

/// Bounded producer/consumer pipeline that overlaps decoding with
/// consumption.
///
/// Workers claim schedule slots through a shared atomic cursor, decode
/// under the per-reader lock, and send `(slot, result)` into a bounded
/// channel. A single assembler restores schedule order with a slot-indexed
/// reorder buffer and an advancing emit cursor, packs frames into batches,
/// and pushes them into the bounded output queue. Batches therefore leave
/// in schedule order for any worker count, and a full output queue blocks
/// the producers rather than dropping or reordering.
pub(crate) struct PrefetchPipeline {
    output_rx: Receiver<Result<Batch, VideoError>>,
    cancelled: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
    assembler: JoinHandle<()>,
}

impl PrefetchPipeline {
    pub(crate) fn spawn(
        readers: Vec<SharedReader>,
        schedule: Arc<Vec<Coordinate>>,
        shape: BatchShape,
        prefetch_depth: usize,
        worker_count: usize,
    ) -> Self {
        let batch_count = schedule.len() / shape.batch_size.max(1);
        // trailing coordinates short of a full batch are never claimed
        let claim_limit = batch_count * shape.batch_size;
        let depth = prefetch_depth.max(1);

        // out-of-order arrivals are bounded by what fits in this channel
        // plus the frames in flight, so the reorder buffer stays small
        let (decoded_tx, decoded_rx) =
            bounded::<(usize, Result<Frame, VideoError>)>(depth * shape.batch_size.max(1));
        let (output_tx, output_rx) = bounded::<Result<Batch, VideoError>>(depth);

        let cancelled = Arc::new(AtomicBool::new(false));
        let claim = Arc::new(AtomicUsize::new(0));

        let workers = (0..worker_count.max(1))
            .map(|_| {
                let readers = readers.clone();
                let schedule = Arc::clone(&schedule);
                let decoded_tx = decoded_tx.clone();
                let cancelled = Arc::clone(&cancelled);
                let claim = Arc::clone(&claim);
                std::thread::spawn(move || {
                    run_worker(&readers, &schedule, claim_limit, &claim, &decoded_tx, &cancelled)
                })
            })
            .collect();
        drop(decoded_tx);

        let assembler = {
            let schedule = Arc::clone(&schedule);
            let cancelled = Arc::clone(&cancelled);
            std::thread::spawn(move || {
                run_assembler(decoded_rx, output_tx, &schedule, shape, batch_count, &cancelled)
            })
        };

        log::debug!(
            "prefetch pipeline up: {} slots, {} batches, {} workers, depth {}",
            claim_limit,
            batch_count,
            worker_count.max(1),
            depth
        );

        Self {
            output_rx,
            cancelled,
            workers,
            assembler,
        }
    }

    /// Blocks until the next in-order batch is ready. A closed channel
    /// means every batch of the pass has been handed out, so this reports
    /// `EndOfPass` rather than inventing a decode failure.
    pub(crate) fn next_batch(&self) -> Result<Batch, VideoError> {
        match self.output_rx.recv() {
            Ok(result) => result,
            Err(_) => Err(VideoError::EndOfPass),
        }
    }

    /// Cancels in-flight work and joins every thread. Nothing produced by
    /// this pipeline can be observed after this returns.
    pub(crate) fn shutdown(self) {
        let Self {
            output_rx,
            cancelled,
            workers,
            assembler,
        } = self;

        cancelled.store(true, Ordering::Relaxed);
        // dropping the receiver unblocks producers stuck on a full queue
        drop(output_rx);

        for worker in workers {
            let _ = worker.join();
        }
        let _ = assembler.join();
    }
}

fn run_worker(
    readers: &[SharedReader],
    schedule: &[Coordinate],
    claim_limit: usize,
    claim: &AtomicUsize,
    decoded_tx: &Sender<(usize, Result<Frame, VideoError>)>,
    cancelled: &AtomicBool,
) {
    loop {
        if cancelled.load(Ordering::Relaxed) {
            break;
        }
        let slot = claim.fetch_add(1, Ordering::Relaxed);
        if slot >= claim_limit {
            break;
        }
        let result = decode_coordinate(readers, schedule[slot]);
        if decoded_tx.send((slot, result)).is_err() {
            break;
        }
    }
}

fn decode_coordinate(
    readers: &[SharedReader],
    coord: Coordinate,
) -> Result<Frame, VideoError> {
    let reader = readers.get(coord.file_index as usize).ok_or_else(|| {
        VideoError::Decode(format!("no reader for file index {}", coord.file_index))
    })?;

    // one decode at a time per reader; the sequential case inside
    // seek_accurate costs no demuxer seek
    let mut reader = reader.lock();
    if !reader.seek_accurate(coord.frame_ordinal as i64)? {
        return Err(VideoError::Decode(format!(
            "frame ordinal {} out of range for file {}",
            coord.frame_ordinal, coord.file_index
        )));
    }
    reader.next_frame()
}

fn run_assembler(
    decoded_rx: Receiver<(usize, Result<Frame, VideoError>)>,
    output_tx: Sender<Result<Batch, VideoError>>,
    schedule: &[Coordinate],
    shape: BatchShape,
    batch_count: usize,
    cancelled: &AtomicBool,
) {
    let mut pending: HashMap<usize, Result<Frame, VideoError>> = HashMap::new();
    let mut open = OpenBatch::new(shape);
    let mut next_slot = 0usize;
    let mut emitted = 0usize;

    for (slot, result) in decoded_rx.iter() {
        if cancelled.load(Ordering::Relaxed) {
            break;
        }
        pending.insert(slot, result);

        while let Some(result) = pending.remove(&next_slot) {
            open.push(schedule[next_slot], result);
            next_slot += 1;

            if open.is_full() {
                emitted += 1;
                if output_tx.send(open.take()).is_err() {
                    return;
                }
                if emitted == batch_count {
                    return;
                }
            }
        }
    }
}

/// The batch currently being assembled, filled strictly in schedule order.
/// A decode failure poisons this batch only; frames already copied are
/// discarded with it.
struct OpenBatch {
    shape: BatchShape,
    data: Array4<u8>,
    coordinates: Vec<Coordinate>,
    error: Option<VideoError>,
}

impl OpenBatch {
    fn new(shape: BatchShape) -> Self {
        Self {
            shape,
            data: Array4::zeros(shape.dims()),
            coordinates: Vec::with_capacity(shape.batch_size),
            error: None,
        }
    }

    fn push(&mut self, coord: Coordinate, result: Result<Frame, VideoError>) {
        match result {
            Ok(frame) if self.error.is_none() => {
                match ArrayView3::from_shape(self.shape.frame_dims(), frame.data()) {
                    Ok(view) => {
                        self.data
                            .index_axis_mut(Axis(0), self.coordinates.len())
                            .assign(&view);
                    }
                    Err(_) => {
                        self.error = Some(VideoError::Decode(format!(
                            "frame {}:{} does not match the batch shape",
                            coord.file_index, coord.frame_ordinal
                        )));
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                if self.error.is_none() {
                    self.error = Some(e);
                }
            }
        }
        self.coordinates.push(coord);
    }

    fn is_full(&self) -> bool {
        self.coordinates.len() == self.shape.batch_size
    }

    fn take(&mut self) -> Result<Batch, VideoError> {
        let data = std::mem::replace(&mut self.data, Array4::zeros(self.shape.dims()));
        let coordinates = std::mem::take(&mut self.coordinates);
        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(Batch::new(data, coordinates)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_support::ScriptedDecoder;
    use std::path::Path;

    fn scripted_readers(files: &[(u64, u64)]) -> Vec<SharedReader> {
        files
            .iter()
            .map(|&(frames, key_interval)| {
                let decoder = ScriptedDecoder::new(frames, key_interval);
                let reader = VideoReader::from_decoder(
                    Box::new(decoder),
                    Path::new("scripted.mp4"),
                )
                .unwrap();
                Arc::new(Mutex::new(reader))
            })
            .collect()
    }

    fn sequential_schedule(files: &[(u64, u64)]) -> Arc<Vec<Coordinate>> {
        let mut coords = Vec::new();
        for (file_index, &(frames, _)) in files.iter().enumerate() {
            for ordinal in 0..frames {
                coords.push(Coordinate {
                    file_index: file_index as u32,
                    frame_ordinal: ordinal,
                });
            }
        }
        Arc::new(coords)
    }

    fn shape(batch_size: usize) -> BatchShape {
        BatchShape {
            batch_size,
            height: 8,
            width: 8,
            channels: 3,
        }
    }

    fn collect_coordinates(
        pipeline: &PrefetchPipeline,
        batches: usize,
    ) -> Vec<Vec<Coordinate>> {
        (0..batches)
            .map(|_| pipeline.next_batch().unwrap().coordinates().to_vec())
            .collect()
    }

    #[test]
    fn test_emits_batches_in_schedule_order() {
        let files = [(20, 5)];
        let schedule = sequential_schedule(&files);
        let pipeline = PrefetchPipeline::spawn(
            scripted_readers(&files),
            Arc::clone(&schedule),
            shape(4),
            2,
            1,
        );

        let batches = collect_coordinates(&pipeline, 5);
        let flat: Vec<Coordinate> = batches.into_iter().flatten().collect();
        assert_eq!(flat, schedule[..].to_vec());
        pipeline.shutdown();
    }

    #[test]
    fn test_order_identical_for_any_worker_count() {
        let files = [(20, 5), (20, 5)];
        let schedule = sequential_schedule(&files);

        let mut observed = Vec::new();
        for worker_count in 1..=4 {
            let pipeline = PrefetchPipeline::spawn(
                scripted_readers(&files),
                Arc::clone(&schedule),
                shape(4),
                2,
                worker_count,
            );
            observed.push(collect_coordinates(&pipeline, 10));
            pipeline.shutdown();
        }

        for other in &observed[1..] {
            assert_eq!(&observed[0], other);
        }
    }

    #[test]
    fn test_batch_pixels_match_their_coordinates() {
        let files = [(12, 3)];
        let pipeline = PrefetchPipeline::spawn(
            scripted_readers(&files),
            sequential_schedule(&files),
            shape(4),
            2,
            2,
        );

        for b in 0..3 {
            let batch = pipeline.next_batch().unwrap();
            for (row, coord) in batch.coordinates().iter().enumerate() {
                assert_eq!(coord.frame_ordinal, (b * 4 + row) as u64);
                assert_eq!(
                    batch.data()[[row, 0, 0, 0]],
                    ScriptedDecoder::frame_value(coord.frame_ordinal)
                );
            }
        }
        pipeline.shutdown();
    }

    #[test]
    fn test_decode_failure_poisons_only_its_batch() {
        let decoder = ScriptedDecoder::new(12, 1).with_failure_at(5);
        let reader =
            VideoReader::from_decoder(Box::new(decoder), Path::new("scripted.mp4")).unwrap();
        let readers = vec![Arc::new(Mutex::new(reader))];
        let files = [(12, 1)];
        let pipeline = PrefetchPipeline::spawn(
            readers,
            sequential_schedule(&files),
            shape(4),
            2,
            2,
        );

        assert!(pipeline.next_batch().is_ok()); // ordinals 0..4
        let poisoned = pipeline.next_batch(); // ordinals 4..8 contain 5
        assert!(matches!(poisoned, Err(VideoError::Decode(_))));
        assert!(pipeline.next_batch().is_ok()); // ordinals 8..12
        pipeline.shutdown();
    }

    #[test]
    fn test_trailing_partial_batch_never_decoded() {
        let files = [(10, 1)];
        let decoder = ScriptedDecoder::new(10, 1);
        let probe = decoder.probe();
        let reader =
            VideoReader::from_decoder(Box::new(decoder), Path::new("scripted.mp4")).unwrap();
        let pipeline = PrefetchPipeline::spawn(
            vec![Arc::new(Mutex::new(reader))],
            sequential_schedule(&files),
            shape(4),
            2,
            1,
        );

        assert!(pipeline.next_batch().is_ok());
        assert!(pipeline.next_batch().is_ok());
        pipeline.shutdown();
        // ordinals 8 and 9 were never claimed
        assert_eq!(probe.decodes(), 8);
    }

    #[test]
    fn test_exhausted_pipeline_reports_end_of_pass() {
        let files = [(8, 1)];
        let pipeline = PrefetchPipeline::spawn(
            scripted_readers(&files),
            sequential_schedule(&files),
            shape(4),
            2,
            1,
        );

        assert!(pipeline.next_batch().is_ok());
        assert!(pipeline.next_batch().is_ok());
        // the assembler has emitted its last batch and closed the queue
        assert!(matches!(pipeline.next_batch(), Err(VideoError::EndOfPass)));
        pipeline.shutdown();
    }

    #[test]
    fn test_shutdown_mid_pass_does_not_hang() {
        let files = [(40, 5)];
        let pipeline = PrefetchPipeline::spawn(
            scripted_readers(&files),
            sequential_schedule(&files),
            shape(4),
            1,
            2,
        );

        assert!(pipeline.next_batch().is_ok());
        pipeline.shutdown();
    }
}
