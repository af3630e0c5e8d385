use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// One sample to decode: a file and a frame ordinal within it. Scheduled
/// and consumed exactly once per pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Coordinate {
    pub file_index: u32,
    pub frame_ordinal: u64,
}

/// Produces the ordered (or shuffled) coordinate sequence for one pass.
///
/// Per file: start at ordinal `skip`, step by `interval`, stop at the
/// file's frame count; files in configuration order. With `shuffle` the
/// whole coordinate list is permuted.
///
/// Seed policy: a fixed seed reproduces the identical permutation on every
/// `reset()`, making shuffled passes a testable contract; without a seed
/// each pass draws a fresh permutation from thread randomness.
pub struct SampleScheduler {
    base: Vec<Coordinate>,
    order: Vec<Coordinate>,
    cursor: usize,
    shuffle: bool,
    seed: Option<u64>,
}

impl SampleScheduler {
    pub fn new(
        frame_counts: &[u64],
        interval: u64,
        skip: u64,
        shuffle: bool,
        seed: Option<u64>,
    ) -> Self {
        let step = interval.max(1);
        let mut base = Vec::new();
        for (file_index, &count) in frame_counts.iter().enumerate() {
            let mut ordinal = skip;
            while ordinal < count {
                base.push(Coordinate {
                    file_index: file_index as u32,
                    frame_ordinal: ordinal,
                });
                ordinal += step;
            }
        }

        let mut scheduler = Self {
            order: base.clone(),
            base,
            cursor: 0,
            shuffle,
            seed,
        };
        scheduler.reshuffle();
        scheduler
    }

    fn reshuffle(&mut self) {
        if !self.shuffle {
            return;
        }
        // always permute the base order, not the previous pass's order, so
        // a fixed seed yields the same permutation every pass
        self.order.copy_from_slice(&self.base);
        match self.seed {
            Some(seed) => self.order.shuffle(&mut StdRng::seed_from_u64(seed)),
            None => self.order.shuffle(&mut rand::thread_rng()),
        }
    }

    /// Total coordinates in one full pass.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.cursor < self.order.len()
    }

    /// Vends the next coordinate of the pass, exactly once each.
    pub fn next(&mut self) -> Option<Coordinate> {
        let coord = self.order.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(coord)
    }

    /// Restarts the pass; reshuffles when shuffling is configured.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.reshuffle();
    }

    /// The full pass order, for slot-indexed claiming by the pipeline.
    pub fn pass_order(&self) -> &[Coordinate] {
        &self.order
    }
}
