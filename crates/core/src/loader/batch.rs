use ndarray::Array4;

use crate::loader::scheduler::Coordinate;

/// Output geometry of a loader: `(batch, height, width, channel)`. Fixed
/// for the loader's lifetime; every emitted batch conforms exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchShape {
    pub batch_size: usize,
    pub height: u32,
    pub width: u32,
    pub channels: u8,
}

impl BatchShape {
    pub fn dims(&self) -> (usize, usize, usize, usize) {
        (
            self.batch_size,
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }

    pub fn frame_dims(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

/// A fixed-shape stack of decoded frames plus the coordinates they were
/// sampled from, in schedule order.
#[derive(Clone, Debug)]
pub struct Batch {
    data: Array4<u8>,
    coordinates: Vec<Coordinate>,
}

impl Batch {
    pub(crate) fn new(data: Array4<u8>, coordinates: Vec<Coordinate>) -> Self {
        debug_assert_eq!(data.shape()[0], coordinates.len());
        Self { data, coordinates }
    }

    /// `(batch, height, width, channel)` pixel data.
    pub fn data(&self) -> &Array4<u8> {
        &self.data
    }

    pub fn into_data(self) -> Array4<u8> {
        self.data
    }

    /// Which `(file, frame)` each batch row came from.
    pub fn coordinates(&self) -> &[Coordinate] {
        &self.coordinates
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }
}
