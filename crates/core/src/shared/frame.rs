use ndarray::ArrayView3;

/// One decoded video frame: contiguous RGB bytes in row-major order,
/// tagged with the ordinal it occupies in its file and the stream pts it
/// was decoded at.
///
/// Color conversion and rescaling happen in the decoder backend; everything
/// above it treats pixel data as opaque.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    ordinal: u64,
    pts: i64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, ordinal: u64, pts: i64) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            ordinal,
            pts,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Position of this frame in its file, `0..frame_count`.
    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    /// Presentation timestamp in the stream's time base.
    pub fn pts(&self) -> i64 {
        self.pts
    }

    /// `(height, width, channel)` view over the pixel data.
    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (
                self.height as usize,
                self.width as usize,
                self.channels as usize,
            ),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }
}
