/// Where decoded frames should live.
///
/// The FFmpeg backend decodes on the CPU only; `Cuda` is accepted as a
/// construction parameter and rejected with a configuration error before
/// any file is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceContext {
    Cpu,
    Cuda(u32),
}

impl Default for DeviceContext {
    fn default() -> Self {
        Self::Cpu
    }
}
