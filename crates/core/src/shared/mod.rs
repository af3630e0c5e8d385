pub mod device;
pub mod error;
pub mod frame;
pub mod video_metadata;

#[cfg(test)]
pub(crate) mod test_support;
