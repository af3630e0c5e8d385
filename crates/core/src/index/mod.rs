pub mod frame_index;
