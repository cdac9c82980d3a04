// Audio buffers, DSP helpers and WAV I/O

pub mod buffer;
pub mod dsp_utils;
pub mod export;
