//! Spectral processing
//!
//! Window functions, the magnitude-squared DFT of acquisitions and a few
//! reductions over the resulting buffers. Nothing in here performs I/O.

mod spectrum;
mod stats;
mod window;

pub use spectrum::{get_spectrum, Periodogram, SpectrumFlags};
pub use stats::{average_segments, calc_average, peak_bin, subtract_mean};
pub(crate) use stats::fold_segments;
pub use window::{window, WindowFunction};
