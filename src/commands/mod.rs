//! CLI command implementations
//!
//! Commands take an already opened [`tlna_core::NoiseAnalyzer`] so they work
//! the same with every backend.

pub mod acquire;
pub mod info;
mod list;

pub use list::list_backends;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write `values` to `path`, one per line
pub fn write_values(path: &Path, values: &[f32]) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for v in values {
        writeln!(out, "{}", v)?;
    }
    out.flush()
}
