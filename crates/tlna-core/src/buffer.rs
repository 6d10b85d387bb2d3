//! Fixed-length sample and spectrum buffers
//!
//! Both types can only be built at their exact protocol length, so code that
//! holds one never has to re-check it. Slices coming from callers are checked
//! once, at construction.

use core::fmt;
use core::ops::{Deref, DerefMut};

use crate::error::{Error, Result};
use crate::protocol::{SPECTRUM_BINS, SPECTRUM_LEN, TD_LEN};

/// One acquisition: exactly [`TD_LEN`] samples
#[derive(Clone, PartialEq)]
pub struct TimeDomain(Box<[f32]>);

impl TimeDomain {
    /// All-zero buffer
    pub fn zeroed() -> Self {
        Self(vec![0.0; TD_LEN].into_boxed_slice())
    }

    /// Take ownership of `samples`, which must hold exactly [`TD_LEN`] values
    pub fn from_vec(samples: Vec<f32>) -> Result<Self> {
        if samples.len() != TD_LEN {
            return Err(Error::BufferLength {
                expected: TD_LEN,
                actual: samples.len(),
            });
        }
        Ok(Self(samples.into_boxed_slice()))
    }

    /// Copy from a caller slice
    pub fn from_slice(samples: &[f32]) -> Result<Self> {
        Self::from_vec(samples.to_vec())
    }

    /// Samples as a slice
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Give back the underlying storage
    pub fn into_vec(self) -> Vec<f32> {
        self.0.into_vec()
    }
}

impl Deref for TimeDomain {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

impl DerefMut for TimeDomain {
    fn deref_mut(&mut self) -> &mut [f32] {
        &mut self.0
    }
}

impl fmt::Debug for TimeDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeDomain")
            .field("len", &self.0.len())
            .field("mean", &crate::dsp::calc_average(&self.0))
            .finish()
    }
}

/// Three stacked magnitude-squared segments: exactly [`SPECTRUM_LEN`] values
#[derive(Clone, PartialEq)]
pub struct Spectrum(Box<[f32]>);

impl Spectrum {
    /// All-zero buffer
    pub fn zeroed() -> Self {
        Self(vec![0.0; SPECTRUM_LEN].into_boxed_slice())
    }

    /// Take ownership of `values`, which must hold exactly [`SPECTRUM_LEN`]
    pub fn from_vec(values: Vec<f32>) -> Result<Self> {
        if values.len() != SPECTRUM_LEN {
            return Err(Error::SpectrumLength {
                expected: SPECTRUM_LEN,
                actual: values.len(),
            });
        }
        Ok(Self(values.into_boxed_slice()))
    }

    /// Values as a slice
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Segment `index` (0..3), [`SPECTRUM_BINS`] values long
    pub fn segment(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(SPECTRUM_BINS)?;
        self.0.get(start..start.checked_add(SPECTRUM_BINS)?)
    }

    /// Iterate over the three segments in order
    pub fn segments(&self) -> impl Iterator<Item = &[f32]> {
        self.0.chunks_exact(SPECTRUM_BINS)
    }

    /// Per-bin mean of the three segments
    pub fn averaged(&self) -> Vec<f32> {
        crate::dsp::fold_segments(&self.0)
    }
}

impl Deref for Spectrum {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

impl DerefMut for Spectrum {
    fn deref_mut(&mut self) -> &mut [f32] {
        &mut self.0
    }
}

impl fmt::Debug for Spectrum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spectrum")
            .field("len", &self.0.len())
            .finish()
    }
}
