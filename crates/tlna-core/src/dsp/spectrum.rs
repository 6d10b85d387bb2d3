//! Magnitude-squared spectra of time-domain acquisitions

use std::sync::Arc;

use bitflags::bitflags;
use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use super::stats::calc_average;
use super::window::WindowFunction;
use crate::buffer::{Spectrum, TimeDomain};
use crate::error::{Error, Result};
use crate::protocol::{SPECTRUM_BINS, SPECTRUM_LEN, SPECTRUM_SEGMENTS, TD_LEN};

bitflags! {
    /// Spectrum computation options
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SpectrumFlags: u32 {
        /// Remove the segment mean before windowing
        const SUBTRACT_MEAN = 1 << 0;
    }
}

/// Magnitude-squared DFT of time-domain acquisitions
///
/// Holds the FFT plan, a work buffer and the most recent window so repeated
/// spectra neither re-plan nor re-evaluate window coefficients.
pub struct Periodogram {
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex32>,
    scratch: Vec<Complex32>,
    window: Option<(WindowFunction, Vec<f32>)>,
}

impl Periodogram {
    /// Plan an [`TD_LEN`]-point forward FFT
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(TD_LEN);
        let scratch_len = fft.get_inplace_scratch_len();
        Self {
            fft,
            buffer: vec![Complex32::new(0.0, 0.0); TD_LEN],
            scratch: vec![Complex32::new(0.0, 0.0); scratch_len],
            window: None,
        }
    }

    fn refresh_window(&mut self, function: WindowFunction) {
        let stale = !matches!(&self.window, Some((cached, _)) if *cached == function);
        if stale {
            self.window = Some((function, function.coefficients(TD_LEN)));
        }
    }

    /// Spectrum of one acquisition into `out` ([`SPECTRUM_BINS`] values)
    pub fn segment_into(
        &mut self,
        td: &[f32],
        out: &mut [f32],
        window: WindowFunction,
        flags: SpectrumFlags,
    ) -> Result<()> {
        if td.len() != TD_LEN {
            return Err(Error::BufferLength {
                expected: TD_LEN,
                actual: td.len(),
            });
        }
        if out.len() != SPECTRUM_BINS {
            return Err(Error::SpectrumLength {
                expected: SPECTRUM_BINS,
                actual: out.len(),
            });
        }

        let mean = if flags.contains(SpectrumFlags::SUBTRACT_MEAN) {
            calc_average(td)
        } else {
            0.0
        };

        self.refresh_window(window);
        let Periodogram {
            fft,
            buffer,
            scratch,
            window: cached,
        } = self;
        let coefficients = cached.as_ref().map_or(&[][..], |(_, c)| c.as_slice());

        for ((slot, &x), &w) in buffer.iter_mut().zip(td).zip(coefficients) {
            *slot = Complex32::new((x - mean) * w, 0.0);
        }

        fft.process_with_scratch(buffer, scratch);

        for (o, bin) in out.iter_mut().zip(buffer.iter()) {
            *o = bin.norm_sqr();
        }
        Ok(())
    }

    /// Spectrum of three acquisitions into a caller buffer of exactly
    /// [`SPECTRUM_LEN`] values
    ///
    /// The length is checked before any computation.
    pub fn compute_into(
        &mut self,
        acquisitions: &[TimeDomain; SPECTRUM_SEGMENTS],
        spectrum: &mut [f32],
        window: WindowFunction,
        flags: SpectrumFlags,
    ) -> Result<()> {
        if spectrum.len() != SPECTRUM_LEN {
            return Err(Error::SpectrumLength {
                expected: SPECTRUM_LEN,
                actual: spectrum.len(),
            });
        }

        for (td, out) in acquisitions
            .iter()
            .zip(spectrum.chunks_exact_mut(SPECTRUM_BINS))
        {
            self.segment_into(td, out, window, flags)?;
        }
        Ok(())
    }

    /// Spectrum of three acquisitions
    pub fn compute(
        &mut self,
        acquisitions: &[TimeDomain; SPECTRUM_SEGMENTS],
        window: WindowFunction,
        flags: SpectrumFlags,
    ) -> Result<Spectrum> {
        let mut spectrum = Spectrum::zeroed();
        self.compute_into(acquisitions, &mut spectrum, window, flags)?;
        Ok(spectrum)
    }
}

impl Default for Periodogram {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot spectrum of three acquisitions into `spectrum`
///
/// Fails with `SpectrumLength` unless `spectrum` holds exactly
/// [`SPECTRUM_LEN`] values; nothing is computed in that case.
pub fn get_spectrum(
    acquisitions: &[TimeDomain; SPECTRUM_SEGMENTS],
    spectrum: &mut [f32],
    window: WindowFunction,
    flags: SpectrumFlags,
) -> Result<()> {
    if spectrum.len() != SPECTRUM_LEN {
        return Err(Error::SpectrumLength {
            expected: SPECTRUM_LEN,
            actual: spectrum.len(),
        });
    }
    Periodogram::new().compute_into(acquisitions, spectrum, window, flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::peak_bin;
    use std::f32::consts::PI;

    fn sine(bin: usize, amplitude: f32, offset: f32) -> TimeDomain {
        let samples = (0..TD_LEN)
            .map(|i| offset + amplitude * (2.0 * PI * bin as f32 * i as f32 / TD_LEN as f32).sin())
            .collect();
        TimeDomain::from_vec(samples).unwrap()
    }

    #[test]
    fn test_wrong_output_length_is_rejected_untouched() {
        let acqs = [sine(10, 1.0, 0.0), sine(10, 1.0, 0.0), sine(10, 1.0, 0.0)];
        for len in [0, 12288, SPECTRUM_LEN - 1, SPECTRUM_LEN + 1] {
            let mut out = vec![-1.0f32; len];
            assert_eq!(
                get_spectrum(&acqs, &mut out, WindowFunction::Hann, SpectrumFlags::empty()),
                Err(Error::SpectrumLength {
                    expected: SPECTRUM_LEN,
                    actual: len
                })
            );
            assert!(out.iter().all(|&v| v == -1.0));
        }
    }

    #[test]
    fn test_valid_length_succeeds_for_all_windows() {
        let acqs = [sine(3, 1.0, 0.0), sine(4, 1.0, 0.0), sine(5, 1.0, 0.0)];
        let mut periodogram = Periodogram::new();
        for window in WindowFunction::ALL {
            let mut out = vec![0.0f32; SPECTRUM_LEN];
            periodogram
                .compute_into(&acqs, &mut out, window, SpectrumFlags::SUBTRACT_MEAN)
                .unwrap();
        }
    }

    #[test]
    fn test_sine_peak_per_segment() {
        let bins = [100, 1234, 3000];
        let acqs = [
            sine(bins[0], 1.0, 0.0),
            sine(bins[1], 0.5, 0.0),
            sine(bins[2], 2.0, 0.0),
        ];
        let spectrum = Periodogram::new()
            .compute(&acqs, WindowFunction::Hann, SpectrumFlags::SUBTRACT_MEAN)
            .unwrap();

        assert_eq!(spectrum.len(), SPECTRUM_LEN);
        for (segment, &bin) in spectrum.segments().zip(&bins) {
            assert_eq!(peak_bin(segment), Some(bin));
        }
    }

    #[test]
    fn test_subtract_mean_removes_dc() {
        let acqs = [sine(200, 1.0, 5.0), sine(200, 1.0, 5.0), sine(200, 1.0, 5.0)];
        let mut periodogram = Periodogram::new();

        let raw = periodogram
            .compute(&acqs, WindowFunction::Rectangular, SpectrumFlags::empty())
            .unwrap();
        // DC bin of a rectangular window is (N * offset)^2
        let expected_dc = (TD_LEN as f32 * 5.0).powi(2);
        assert!((raw[0] - expected_dc).abs() / expected_dc < 1e-3);

        let centered = periodogram
            .compute(&acqs, WindowFunction::Rectangular, SpectrumFlags::SUBTRACT_MEAN)
            .unwrap();
        assert!(centered[0] < 1e-2);
        assert_eq!(peak_bin(centered.segment(0).unwrap()), Some(200));
    }

    #[test]
    fn test_segment_lengths_checked() {
        let mut periodogram = Periodogram::new();
        let mut out = vec![0.0f32; SPECTRUM_BINS];
        assert_eq!(
            periodogram.segment_into(
                &[0.0; 100],
                &mut out,
                WindowFunction::Hann,
                SpectrumFlags::empty()
            ),
            Err(Error::BufferLength {
                expected: TD_LEN,
                actual: 100
            })
        );
        let td = TimeDomain::zeroed();
        let mut short = vec![0.0f32; 10];
        assert!(matches!(
            periodogram.segment_into(&td, &mut short, WindowFunction::Hann, SpectrumFlags::empty()),
            Err(Error::SpectrumLength { .. })
        ));
    }

    #[test]
    fn test_unknown_flag_bits_ignored() {
        let flags = SpectrumFlags::from_bits_truncate(0xFFFF_FFFF);
        assert_eq!(flags, SpectrumFlags::SUBTRACT_MEAN);
    }
}
