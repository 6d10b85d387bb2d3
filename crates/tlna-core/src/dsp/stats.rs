//! Simple reductions over sample and spectrum buffers

use crate::error::{Error, Result};
use crate::protocol::{SPECTRUM_BINS, SPECTRUM_LEN, SPECTRUM_SEGMENTS};

/// Arithmetic mean of `data`
///
/// Accumulates in f64. An empty slice has no mean; 0.0 is returned.
pub fn calc_average(data: &[f32]) -> f32 {
    if data.is_empty() {
        return 0.0;
    }
    let sum: f64 = data.iter().map(|&x| f64::from(x)).sum();
    (sum / data.len() as f64) as f32
}

/// Subtract the mean of `data` from every sample, returning the mean
pub fn subtract_mean(data: &mut [f32]) -> f32 {
    let mean = calc_average(data);
    for x in data.iter_mut() {
        *x -= mean;
    }
    mean
}

/// Per-bin mean of the stacked segments of a spectrum buffer
pub fn average_segments(spectrum: &[f32]) -> Result<Vec<f32>> {
    if spectrum.len() != SPECTRUM_LEN {
        return Err(Error::SpectrumLength {
            expected: SPECTRUM_LEN,
            actual: spectrum.len(),
        });
    }
    Ok(fold_segments(spectrum))
}

/// Per-bin mean over every whole segment in `values`
pub(crate) fn fold_segments(values: &[f32]) -> Vec<f32> {
    let mut acc = vec![0.0f64; SPECTRUM_BINS];
    for segment in values.chunks_exact(SPECTRUM_BINS) {
        for (a, &v) in acc.iter_mut().zip(segment) {
            *a += f64::from(v);
        }
    }
    acc.into_iter()
        .map(|a| (a / SPECTRUM_SEGMENTS as f64) as f32)
        .collect()
}

/// Index of the largest value, ignoring NaN
pub fn peak_bin(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_average_is_exact() {
        for value in [0.0f32, 1.0, -3.75, 1.0e-6, 12345.678] {
            let data = vec![value; 8192];
            assert_eq!(calc_average(&data), value);
        }
    }

    #[test]
    fn test_average() {
        assert_eq!(calc_average(&[1.0, 2.0, 3.0, 4.0]), 2.5);
        assert_eq!(calc_average(&[]), 0.0);
    }

    #[test]
    fn test_subtract_mean() {
        let mut data = [1.0f32, 2.0, 3.0];
        assert_eq!(subtract_mean(&mut data), 2.0);
        assert_eq!(data, [-1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_average_segments() {
        let mut spectrum = vec![0.0f32; SPECTRUM_LEN];
        spectrum[0] = 3.0;
        spectrum[SPECTRUM_BINS] = 6.0;
        spectrum[2 * SPECTRUM_BINS] = 9.0;
        let avg = average_segments(&spectrum).unwrap();
        assert_eq!(avg.len(), SPECTRUM_BINS);
        assert_eq!(avg[0], 6.0);
        assert_eq!(avg[1], 0.0);

        assert!(matches!(
            average_segments(&spectrum[1..]),
            Err(Error::SpectrumLength { .. })
        ));
    }

    #[test]
    fn test_peak_bin() {
        assert_eq!(peak_bin(&[0.0, 5.0, f32::NAN, 2.0]), Some(1));
        assert_eq!(peak_bin(&[]), None);
    }
}
