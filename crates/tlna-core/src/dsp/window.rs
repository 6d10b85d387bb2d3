//! Window functions
//!
//! All windows are symmetric cosine sums evaluated over `i / (len - 1)`.

use core::fmt;
use std::f64::consts::PI;

/// Window applied before the DFT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WindowFunction {
    /// Rectangular (no weighting)
    Rectangular,
    /// 4-term Blackman-Harris
    BlackmanHarris,
    /// Classic Blackman
    Blackman,
    /// Hann, recommended for noise measurements
    #[default]
    Hann,
}

impl WindowFunction {
    /// All window functions
    pub const ALL: [WindowFunction; 4] = [
        WindowFunction::Rectangular,
        WindowFunction::BlackmanHarris,
        WindowFunction::Blackman,
        WindowFunction::Hann,
    ];

    /// Cosine-sum coefficients `a0, a1, a2, a3`
    fn cosine_terms(self) -> [f64; 4] {
        match self {
            WindowFunction::Rectangular => [1.0, 0.0, 0.0, 0.0],
            WindowFunction::BlackmanHarris => [0.35875, 0.48829, 0.14128, 0.01168],
            WindowFunction::Blackman => [0.42, 0.5, 0.08, 0.0],
            WindowFunction::Hann => [0.5, 0.5, 0.0, 0.0],
        }
    }

    /// Weight of sample `i` in a window of `len` samples
    pub fn coefficient(self, i: usize, len: usize) -> f32 {
        if self == WindowFunction::Rectangular || len < 2 {
            return 1.0;
        }

        let [a0, a1, a2, a3] = self.cosine_terms();
        let x = 2.0 * PI * i as f64 / (len - 1) as f64;
        (a0 - a1 * x.cos() + a2 * (2.0 * x).cos() - a3 * (3.0 * x).cos()) as f32
    }

    /// All coefficients for a window of `len` samples
    pub fn coefficients(self, len: usize) -> Vec<f32> {
        (0..len).map(|i| self.coefficient(i, len)).collect()
    }

    /// Multiply `data` in place by this window
    pub fn apply(self, data: &mut [f32]) {
        if self == WindowFunction::Rectangular {
            return;
        }
        let len = data.len();
        for (i, x) in data.iter_mut().enumerate() {
            *x *= self.coefficient(i, len);
        }
    }

    /// Parse from a name like "hann" or "blackman-harris"
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rect" | "rectangular" | "none" => Some(WindowFunction::Rectangular),
            "blackman-harris" | "blackmanharris" | "bh" => Some(WindowFunction::BlackmanHarris),
            "blackman" => Some(WindowFunction::Blackman),
            "hann" | "hanning" => Some(WindowFunction::Hann),
            _ => None,
        }
    }

    /// Short name
    pub fn name(self) -> &'static str {
        match self {
            WindowFunction::Rectangular => "rectangular",
            WindowFunction::BlackmanHarris => "blackman-harris",
            WindowFunction::Blackman => "blackman",
            WindowFunction::Hann => "hann",
        }
    }
}

impl fmt::Display for WindowFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Apply `function` to `data` in place
pub fn window(data: &mut [f32], function: WindowFunction) {
    function.apply(data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_preserved() {
        for function in WindowFunction::ALL {
            let mut data = vec![1.0f32; 1000];
            window(&mut data, function);
            assert_eq!(data.len(), 1000);
        }
    }

    #[test]
    fn test_rectangular_is_identity() {
        let original: Vec<f32> = (0..257).map(|i| (i as f32 * 0.37).sin()).collect();
        let mut data = original.clone();
        window(&mut data, WindowFunction::Rectangular);
        assert_eq!(data, original);
        window(&mut data, WindowFunction::Rectangular);
        assert_eq!(data, original);
        assert!(WindowFunction::Rectangular
            .coefficients(64)
            .iter()
            .all(|&w| w == 1.0));
    }

    #[test]
    fn test_hann_endpoints_and_peak() {
        let w = WindowFunction::Hann.coefficients(8192);
        assert!(w[0].abs() < 1e-7);
        assert!(w[8191].abs() < 1e-7);

        let odd = WindowFunction::Hann.coefficients(513);
        assert!((odd[256] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_symmetry() {
        for function in WindowFunction::ALL {
            let w = function.coefficients(101);
            for i in 0..101 {
                assert!(
                    (w[i] - w[100 - i]).abs() < 1e-6,
                    "{} not symmetric at {}",
                    function,
                    i
                );
            }
        }
    }

    #[test]
    fn test_blackman_family_endpoints() {
        // Blackman: 0.42 - 0.5 + 0.08 = 0
        assert!(WindowFunction::Blackman.coefficient(0, 64).abs() < 1e-6);
        // Blackman-Harris: 0.35875 - 0.48829 + 0.14128 - 0.01168
        let bh = WindowFunction::BlackmanHarris.coefficient(0, 64);
        assert!((bh - 6.0e-5).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_lengths() {
        let mut empty: [f32; 0] = [];
        window(&mut empty, WindowFunction::Hann);

        let mut one = [3.0f32];
        window(&mut one, WindowFunction::Hann);
        assert_eq!(one, [3.0]);
    }

    #[test]
    fn test_parse() {
        assert_eq!(WindowFunction::parse("Hanning"), Some(WindowFunction::Hann));
        assert_eq!(
            WindowFunction::parse("blackman-harris"),
            Some(WindowFunction::BlackmanHarris)
        );
        assert_eq!(WindowFunction::parse("kaiser"), None);
        for function in WindowFunction::ALL {
            assert_eq!(WindowFunction::parse(function.name()), Some(function));
        }
    }
}
