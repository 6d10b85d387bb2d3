//! Time-domain and spectrum commands

use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tlna_core::dsp::{calc_average, peak_bin};
use tlna_core::protocol::SPECTRUM_BINS;
use tlna_core::{Connector, NoiseAnalyzer, SignalSource, Spectrum, SpectrumFlags, WindowFunction};

use super::write_values;

/// Options for the spectrum command
#[derive(Debug, Clone, Copy)]
pub struct SpectrumOptions {
    /// Window applied to every acquisition
    pub window: WindowFunction,
    /// Remove the acquisition mean first
    pub subtract_mean: bool,
    /// Number of spectra to average
    pub count: u32,
    /// Signal source
    pub source: SignalSource,
    /// Write the per-bin mean of the three segments
    pub fold: bool,
}

/// Acquire one buffer, print a summary and optionally save it
pub fn run_time_domain<C: Connector>(
    analyzer: &mut NoiseAnalyzer<C>,
    source: SignalSource,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let td = match source {
        SignalSource::Input => analyzer.time_domain()?,
        SignalSource::TestSignal => analyzer.test_signal()?,
    };

    let (min, max) = td
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &x| {
            (lo.min(x), hi.max(x))
        });
    println!(
        "Acquired {} samples ({}): mean {:.6}, min {:.6}, max {:.6}",
        td.len(),
        source,
        calc_average(&td),
        min,
        max
    );

    if let Some(path) = output {
        write_values(path, &td)?;
        println!("Wrote {} samples to {:?}", td.len(), path);
    }
    Ok(())
}

/// Acquire `count` spectra, average them and print the peak of each segment
pub fn run_spectrum<C: Connector>(
    analyzer: &mut NoiseAnalyzer<C>,
    options: SpectrumOptions,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let count = options.count.max(1);
    let flags = if options.subtract_mean {
        SpectrumFlags::SUBTRACT_MEAN
    } else {
        SpectrumFlags::empty()
    };

    let pb = ProgressBar::new(count as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} spectra ({eta})")?
            .progress_chars("#>-"),
    );
    if count == 1 {
        pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let mut mean = Spectrum::zeroed();
    for n in 0..count {
        let spectrum = analyzer.spectrum_of(options.source, options.window, flags)?;
        // Running mean keeps the magnitude of a single spectrum
        let weight = 1.0 / (n + 1) as f32;
        for (m, &s) in mean.iter_mut().zip(spectrum.iter()) {
            *m += (s - *m) * weight;
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!(
        "Averaged {} spectra, window {}{}",
        count,
        options.window,
        if options.subtract_mean {
            ", mean removed"
        } else {
            ""
        }
    );
    for (i, segment) in mean.segments().enumerate() {
        match peak_bin(segment) {
            Some(bin) => println!("  Segment {}: peak at bin {} ({:.3e})", i, bin, segment[bin]),
            None => println!("  Segment {}: no peak", i),
        }
    }

    if let Some(path) = output {
        if options.fold {
            let folded = mean.averaged();
            write_values(path, &folded)?;
            println!("Wrote {} bins to {:?}", SPECTRUM_BINS, path);
        } else {
            write_values(path, &mean)?;
            println!("Wrote {} values to {:?}", mean.len(), path);
        }
    }
    Ok(())
}
