//! Find, serial and termination commands

use tlna_core::{Connector, NoiseAnalyzer, Termination};

/// Locate an analyzer and print where it is
pub fn run_find<C: Connector>(
    analyzer: &mut NoiseAnalyzer<C>,
) -> Result<(), Box<dyn std::error::Error>> {
    let locations = analyzer.find()?;
    println!("Found noise analyzer:");
    println!("  Channel A: {} (id 0x{:06X})", locations.a, locations.a.id());
    println!("  Channel B: {} (id 0x{:06X})", locations.b, locations.b.id());
    Ok(())
}

/// Print the serial number of an open analyzer
pub fn run_serial<C: Connector>(
    analyzer: &mut NoiseAnalyzer<C>,
) -> Result<(), Box<dyn std::error::Error>> {
    let serial = analyzer.serial_number()?;
    println!("Serial number: {}", serial);
    Ok(())
}

/// Send the termination setting to an open analyzer
#[allow(deprecated)]
pub fn run_termination<C: Connector>(
    analyzer: &mut NoiseAnalyzer<C>,
    termination: Termination,
) -> Result<(), Box<dyn std::error::Error>> {
    analyzer.set_termination(termination)?;
    println!(
        "Termination {} ({} ohms) requested",
        termination,
        termination.ohms()
    );
    Ok(())
}
