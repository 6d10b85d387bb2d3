//! List commands implementation

use crate::backends;

/// List all available backends
pub fn list_backends() {
    println!("Supported backends:");
    println!();
    for b in backends::available_backends() {
        let aliases = if b.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", b.aliases.join(", "))
        };
        println!("  {:8} - {}{}", b.name, b.description, aliases);
    }
}
