//! Cycle detection example: Demonstrating error handling for circular dependencies
//!
//! This example shows:
//! - What happens when a formula would close a dependency cycle
//! - How the full cycle path is reported
//! - That a rejected change leaves the registry untouched

use statexpr::*;

fn main() {
    let mut stats = StatService::new();

    println!("=== Setting up a dependency chain ===\n");

    for (id, formula) in [("C", "30"), ("B", "20 + C"), ("A", "10 + B")] {
        stats.add(id, Some(formula)).expect("valid formula");
        println!("{}: {}", id, formula);
    }

    println!("\n=== Closing the chain (should detect cycle) ===\n");

    println!("C: 30 + A");
    match stats.update("C", Some("30 + A")) {
        Err(errors) => {
            for error in &errors {
                if let StatError::Cycle { path } = error {
                    println!("✓ Cycle detected successfully!");
                    println!("\nCycle path:");
                    let names: Vec<_> = path.iter().map(StatId::as_str).collect();
                    println!("{}", names.join(" -> "));
                } else {
                    println!("✗ Unexpected error: {}", error);
                }
            }
        }
        Ok(()) => {
            println!("✗ ERROR: Cycle was not detected! This should not happen.");
        }
    }

    println!("\n=== Self reference ===\n");

    match stats.add("D", Some("D + 1")) {
        Err(errors) => println!("✓ Rejected: {}", errors[0]),
        Ok(()) => println!("✗ ERROR: D was accepted"),
    }

    println!("\n=== Registry is unchanged ===\n");

    for id in ["A", "B", "C"] {
        match stats.get_value(id) {
            Ok(value) => println!("  {}: {:.2}", id, value),
            Err(err) => println!("  {}: {}", id, err),
        }
    }

    println!("\n✓ Valid dependency chain still resolves!");
}
