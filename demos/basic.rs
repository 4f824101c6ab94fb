//! Basic example: Stats defined by formulas
//!
//! This example demonstrates:
//! - Registering stats from formulas
//! - Reading derived values
//! - Extending a stat's pipeline with named expressions

use statexpr::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stats = StatService::new();

    println!("Registering stats:");
    stats.add("VIT", Some("12")).map_err(first)?;
    println!("  VIT = 12");

    stats.add("HP", Some("VIT * 10")).map_err(first)?;
    println!("  HP  = VIT * 10");

    // Named expressions are folded in order: plain ones add to the running
    // value, the ones reading `.value` replace it
    println!("\nExtending HP:");
    stats
        .add_expression("HP", "gear", "50", Position::Last)
        .map_err(first)?;
    println!("  gear:  + 50");
    stats
        .add_expression("HP", "blessed", ".value * 1.2", Position::Last)
        .map_err(first)?;
    println!("  blessed: .value * 1.2");

    let hp_id = StatId::new("HP")?;
    let resolved = stats.get_breakdown(&hp_id)?;

    println!("\n=== Resolved Stat ===");
    println!("Stat ID: {}", resolved.stat_id);
    println!("Final Value: {:.2}", resolved.value);

    println!("\nBreakdown:");
    for step in &resolved.contributions {
        println!(
            "  {:<8} {:>8.2} ({:?}) -> {:.2}",
            step.name, step.result, step.mode, step.value_after
        );
    }

    println!("\nCalculation: (12 * 10 + 50) * 1.2 = {:.2}", resolved.value);

    Ok(())
}

fn first(mut errors: Vec<StatError>) -> StatError {
    errors.swap_remove(0)
}
