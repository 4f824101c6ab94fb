//! RPG Stat System Example
//!
//! This example demonstrates a complete character sheet built with statexpr:
//! - Attributes with base and bonus variables (FOR, DEX, CON)
//! - Derived stats defined by formulas (MOD_*, ATK, DEF, HP)
//! - Equipment as named expressions added to and removed from a stat
//! - Caps through `.value` rewrites (CRIT capped at 0.75)
//! - Tracing output of registry mutations
//!
//! Run with `RUST_LOG=statexpr=debug` to see every mutation being committed.
//!
//! Nothing is hardcoded in the engine: stats, modifiers and items are only
//! formulas, so the same code runs any rule set.

use statexpr::*;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Rule Set
// ============================================================================

/// Attributes and their starting base values.
const ATTRIBUTES: [(&str, &str); 3] = [("FOR", "14"), ("DEX", "12"), ("CON", "15")];

/// Derived stats, in registration order.
const DERIVED: [(&str, &str); 6] = [
    ("MOD_FOR", "$MOD FOR"),
    ("MOD_DEX", "$MOD DEX"),
    ("MOD_CON", "$MOD CON"),
    ("ATK", "10 + MOD_FOR * 2"),
    ("DEF", "10 + MOD_DEX"),
    ("HP", "CON * 5 + $MAX{MOD_CON, 0} * 10"),
];

// ============================================================================
// Character Structure
// ============================================================================

/// A character sheet backed by a stat registry.
struct Character {
    stats: StatService,
}

impl Character {
    /// Create a character and register the rule set.
    ///
    /// Each attribute is `.base + .bonus`; both variables are created by the
    /// formula and start at 0.
    fn new() -> Result<Self, Vec<StatError>> {
        let mut stats = StatService::new();
        stats.define_function("$MOD", "$FLOOR{($1 - 10) / 2}")?;

        for (id, base) in ATTRIBUTES {
            stats.add(id, Some(".base + .bonus"))?;
            stats.add_or_update_variable(&format!("{}.base", id), base)?;
        }
        for (id, formula) in DERIVED {
            stats.add(id, Some(formula))?;
        }

        // CRIT grows with DEX but is capped at 75%
        stats.add("CRIT", Some("0.05 + DEX / 20"))?;
        stats.add_expression("CRIT", "cap", "$MIN{.value, 0.75}", Position::Last)?;

        Ok(Self { stats })
    }

    /// Equip an item: one named expression per modified stat.
    fn equip(&mut self, item: &Item) -> Result<(), Vec<StatError>> {
        for (stat, formula) in &item.modifiers {
            // Insert before the caps so they still apply
            self.stats
                .add_expression(stat, &item.name, formula, Position::At(-2))?;
        }
        Ok(())
    }

    fn unequip(&mut self, item: &Item) -> Result<(), Vec<StatError>> {
        for (stat, _) in &item.modifiers {
            self.stats.remove_expression(stat, &item.name)?;
        }
        Ok(())
    }

    fn print(&mut self, ids: &[&str]) -> Result<(), EvalError> {
        for id in ids {
            println!("  {:<8} {:>7.2}", id, self.stats.get_value(id)?);
        }
        Ok(())
    }
}

// ============================================================================
// Item Structure
// ============================================================================

/// An item that adds a formula to some stats.
struct Item {
    name: String,
    modifiers: Vec<(&'static str, &'static str)>,
}

impl Item {
    fn new(name: impl Into<String>, modifiers: Vec<(&'static str, &'static str)>) -> Self {
        Self {
            name: name.into(),
            modifiers,
        }
    }
}

// ============================================================================
// Main Function
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== RPG Stat System Example ===\n");

    println!("1. Creating Character\n");
    let mut character = Character::new().map_err(first)?;
    character.print(&["FOR", "DEX", "CON", "ATK", "DEF", "HP", "CRIT"])?;

    println!("\n2. Equipping Items\n");
    let sword = Item::new("iron_sword", vec![("ATK", "5")]);
    // Gloves scale with the wearer's DEX modifier
    let gloves = Item::new("gloves", vec![("DEX", "2"), ("CRIT", "MOD_DEX / 10")]);
    character.equip(&sword).map_err(first)?;
    character.equip(&gloves).map_err(first)?;
    character.print(&["DEX", "ATK", "DEF", "CRIT"])?;

    println!("\n3. Level Up: FOR.bonus = 4\n");
    character
        .stats
        .add_or_update_variable("FOR.bonus", "4")
        .map_err(first)?;
    character.print(&["FOR", "MOD_FOR", "ATK"])?;

    println!("\n4. ATK Breakdown\n");
    let resolved = character.stats.get_breakdown(&StatId::new("ATK")?)?;
    for step in &resolved.contributions {
        println!(
            "  {:<12} {:>7.2} {:?} -> {:.2}",
            step.name, step.result, step.mode, step.value_after
        );
    }

    println!("\n5. Rejected Changes\n");
    // DEX reading CRIT would close CRIT -> DEX -> CRIT
    if let Err(errors) = character.stats.add_or_update_variable("DEX.bonus", "CRIT * 10") {
        println!("  ✓ {}", errors[0]);
    }
    if let Err(errors) = character.stats.remove("DEX", false) {
        println!("  ✓ {} errors, first: {}", errors.len(), errors[0]);
    }

    println!("\n6. Unequipping Gloves\n");
    character.unequip(&gloves).map_err(first)?;
    character.print(&["DEX", "CRIT"])?;

    println!("\n=== Summary ===");
    println!("✓ Attributes built from variables");
    println!("✓ Derived stats calculated by formulas and user functions");
    println!("✓ Items applied as named expressions");
    println!("✓ CRIT capped through a .value rewrite");
    println!("✓ Cycles and dangling dependents rejected");

    Ok(())
}

fn first(mut errors: Vec<StatError>) -> StatError {
    errors.swap_remove(0)
}
