//! Functions example: Built-in and user-defined functions
//!
//! This example shows:
//! - Calling built-ins with brackets and the shorthand form
//! - Defining recursive functions guarded by `$IF`
//! - Seeded dice rolls
//! - Registering a native function

use statexpr::*;

fn clamp(ev: &mut Evaluator<'_>, _: &FunctionId, args: &[Argument<'_>]) -> Result<f64, EvalError> {
    let value = args[0].value(ev)?;
    let low = args[1].value(ev)?;
    let high = args[2].value(ev)?;
    Ok(value.max(low).min(high))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::default().with_dice_seed(2024);
    let mut stats = StatService::with_config(config);

    println!("=== Built-ins ===\n");
    for raw in ["$ABS -4", "$MAX{1, 7, 3}", "$IF{2 > 1, 10, 20}", "$FLOOR 2.7"] {
        let expression = stats.parse(raw, None).map_err(first)?;
        println!("  {:<20} = {}", raw, stats.evaluate(&expression)?);
    }

    println!("\n=== User functions ===\n");
    stats
        .define_function("$FACT", "$IF{$1 <= 1, 1, $1 * $FACT{$1 - 1}}")
        .map_err(first)?;
    stats
        .define_function("$MOD", "$FLOOR{($1 - 10) / 2}")
        .map_err(first)?;
    println!("  $FACT = $IF{{$1 <= 1, 1, $1 * $FACT{{$1 - 1}}}}");
    println!("  $MOD  = $FLOOR{{($1 - 10) / 2}}");

    for raw in ["$FACT 6", "$MOD 15", "$MOD{$FACT 3}"] {
        let expression = stats.parse(raw, None).map_err(first)?;
        println!("  {:<20} = {}", raw, stats.evaluate(&expression)?);
    }

    println!("\n=== Dice ===\n");
    let roll = stats.parse("$D{3, 6}", None).map_err(first)?;
    let rolls = (0..5)
        .map(|_| stats.evaluate(&roll))
        .collect::<Result<Vec<_>, _>>()?;
    println!("  3d6 x5: {:?}", rolls);

    println!("\n=== Native function ===\n");
    stats.functions_mut().add(Function::native(
        FunctionId::new("$CLAMP")?,
        Arity::exactly(3),
        clamp,
    )).map_err(first)?;
    let expression = stats.parse("$CLAMP{$FACT 5, 0, 100}", None).map_err(first)?;
    println!("  $CLAMP{{$FACT 5, 0, 100}} = {}", stats.evaluate(&expression)?);

    println!("\n=== Runaway recursion ===\n");
    stats.define_function("$LOOP", "$LOOP + 1").map_err(first)?;
    let expression = stats.parse("$LOOP", None).map_err(first)?;
    match stats.evaluate(&expression) {
        Err(err) => println!("  ✓ {}", err),
        Ok(value) => println!("  ✗ unexpected value {}", value),
    }

    Ok(())
}

fn first(mut errors: Vec<StatError>) -> StatError {
    errors.swap_remove(0)
}
