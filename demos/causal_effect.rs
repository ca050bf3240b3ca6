//! Backdoor adjusted effect of a binary treatment confounded by a common cause.
//!
//! `RUST_LOG=info cargo run --example causal_effect`
use dagfit::effect::CausalModel;
use dagfit::synthetic::confounded_treatment_dataset;
use std::error::Error;

const RULE: &str = "----------------------------------------------------------------";

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    println!("{}", RULE);
    println!("Backdoor Causal Effect Example");
    println!("{}", RULE);

    println!("\n1. Generating data...");
    let data = confounded_treatment_dataset(1000, 42)?;
    println!("   True Causal Effect is -5.0");
    println!("{:>6} {:>10}", "", data.names().join("  "));
    for r in 0..5 {
        let row: Vec<String> = data.row(r).iter().map(|v| format!("{:>9.4}", v)).collect();
        println!("{:>6} {}", r, row.join(" "));
    }

    println!("\n2. Modeling...");
    let model = CausalModel::new(&data, "treatment", "outcome", &["confounder"])?;

    println!("\n3. Identifying Causal Effect...");
    let estimand = model.identify_effect();
    println!("{}", estimand);

    println!("\n4. Estimating Causal Effect...");
    let estimate = model.estimate_effect(&estimand)?;
    println!("   Estimated Effect: {:.2}", estimate.value);

    println!("\n5. Refuting Estimate (Robustness Check)...");
    let refutation = model.refute_random_common_cause(&estimand, &estimate, 100, 0)?;
    println!("{}", refutation);
    Ok(())
}
