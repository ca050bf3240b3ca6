//! Learn the structure of `A -> B -> C` from synthetic data, or of any numeric CSV file
//! given as the first argument.
//!
//! `RUST_LOG=info cargo run --example structure_learning [data.csv]`
use dagfit::synthetic::chain_dataset;
use dagfit::{Dataset, NotearsConfig, StructureLearner};
use std::error::Error;

fn read_csv(path: &str) -> Result<Dataset, Box<dyn Error>> {
    let mut reader = csv::Reader::from_path(path)?;
    let names: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
    for record in reader.records() {
        let record = record?;
        for (col, field) in columns.iter_mut().zip(record.iter()) {
            col.push(field.trim().parse::<f64>()?);
        }
    }
    Ok(Dataset::new(names.into_iter().zip(columns).collect::<Vec<_>>())?)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let path = std::env::args().nth(1);
    let data = match &path {
        Some(p) => {
            println!("Reading {}...", p);
            read_csv(p)?
        }
        None => {
            println!("Generating synthetic data (A -> B -> C)...");
            chain_dataset(1000, 42)?
        }
    };

    println!("\nLearning structure using NOTEARS...");
    let learner = StructureLearner::new(NotearsConfig::default().set_w_threshold(0.5).set_log_iterations(10))?;
    let sm = learner.fit_structure(&data)?;

    println!("\nAdjacency Matrix (Causality Matrix):");
    print!("{}", sm);

    if path.is_none() {
        println!("\nInterpretation:");
        println!("Row A, Column B: {:.2} (Expected ~2.0)", sm.weight("A", "B")?);
        println!("Row B, Column C: {:.2} (Expected ~-1.5)", sm.weight("B", "C")?);
    } else {
        println!("\nEdges:");
        for e in sm.edges() {
            println!("{} -> {}: {:.3}", e.source, e.target, e.weight);
        }
    }
    Ok(())
}
