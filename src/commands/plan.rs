use anyhow::{Context, Result};

use sniper::models::Identifier;
use sniper::monitor::{Assignment, PartitionMode, WorkerRole};

pub async fn plan(workers: usize, identifiers: Vec<String>, rounds: u64) -> Result<()> {
    let identifiers = identifiers
        .iter()
        .map(|raw| Identifier::new(raw).with_context(|| format!("Invalid identifier: {raw}")))
        .collect::<Result<Vec<_>>>()?;

    println!("Partition Plan");
    println!("==============");

    let assignment = Assignment::new(&identifiers, workers);
    println!(
        "Identifiers: {} | Workers: {}",
        assignment.identifiers().len(),
        workers
    );

    if workers == 0 || assignment.identifiers().is_empty() {
        println!("\nNothing to schedule; the monitor would idle and retry.");
        return Ok(());
    }

    match assignment.mode() {
        PartitionMode::SurplusIdentifiers => println!("Mode: round-robin shards"),
        PartitionMode::SurplusWorkers => println!(
            "Mode: {} primary, {} alternating",
            assignment.primary_count(),
            assignment.alternating_count()
        ),
    }

    let labels: Vec<String> = (1..=workers).map(|i| format!("worker {i}")).collect();
    println!("\nDistribution:");
    print!("{}", assignment.describe(&labels));
    println!(
        "Verification: {}/{} identifiers assigned",
        assignment.covered_count(),
        assignment.identifiers().len()
    );

    println!("\nChecklists:");
    for round in 0..rounds {
        println!("  Round {round}:");
        for index in assignment.active_indices() {
            let role = match assignment.role(index) {
                WorkerRole::Shard => "shard",
                WorkerRole::Primary => "primary",
                WorkerRole::Alternating => "alternating",
            };
            let checklist: Vec<String> = assignment
                .checklist(index, round)
                .iter()
                .map(Identifier::mention)
                .collect();
            println!("    {} ({role}): {}", labels[index], checklist.join(", "));
        }
    }

    Ok(())
}
