//! Plan command implementation.

use minesync_engine::{SyncConfig, SyncEngine, SyncSnapshot, TcpTransport};

/// Runs the plan command.
pub fn run(config: SyncConfig, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let transport = TcpTransport::from_config(&config);
    let engine = SyncEngine::from_config(config, transport)?;
    let snapshot = engine.plan()?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        "text" => print_text_output(&snapshot),
        other => return Err(format!("unknown format: {other}").into()),
    }

    Ok(())
}

fn print_text_output(snapshot: &SyncSnapshot) {
    let plan = &snapshot.plan;
    println!("=== Sync Plan ===");
    println!("Local saves:  {}", snapshot.local.len());
    println!("Remote saves: {}", snapshot.remote.len());
    println!();

    if plan.is_empty() && plan.collisions.is_empty() {
        println!("Everything is up to date.");
        return;
    }

    for entry in &plan.uploads {
        println!("  upload    {} -> {}", entry.name, entry.archive_name());
    }
    for entry in &plan.downloads {
        println!("  download  {}", entry.name);
    }
    for collision in &plan.collisions {
        println!(
            "  skip      {} (all map to {})",
            collision.saves.join(", "),
            collision.archive_name
        );
    }
}
