//! Sync command implementation.

use minesync_engine::{SyncConfig, SyncEngine, SyncReport, TcpTransport};

/// Runs the sync command.
pub fn run(config: SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    let transport = TcpTransport::from_config(&config);
    let engine = SyncEngine::from_config(config, transport)?;
    let report = engine.run()?;

    print_report(&report);

    if !report.failures.is_empty() {
        return Err(format!("{} save(s) failed to sync", report.failures.len()).into());
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    println!("=== Sync Report ===");
    println!("Uploaded:   {}", report.uploaded.len());
    for record in &report.uploaded {
        println!("  {} -> {} ({} bytes)", record.name, record.archive_name, record.bytes);
    }
    println!("Downloaded: {}", report.downloaded.len());
    for record in &report.downloaded {
        println!("  {} ({} bytes)", record.name, record.bytes);
    }
    if !report.collisions.is_empty() {
        println!("Skipped (name collisions):");
        for collision in &report.collisions {
            println!("  {} <- {}", collision.archive_name, collision.saves.join(", "));
        }
    }
    if !report.failures.is_empty() {
        println!("Failed:     {}", report.failures.len());
        for failure in &report.failures {
            println!("  [{}] {}: {}", failure.direction, failure.name, failure.error);
        }
    }
    println!("Took {:.2}s", report.duration.as_secs_f64());
}
