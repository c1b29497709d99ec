//! Paths command implementation.

use minesync_engine::{candidate_paths, resolve_save_root, SystemDirs};
use std::path::Path;

/// Runs the paths command.
///
/// Prints the save-games root in use, followed by every location known
/// for this platform.
pub fn run(explicit: Option<&Path>) {
    let platform = std::env::consts::OS;

    match explicit {
        Some(root) => println!("Save games: {} (configured)", root.display()),
        None => match resolve_save_root(platform, &SystemDirs) {
            Ok(root) => println!("Save games: {}", root.display()),
            Err(e) => println!("Save games: not found ({e})"),
        },
    }

    println!("Known locations on {platform}:");
    for candidate in candidate_paths(platform, &SystemDirs) {
        let marker = if candidate.is_dir() { "*" } else { " " };
        println!("  {marker} {}", candidate.display());
    }
}
