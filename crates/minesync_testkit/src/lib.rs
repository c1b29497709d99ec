//! # MineSync Testkit
//!
//! Test utilities for MineSync.
//!
//! This crate provides:
//! - Temporary save-games roots populated with save directories
//! - Helpers to pin directory modification times and compare trees
//! - An in-process reference server on ephemeral ports
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use minesync_testkit::prelude::*;
//!
//! #[test]
//! fn uploads_a_save() {
//!     let saves = SaveRoot::new();
//!     saves.add_save("World 1", &[("level.dat", b"data")]);
//!     let server = TestServer::start();
//!     // ... point an engine at saves.path() and server.addresses()
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::{read_tree, set_mtime, SaveRoot, TestServer};
    pub use crate::generators::{
        file_tree_strategy, inventory_pair_strategy, save_name_strategy, timestamp_strategy,
    };
}
