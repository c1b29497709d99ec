//! Property-based test generators using proptest.

use minesync_protocol::archive_name;
use proptest::prelude::*;
use std::collections::BTreeMap;

/// A name paired with a modification time in milliseconds.
pub type Stamped = (String, u64);

/// Strategy for save directory names, spaces included.
///
/// Names never start or end with a space and never contain `_`, so two
/// distinct names always map to distinct archive names.
pub fn save_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z0-9][A-Za-z0-9 ]{0,14}[A-Za-z0-9]")
        .expect("Invalid regex")
}

/// Strategy for modification times in milliseconds since the Unix epoch.
pub fn timestamp_strategy() -> impl Strategy<Value = u64> {
    1_000_000_000_000u64..2_000_000_000_000u64
}

/// Strategy for a small file tree: relative `/`-separated paths to contents.
pub fn file_tree_strategy() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    let path = prop::string::string_regex("[a-z]{1,6}(/[a-z]{1,6}){0,2}\\.dat")
        .expect("Invalid regex");
    // Files end in `.dat` and directories never do, so paths cannot clash.
    prop::collection::btree_map(path, prop::collection::vec(any::<u8>(), 0..512), 1..6)
}

/// Strategy for matching local and remote listings.
///
/// Produces `(local, remote)` where `local` holds `(name, millis)` pairs
/// and `remote` holds `(archive name, millis)` pairs. Some saves exist on
/// one side only, the rest on both with independent timestamps.
pub fn inventory_pair_strategy() -> impl Strategy<Value = (Vec<Stamped>, Vec<Stamped>)> {
    prop::collection::btree_map(
        save_name_strategy(),
        (0u8..3, timestamp_strategy(), timestamp_strategy()),
        0..10,
    )
    .prop_map(|saves| {
        let mut local = Vec::new();
        let mut remote = Vec::new();
        for (name, (side, local_time, remote_time)) in saves {
            if side != 1 {
                local.push((name.clone(), local_time));
            }
            if side != 0 {
                remote.push((archive_name(&name), remote_time));
            }
        }
        (local, remote)
    })
}
