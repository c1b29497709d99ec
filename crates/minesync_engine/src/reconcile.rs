//! Inventory reconciliation.
//!
//! Decides which saves move in which direction. A local save matches a
//! remote save when the local name, mapped through the archive naming
//! scheme, equals the remote name. For a matching pair the strictly newer
//! side is transferred; equal timestamps transfer nothing.
//!
//! Everything here is pure: the same inventories always produce the same
//! lists, in inventory order.

use crate::inventory::{Inventory, SaveEntry};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Saves that map to the same archive name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameCollision {
    /// The shared archive name.
    pub archive_name: String,
    /// Local save names that map to it, in inventory order.
    pub saves: Vec<String>,
}

/// The outcome of reconciling two inventories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    /// Local saves to upload.
    pub uploads: Vec<SaveEntry>,
    /// Remote saves to download.
    pub downloads: Vec<SaveEntry>,
    /// Local saves left out because their archive names collide.
    pub collisions: Vec<NameCollision>,
}

impl SyncPlan {
    /// Returns true if nothing needs to be transferred.
    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty() && self.downloads.is_empty()
    }
}

/// Returns the local saves that must be uploaded.
///
/// A local save is uploaded when no remote save matches it, or when the
/// first matching remote save is strictly older.
pub fn compute_uploads(local: &Inventory, remote: &Inventory) -> Vec<SaveEntry> {
    uploads_from(local.entries(), remote.entries())
}

/// Returns the remote saves that must be downloaded.
///
/// A remote save is downloaded when no local save matches it, or when the
/// first matching local save is strictly older.
pub fn compute_downloads(local: &Inventory, remote: &Inventory) -> Vec<SaveEntry> {
    downloads_from(local.entries(), remote.entries())
}

/// Finds local saves whose archive names collide.
///
/// Collisions are ordered by first appearance in the inventory.
pub fn find_collisions(local: &Inventory) -> Vec<NameCollision> {
    let mut groups: BTreeMap<String, (usize, Vec<String>)> = BTreeMap::new();
    for (index, entry) in local.iter().enumerate() {
        groups
            .entry(entry.archive_name())
            .or_insert_with(|| (index, Vec::new()))
            .1
            .push(entry.name.clone());
    }

    let mut collisions: Vec<(usize, NameCollision)> = groups
        .into_iter()
        .filter(|(_, (_, saves))| saves.len() > 1)
        .map(|(archive_name, (first, saves))| (first, NameCollision { archive_name, saves }))
        .collect();
    collisions.sort_by_key(|(first, _)| *first);
    collisions.into_iter().map(|(_, c)| c).collect()
}

/// Reconciles two inventories into a full plan.
///
/// Local saves involved in an archive-name collision are excluded from
/// both directions: uploading either would overwrite the other remotely,
/// and a download could land on the wrong one.
pub fn reconcile(local: &Inventory, remote: &Inventory) -> SyncPlan {
    let collisions = find_collisions(local);
    if collisions.is_empty() {
        return SyncPlan {
            uploads: compute_uploads(local, remote),
            downloads: compute_downloads(local, remote),
            collisions,
        };
    }

    let colliding: HashSet<&str> = collisions
        .iter()
        .map(|c| c.archive_name.as_str())
        .collect();
    let usable: Vec<SaveEntry> = local
        .iter()
        .filter(|e| !colliding.contains(e.archive_name().as_str()))
        .cloned()
        .collect();
    let downloads = downloads_from(&usable, remote.entries())
        .into_iter()
        .filter(|e| !colliding.contains(e.name.as_str()))
        .collect();

    SyncPlan {
        uploads: uploads_from(&usable, remote.entries()),
        downloads,
        collisions,
    }
}

fn uploads_from(local: &[SaveEntry], remote: &[SaveEntry]) -> Vec<SaveEntry> {
    local
        .iter()
        .filter(|l| {
            let wanted = l.archive_name();
            match remote.iter().find(|r| r.name == wanted) {
                None => true,
                Some(r) => l.last_modified > r.last_modified,
            }
        })
        .cloned()
        .collect()
}

fn downloads_from(local: &[SaveEntry], remote: &[SaveEntry]) -> Vec<SaveEntry> {
    remote
        .iter()
        .filter(|r| match local.iter().find(|l| l.archive_name() == r.name) {
            None => true,
            Some(l) => r.last_modified > l.last_modified,
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn local(entries: &[(&str, u64)]) -> Inventory {
        Inventory::from_entries(
            entries
                .iter()
                .map(|(n, t)| SaveEntry::local(*n, *t))
                .collect(),
        )
        .unwrap()
    }

    fn remote(entries: &[(&str, u64)]) -> Inventory {
        Inventory::from_entries(
            entries
                .iter()
                .map(|(n, t)| SaveEntry::remote(*n, *t))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn newer_local_is_uploaded() {
        let l = local(&[("World 1", 100)]);
        let r = remote(&[("minesync_World_1.zip", 50)]);

        assert_eq!(compute_uploads(&l, &r), vec![SaveEntry::local("World 1", 100)]);
        assert!(compute_downloads(&l, &r).is_empty());
    }

    #[test]
    fn newer_remote_is_downloaded() {
        let l = local(&[("World 1", 50)]);
        let r = remote(&[("minesync_World_1.zip", 100)]);

        assert!(compute_uploads(&l, &r).is_empty());
        assert_eq!(
            compute_downloads(&l, &r),
            vec![SaveEntry::remote("minesync_World_1.zip", 100)]
        );
    }

    #[test]
    fn remote_only_save_is_downloaded() {
        let l = local(&[]);
        let r = remote(&[("minesync_New.zip", 10)]);

        assert!(compute_uploads(&l, &r).is_empty());
        assert_eq!(
            compute_downloads(&l, &r),
            vec![SaveEntry::remote("minesync_New.zip", 10)]
        );
    }

    #[test]
    fn equal_timestamps_transfer_nothing() {
        let l = local(&[("World 1", 70)]);
        let r = remote(&[("minesync_World_1.zip", 70)]);

        assert!(compute_uploads(&l, &r).is_empty());
        assert!(compute_downloads(&l, &r).is_empty());
    }

    #[test]
    fn output_follows_input_order() {
        let l = local(&[("C", 1), ("A", 1), ("B", 1)]);
        let r = remote(&[("minesync_Z.zip", 1), ("minesync_Y.zip", 1)]);

        let ups: Vec<_> = compute_uploads(&l, &r).into_iter().map(|e| e.name).collect();
        let downs: Vec<_> = compute_downloads(&l, &r)
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(ups, vec!["C", "A", "B"]);
        assert_eq!(downs, vec!["minesync_Z.zip", "minesync_Y.zip"]);
    }

    #[test]
    fn remote_name_is_matched_exactly() {
        // "World 1" only matches its mapped name, not the raw one.
        let l = local(&[("World 1", 10)]);
        let r = remote(&[("World 1", 99)]);

        assert_eq!(compute_uploads(&l, &r).len(), 1);
        assert_eq!(compute_downloads(&l, &r).len(), 1);
    }

    #[test]
    fn collisions_are_detected_in_order() {
        let l = local(&[("b b", 1), ("My World", 1), ("b_b", 2), ("My_World", 3), ("solo", 4)]);
        let collisions = find_collisions(&l);

        assert_eq!(
            collisions,
            vec![
                NameCollision {
                    archive_name: "minesync_b_b.zip".into(),
                    saves: vec!["b b".into(), "b_b".into()],
                },
                NameCollision {
                    archive_name: "minesync_My_World.zip".into(),
                    saves: vec!["My World".into(), "My_World".into()],
                },
            ]
        );
    }

    #[test]
    fn colliding_saves_are_excluded_from_the_plan() {
        let l = local(&[("My World", 10), ("My_World", 20), ("Other", 5)]);
        let r = remote(&[("minesync_My_World.zip", 99), ("minesync_Other.zip", 1)]);

        let plan = reconcile(&l, &r);
        assert_eq!(plan.uploads, vec![SaveEntry::local("Other", 5)]);
        assert!(plan.downloads.is_empty());
        assert_eq!(plan.collisions.len(), 1);
    }

    #[test]
    fn plan_without_collisions_matches_the_pure_functions() {
        let l = local(&[("A", 5), ("B", 1)]);
        let r = remote(&[("minesync_A.zip", 1), ("minesync_B.zip", 5), ("minesync_C.zip", 1)]);

        let plan = reconcile(&l, &r);
        assert_eq!(plan.uploads, compute_uploads(&l, &r));
        assert_eq!(plan.downloads, compute_downloads(&l, &r));
        assert!(plan.collisions.is_empty());
        assert!(!plan.is_empty());
    }

    fn archived(save: &str, last_modified: u64) -> SaveEntry {
        SaveEntry::remote(format!("minesync_{save}.zip"), last_modified)
    }

    fn pair_strategy() -> impl Strategy<Value = Vec<(String, u64, u64)>> {
        prop::collection::btree_map("[A-Za-z0-9]{1,12}", (0u64..1000, 0u64..1000), 0..12)
            .prop_map(|m| m.into_iter().map(|(n, (a, b))| (n, a, b)).collect())
    }

    proptest! {
        #[test]
        fn disjoint_inventories_transfer_everything(
            locals in prop::collection::btree_map("[a-m]{1,8}", 0u64..1000, 0..10),
            remotes in prop::collection::btree_map("[n-z]{1,8}", 0u64..1000, 0..10),
        ) {
            let l = Inventory::from_entries(
                locals.iter().map(|(n, t)| SaveEntry::local(n.clone(), *t)).collect()
            ).unwrap();
            let r = Inventory::from_entries(
                remotes.iter().map(|(n, t)| archived(n, *t)).collect()
            ).unwrap();

            prop_assert_eq!(compute_uploads(&l, &r), l.entries().to_vec());
            prop_assert_eq!(compute_downloads(&l, &r), r.entries().to_vec());
        }

        #[test]
        fn matching_pairs_never_transfer_both_ways(pairs in pair_strategy()) {
            let l = Inventory::from_entries(
                pairs.iter().map(|(n, lt, _)| SaveEntry::local(n.clone(), *lt)).collect()
            ).unwrap();
            let r = Inventory::from_entries(
                pairs.iter().map(|(n, _, rt)| archived(n, *rt)).collect()
            ).unwrap();

            let ups = compute_uploads(&l, &r);
            let downs = compute_downloads(&l, &r);

            for (name, lt, rt) in &pairs {
                let up = ups.iter().any(|e| &e.name == name);
                let down = downs.iter().any(|e| e.name == format!("minesync_{name}.zip"));
                prop_assert!(!(up && down));
                prop_assert_eq!(up, lt > rt);
                prop_assert_eq!(down, rt > lt);
                if lt == rt {
                    prop_assert!(!up && !down);
                }
            }
        }

        #[test]
        fn reconciliation_is_deterministic(pairs in pair_strategy()) {
            let l = Inventory::from_entries(
                pairs.iter().map(|(n, lt, _)| SaveEntry::local(n.clone(), *lt)).collect()
            ).unwrap();
            let r = Inventory::from_entries(
                pairs.iter().map(|(n, _, rt)| archived(n, *rt)).collect()
            ).unwrap();

            prop_assert_eq!(reconcile(&l, &r), reconcile(&l, &r));
        }
    }
}
