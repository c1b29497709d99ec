//! Mapping from local save names to remote archive names.
//!
//! A local save called `World 1` is stored remotely as
//! `minesync_World_1.zip`. The mapping is one-way: underscores already
//! present in a save name are indistinguishable from replaced spaces, so
//! the original name cannot be recovered from the archive name.

/// Namespace prefix of every archive name.
pub const ARCHIVE_PREFIX: &str = "minesync_";

/// Archive-format suffix of every archive name.
pub const ARCHIVE_SUFFIX: &str = ".zip";

/// Returns the canonical remote archive name for a local save name.
///
/// # Example
///
/// ```
/// use minesync_protocol::archive_name;
///
/// assert_eq!(archive_name("World 1"), "minesync_World_1.zip");
/// ```
pub fn archive_name(save_name: &str) -> String {
    let mut name =
        String::with_capacity(ARCHIVE_PREFIX.len() + save_name.len() + ARCHIVE_SUFFIX.len());
    name.push_str(ARCHIVE_PREFIX);
    name.push_str(&save_name.replace(' ', "_"));
    name.push_str(ARCHIVE_SUFFIX);
    name
}

/// Returns true if `name` has the shape of an archive name.
pub fn is_archive_name(name: &str) -> bool {
    name.len() > ARCHIVE_PREFIX.len() + ARCHIVE_SUFFIX.len()
        && name.starts_with(ARCHIVE_PREFIX)
        && name.ends_with(ARCHIVE_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn spaces_become_underscores() {
        assert_eq!(archive_name("World 1"), "minesync_World_1.zip");
        assert_eq!(archive_name("  a  b "), "minesync___a__b_.zip");
        assert_eq!(archive_name("Plain"), "minesync_Plain.zip");
    }

    #[test]
    fn underscore_names_collide() {
        assert_eq!(archive_name("My World"), archive_name("My_World"));
    }

    #[test]
    fn empty_name_still_maps() {
        assert_eq!(archive_name(""), "minesync_.zip");
        assert!(!is_archive_name(&archive_name("")));
    }

    #[test]
    fn recognizes_archive_names() {
        assert!(is_archive_name("minesync_World_1.zip"));
        assert!(!is_archive_name("World_1.zip"));
        assert!(!is_archive_name("minesync_World_1"));
    }

    proptest! {
        #[test]
        fn mapping_is_deterministic(name in ".{0,40}") {
            prop_assert_eq!(archive_name(&name), archive_name(&name));
        }

        #[test]
        fn prefix_and_suffix_are_fixed(name in ".{0,40}") {
            let mapped = archive_name(&name);
            prop_assert!(mapped.starts_with(ARCHIVE_PREFIX));
            prop_assert!(mapped.ends_with(ARCHIVE_SUFFIX));
            prop_assert!(!mapped.contains(' '));
            prop_assert_eq!(
                mapped.len(),
                ARCHIVE_PREFIX.len() + name.len() + ARCHIVE_SUFFIX.len()
            );
        }
    }
}
