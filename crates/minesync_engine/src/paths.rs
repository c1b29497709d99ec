//! Save-games root resolution.
//!
//! Each platform maps to one or more rules of the form "base directory +
//! relative suffix". Rules are tried in table order and the first candidate
//! that exists on disk wins:
//!
//! ```text
//! linux    ~/.minecraft/saves
//! macos    ~/Library/Application Support/minecraft/saves
//! windows  %APPDATA%/.minecraft/saves
//!          %LOCALAPPDATA%/Packages/Microsoft.MinecraftUWP_8wekyb3d8bbwe/LocalState/games/com.mojang
//! ```

use crate::error::{SyncError, SyncResult};
use std::path::PathBuf;

/// A well-known per-user base directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseDir {
    /// The user's home directory.
    Home,
    /// Roaming application data (`%APPDATA%` on Windows).
    RoamingAppData,
    /// Local application data (`%LOCALAPPDATA%` on Windows).
    LocalAppData,
}

/// One path-construction rule for a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformRule {
    /// Platform identifier, as in `std::env::consts::OS`.
    pub platform: &'static str,
    /// Base directory the suffix is joined onto.
    pub base: BaseDir,
    /// Path below the base directory, `/`-separated.
    pub suffix: &'static str,
}

/// All known save-games locations, in lookup order.
pub const PLATFORM_RULES: &[PlatformRule] = &[
    PlatformRule {
        platform: "linux",
        base: BaseDir::Home,
        suffix: ".minecraft/saves",
    },
    PlatformRule {
        platform: "macos",
        base: BaseDir::Home,
        suffix: "Library/Application Support/minecraft/saves",
    },
    PlatformRule {
        platform: "windows",
        base: BaseDir::RoamingAppData,
        suffix: ".minecraft/saves",
    },
    PlatformRule {
        platform: "windows",
        base: BaseDir::LocalAppData,
        suffix: "Packages/Microsoft.MinecraftUWP_8wekyb3d8bbwe/LocalState/games/com.mojang",
    },
];

/// Source of base directories.
pub trait BaseDirs {
    /// Returns the path of a base directory, if known.
    fn base_dir(&self, base: BaseDir) -> Option<PathBuf>;
}

/// Base directories of the current user, as reported by the OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDirs;

impl BaseDirs for SystemDirs {
    fn base_dir(&self, base: BaseDir) -> Option<PathBuf> {
        match base {
            BaseDir::Home => dirs::home_dir(),
            BaseDir::RoamingAppData => dirs::data_dir(),
            BaseDir::LocalAppData => dirs::data_local_dir(),
        }
    }
}

/// Returns every candidate save-games root for `platform`, in lookup order.
///
/// Rules whose base directory is unknown are left out.
pub fn candidate_paths(platform: &str, dirs: &dyn BaseDirs) -> Vec<PathBuf> {
    PLATFORM_RULES
        .iter()
        .filter(|rule| rule.platform == platform)
        .filter_map(|rule| {
            let mut path = dirs.base_dir(rule.base)?;
            path.extend(rule.suffix.split('/'));
            Some(path)
        })
        .collect()
}

/// Resolves the save-games root for `platform`.
///
/// # Errors
///
/// Returns [`SyncError::PathResolution`] if the platform has no rules or
/// none of its candidates is an existing directory.
pub fn resolve_save_root(platform: &str, dirs: &dyn BaseDirs) -> SyncResult<PathBuf> {
    if !PLATFORM_RULES.iter().any(|rule| rule.platform == platform) {
        return Err(SyncError::PathResolution(format!(
            "unsupported platform: {platform}"
        )));
    }

    let candidates = candidate_paths(platform, dirs);
    if let Some(found) = candidates.iter().find(|path| path.is_dir()) {
        return Ok(found.clone());
    }

    let tried = candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(SyncError::PathResolution(format!(
        "no save-games directory found (tried: {tried})"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct FakeDirs {
        home: Option<PathBuf>,
        roaming: Option<PathBuf>,
        local: Option<PathBuf>,
    }

    impl BaseDirs for FakeDirs {
        fn base_dir(&self, base: BaseDir) -> Option<PathBuf> {
            match base {
                BaseDir::Home => self.home.clone(),
                BaseDir::RoamingAppData => self.roaming.clone(),
                BaseDir::LocalAppData => self.local.clone(),
            }
        }
    }

    fn fake(root: &std::path::Path) -> FakeDirs {
        FakeDirs {
            home: Some(root.join("home")),
            roaming: Some(root.join("roaming")),
            local: Some(root.join("local")),
        }
    }

    #[test]
    fn candidates_per_platform() {
        let dirs = fake(std::path::Path::new("/u"));

        assert_eq!(
            candidate_paths("linux", &dirs),
            vec![PathBuf::from("/u/home/.minecraft/saves")]
        );
        assert_eq!(
            candidate_paths("macos", &dirs),
            vec![PathBuf::from(
                "/u/home/Library/Application Support/minecraft/saves"
            )]
        );
        assert_eq!(candidate_paths("windows", &dirs).len(), 2);
        assert!(candidate_paths("plan9", &dirs).is_empty());
    }

    #[test]
    fn unknown_base_dir_is_skipped() {
        let dirs = FakeDirs {
            home: None,
            roaming: None,
            local: Some(PathBuf::from("/l")),
        };
        let candidates = candidate_paths("windows", &dirs);
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].starts_with("/l/Packages"));
    }

    #[test]
    fn resolves_existing_directory() {
        let tmp = TempDir::new().unwrap();
        let dirs = fake(tmp.path());
        let saves = tmp.path().join("home").join(".minecraft").join("saves");
        fs::create_dir_all(&saves).unwrap();

        assert_eq!(resolve_save_root("linux", &dirs).unwrap(), saves);
    }

    #[test]
    fn windows_falls_back_to_second_rule() {
        let tmp = TempDir::new().unwrap();
        let dirs = fake(tmp.path());
        let uwp = candidate_paths("windows", &dirs).pop().unwrap();
        fs::create_dir_all(&uwp).unwrap();

        assert_eq!(resolve_save_root("windows", &dirs).unwrap(), uwp);
    }

    #[test]
    fn missing_directory_is_a_resolution_error() {
        let tmp = TempDir::new().unwrap();
        let dirs = fake(tmp.path());

        let err = resolve_save_root("linux", &dirs).unwrap_err();
        assert!(matches!(err, SyncError::PathResolution(_)));
        assert!(err.to_string().contains(".minecraft"));
    }

    #[test]
    fn unsupported_platform() {
        let dirs = fake(std::path::Path::new("/u"));
        let err = resolve_save_root("plan9", &dirs).unwrap_err();
        assert!(err.to_string().contains("unsupported platform"));
    }
}
