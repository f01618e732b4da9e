//! Chrome profile directory management
//!
//! Each session gets its own UUID-named profile directory under the temp dir.
//! Directories left behind by a crashed run are swept by
//! [`cleanup_stale_profiles`] once their `SingletonLock` owner is gone.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// RAII wrapper for Chrome profile directory
///
/// Removes the directory on drop unless `into_path()` handed ownership to a
/// session.
#[derive(Debug)]
pub struct BrowserProfile {
    path: PathBuf,
    cleanup_on_drop: bool,
}

impl BrowserProfile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            cleanup_on_drop: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Consume the profile and return the path, disabling auto-cleanup
    pub fn into_path(mut self) -> PathBuf {
        self.cleanup_on_drop = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for BrowserProfile {
    fn drop(&mut self) {
        if self.cleanup_on_drop {
            remove_profile_dir(&self.path);
        }
    }
}

/// Create `<temp>/<prefix>_<uuid>`
///
/// `create_dir` (not `create_dir_all`) so a collision fails instead of two
/// sessions sharing a profile.
pub fn create_unique_profile_with_prefix(prefix: &str) -> Result<BrowserProfile> {
    create_unique_profile_in(&std::env::temp_dir(), prefix)
}

pub fn create_unique_profile_in(parent: &Path, prefix: &str) -> Result<BrowserProfile> {
    let path = parent.join(format!("{}_{}", prefix, Uuid::new_v4()));

    std::fs::create_dir(&path)
        .with_context(|| format!("Failed to create profile directory: {}", path.display()))?;

    debug!("Created Chrome profile directory: {}", path.display());
    Ok(BrowserProfile::new(path))
}

/// Remove a profile directory, logging instead of failing
pub fn remove_profile_dir(path: &Path) {
    if !path.exists() {
        return;
    }
    debug!("Removing profile directory {}", path.display());
    if let Err(e) = std::fs::remove_dir_all(path) {
        warn!("Failed to remove profile directory {}: {}", path.display(), e);
    }
}

/// Check if a SingletonLock file is stale (Chrome process no longer running)
///
/// SingletonLock is a symlink with target `{hostname}-{PID}`.
#[cfg(unix)]
pub fn is_singleton_lock_stale(profile_dir: &Path) -> bool {
    let lock_path = profile_dir.join("SingletonLock");

    if !lock_path.exists() && !lock_path.is_symlink() {
        return true;
    }

    match std::fs::read_link(&lock_path) {
        Ok(target) => {
            let target_str = target.to_string_lossy();

            if let Some(pid_str) = target_str.rsplit('-').next()
                && let Ok(pid) = pid_str.parse::<i32>()
            {
                // kill(pid, 0) probes for existence without signalling
                let exists = unsafe { libc::kill(pid, 0) == 0 };
                if !exists {
                    debug!("SingletonLock is stale: PID {} no longer exists", pid);
                }
                return !exists;
            }
            warn!("Could not parse PID from SingletonLock target: {}", target_str);
            false
        }
        Err(_) => lock_path.is_file(),
    }
}

#[cfg(not(unix))]
pub fn is_singleton_lock_stale(_profile_dir: &Path) -> bool {
    true
}

/// Remove orphaned `<prefix>_*` profile directories from the temp dir
///
/// Run at the start and end of every crawl run. Directories whose Chrome is
/// still alive (another run in progress) are left alone.
pub fn cleanup_stale_profiles(prefix: &str) -> Result<usize> {
    cleanup_stale_profiles_in(&std::env::temp_dir(), prefix)
}

pub fn cleanup_stale_profiles_in(parent: &Path, prefix: &str) -> Result<usize> {
    let mut cleaned = 0;
    let marker = format!("{prefix}_");

    let entries = std::fs::read_dir(parent)
        .with_context(|| format!("Failed to read directory: {}", parent.display()))?;

    for entry in entries.flatten() {
        let path = entry.path();

        if let Some(name) = path.file_name().and_then(|n| n.to_str())
            && name.starts_with(&marker)
            && path.is_dir()
            && is_singleton_lock_stale(&path)
        {
            match std::fs::remove_dir_all(&path) {
                Ok(()) => cleaned += 1,
                Err(e) => warn!("Failed to remove stale profile {}: {}", path.display(), e),
            }
        }
    }

    if cleaned > 0 {
        info!("Cleaned {} stale Chrome profile directories", cleaned);
    }

    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_is_removed_on_drop_unless_taken() {
        let parent = tempfile::tempdir().unwrap();

        let profile = create_unique_profile_in(parent.path(), "jobhub_chrome").unwrap();
        let dropped_path = profile.path().to_path_buf();
        assert!(dropped_path.exists());
        drop(profile);
        assert!(!dropped_path.exists());

        let kept = create_unique_profile_in(parent.path(), "jobhub_chrome")
            .unwrap()
            .into_path();
        assert!(kept.exists());
    }

    #[test]
    fn sweep_only_touches_matching_prefix() {
        let parent = tempfile::tempdir().unwrap();
        let orphan = create_unique_profile_in(parent.path(), "jobhub_chrome")
            .unwrap()
            .into_path();
        std::fs::write(orphan.join("Preferences"), "{}").unwrap();
        let unrelated = parent.path().join("other_profile");
        std::fs::create_dir(&unrelated).unwrap();

        let cleaned = cleanup_stale_profiles_in(parent.path(), "jobhub_chrome").unwrap();
        assert_eq!(cleaned, 1);
        assert!(!orphan.exists());
        assert!(unrelated.exists());
    }
}
