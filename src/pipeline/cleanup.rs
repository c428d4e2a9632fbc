//! Best-effort cleanup of transient batch directories.
//!
//! Runs after every batch, completed or cancelled. Failures are logged
//! and swallowed: a file locked by the OS never blocks batch teardown,
//! and the next batch recreates whatever it needs.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Removes the contents of `dir`, leaving the directory itself in place.
/// A missing directory is not an error.
pub fn remove_dir_contents(dir: &Path) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cleanup could not read directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let result = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Cleanup failed to remove entry");
        }
    }
    debug!(dir = %dir.display(), "Transient directory swept");
}

/// Sweeps all `dirs` on the blocking pool without awaiting the result.
pub fn spawn_cleanup(dirs: Vec<PathBuf>) {
    tokio::task::spawn_blocking(move || {
        for dir in &dirs {
            remove_dir_contents(dir);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sweeps_files_and_subdirectories() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("b.txt"), b"b").unwrap();

        remove_dir_contents(dir.path());

        assert!(dir.path().exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_directory_is_silent() {
        remove_dir_contents(Path::new("/nonexistent/veriform-cleanup"));
    }

    #[tokio::test]
    async fn spawn_cleanup_sweeps_in_background() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();

        spawn_cleanup(vec![dir.path().to_path_buf()]);

        // Poll briefly; the sweep runs on the blocking pool.
        for _ in 0..50 {
            if std::fs::read_dir(dir.path()).unwrap().count() == 0 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("cleanup did not run");
    }
}
