//! Java runtime lookup

use hytale_dev_core::{HytaleDevError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[cfg(windows)]
const JAVA_EXECUTABLE: &str = "java.exe";
#[cfg(not(windows))]
const JAVA_EXECUTABLE: &str = "java";

/// Find the Java executable used to run the server.
///
/// Checks the explicit path, then `JAVA_HOME`, then `PATH`.
pub fn resolve_java(explicit: Option<&Path>) -> Result<PathBuf> {
    resolve_java_with(explicit, std::env::var_os("JAVA_HOME"), |name| {
        which::which(name).ok()
    })
}

fn resolve_java_with<F>(
    explicit: Option<&Path>,
    java_home: Option<OsString>,
    search_path: F,
) -> Result<PathBuf>
where
    F: Fn(&Path) -> Option<PathBuf>,
{
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        // A bare name like `java21` is looked up on PATH
        if path.components().count() == 1 {
            if let Some(found) = search_path(path) {
                return Ok(found);
            }
        }
        return Err(HytaleDevError::Launch(format!(
            "Java runtime {} does not exist",
            path.display()
        )));
    }

    if let Some(home) = java_home.filter(|h| !h.is_empty()) {
        let java = java_in_home(Path::new(&home));
        if java.is_file() {
            info!("Using Java from JAVA_HOME: {}", java.display());
            return Ok(java);
        }
        warn!("JAVA_HOME is set, but {} does not exist", java.display());
    }

    match search_path(Path::new(JAVA_EXECUTABLE)) {
        Some(java) => {
            debug!("Using Java from PATH: {}", java.display());
            Ok(java)
        }
        None => Err(HytaleDevError::Launch(
            "Java runtime not found. Set JAVA_HOME, add java to PATH or pass --java".into(),
        )),
    }
}

fn java_in_home(home: &Path) -> PathBuf {
    home.join("bin").join(JAVA_EXECUTABLE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fake_java_home() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let java = java_in_home(tmp.path());
        fs::create_dir_all(java.parent().unwrap()).unwrap();
        fs::write(&java, b"").unwrap();
        (tmp, java)
    }

    #[test]
    fn test_explicit_path_wins() {
        let (home, java) = fake_java_home();
        let other = home.path().join("other-java");
        fs::write(&other, b"").unwrap();

        let found =
            resolve_java_with(Some(other.as_path()), Some(home.path().into()), |_| None).unwrap();
        assert_eq!(found, other);
        assert_ne!(found, java);
    }

    #[test]
    fn test_explicit_bare_name_uses_path() {
        let found = resolve_java_with(Some(Path::new("java21")), None, |name| {
            Some(Path::new("/opt/bin").join(name))
        })
        .unwrap();
        assert_eq!(found, PathBuf::from("/opt/bin/java21"));
    }

    #[test]
    fn test_missing_explicit_path() {
        let err = resolve_java_with(Some(Path::new("/no/such/java")), None, |_| None).unwrap_err();
        assert!(matches!(err, HytaleDevError::Launch(_)));
    }

    #[test]
    fn test_java_home() {
        let (home, java) = fake_java_home();
        let found = resolve_java_with(None, Some(home.path().into()), |_| None).unwrap();
        assert_eq!(found, java);
    }

    #[test]
    fn test_invalid_java_home_falls_back_to_path() {
        let home = tempfile::tempdir().unwrap();
        let found = resolve_java_with(None, Some(home.path().into()), |_| {
            Some(PathBuf::from("/usr/bin/java"))
        })
        .unwrap();
        assert_eq!(found, PathBuf::from("/usr/bin/java"));
    }

    #[test]
    fn test_not_found() {
        let err = resolve_java_with(None, None, |_| None).unwrap_err();
        assert!(err.to_string().contains("JAVA_HOME"));
    }
}
