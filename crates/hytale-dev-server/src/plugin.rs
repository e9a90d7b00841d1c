//! Plugin artifact lookup

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

/// Where the build writes its jars, relative to the project directory
pub const BUILD_LIBS_DIR: &str = "build/libs";

/// Classifier of the shaded jar, which bundles the plugin's dependencies
const SHADED_SUFFIX: &str = "-all";

const IGNORED_SUFFIXES: [&str; 2] = ["-sources", "-javadoc"];

/// Find the plugin jar to deploy.
///
/// An explicit path is used as-is when it exists. Otherwise the newest jar in
/// `build/libs` is picked, preferring shaded (`*-all.jar`) output.
pub fn resolve_plugin_artifact(project_dir: &Path, explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            project_dir.join(path)
        };
        if path.is_file() {
            return Some(path);
        }
        warn!("Plugin artifact {} does not exist", path.display());
        return None;
    }

    let libs = project_dir.join(BUILD_LIBS_DIR);
    let found = newest_jar(&libs);
    match &found {
        Some(path) => debug!("Using plugin artifact {}", path.display()),
        None => debug!("No plugin jar in {}", libs.display()),
    }
    found
}

fn newest_jar(dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;

    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter_map(|path| {
            let stem = jar_stem(&path)?;
            if IGNORED_SUFFIXES.iter().any(|s| stem.ends_with(s)) {
                return None;
            }
            let shaded = stem.ends_with(SHADED_SUFFIX);
            let modified = fs::metadata(&path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            Some((shaded, modified, path))
        })
        .max()
        .map(|(_, _, path)| path)
}

fn jar_stem(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    if !ext.eq_ignore_ascii_case("jar") {
        return None;
    }
    path.file_stem()?.to_str().map(str::to_string)
}
