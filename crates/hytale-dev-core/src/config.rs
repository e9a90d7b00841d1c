//! Local server configuration (`local.properties`)
//!
//! The file is created with documented defaults on first use so a fresh
//! checkout can run the server without any manual setup.

use crate::error::{HytaleDevError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Default configuration file name, relative to the project directory
pub const CONFIG_FILE_NAME: &str = "local.properties";

pub const KEY_VERSION: &str = "hytale.version";
pub const KEY_AUTH_MODE: &str = "hytale.auth.mode";
pub const KEY_SINGLEPLAYER_ENABLED: &str = "hytale.singleplayer.enabled";
pub const KEY_OWNER_NAME: &str = "hytale.owner.name";
pub const KEY_OWNER_UUID: &str = "hytale.owner.uuid";

/// Version folder used when `hytale.version` is not set
pub const DEFAULT_VERSION: &str = "latest";

/// Content written when no configuration file exists yet
pub const DEFAULT_CONFIG_TEMPLATE: &str = "\
# Local Hytale server settings
#
# Read by `hytale-dev run`. Keep this file out of version control,
# it holds machine and player specific values.

# Game version folder inside your Hytale installation (latest, dev, ...)
hytale.version=latest

# How the server authenticates players:
#   offline        no online authentication, LAN/local play
#   insecure       development mode, security checks disabled
#   authenticated  players must be authenticated by the official servers
hytale.auth.mode=authenticated

# Run the server in singleplayer mode (true/false).
# Offline mode usually needs this for the client to connect.
hytale.singleplayer.enabled=false

# Owner identity, required when singleplayer is enabled
hytale.owner.name=
hytale.owner.uuid=
";

/// How the server authenticates connecting players
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    Offline,
    Insecure,
    #[default]
    Authenticated,
}

impl AuthMode {
    /// Value passed to the server's `--auth-mode` flag
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Offline => "offline",
            AuthMode::Insecure => "insecure",
            AuthMode::Authenticated => "authenticated",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = HytaleDevError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "offline" => Ok(AuthMode::Offline),
            "insecure" => Ok(AuthMode::Insecure),
            "authenticated" => Ok(AuthMode::Authenticated),
            other => Err(HytaleDevError::Configuration(format!(
                "{} has unknown value '{}' (expected offline, insecure or authenticated)",
                KEY_AUTH_MODE, other
            ))),
        }
    }
}

/// Player that owns a singleplayer server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerIdentity {
    pub name: String,
    pub uuid: String,
}

/// Server configuration loaded from `local.properties`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerConfig {
    /// Game version folder inside the installation
    pub version: String,
    /// Authentication mode passed to the server
    pub auth_mode: AuthMode,
    /// Owner identity; `Some` when singleplayer mode is enabled
    pub singleplayer: Option<OwnerIdentity>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.into(),
            auth_mode: AuthMode::default(),
            singleplayer: None,
        }
    }
}

impl ServerConfig {
    /// Load the configuration at `path`, writing the default template first if
    /// the file does not exist
    pub fn load_or_init(path: &Path) -> Result<Self> {
        let exists = path.try_exists().map_err(|e| HytaleDevError::io(path, e))?;
        if !exists {
            warn!("{} not found, creating a default file", path.display());
            fs::write(path, DEFAULT_CONFIG_TEMPLATE).map_err(|e| HytaleDevError::io(path, e))?;
            info!(
                "Review {} and fill in your details if needed",
                path.display()
            );
        }

        let content = fs::read_to_string(path).map_err(|e| HytaleDevError::io(path, e))?;
        let props = Properties::parse(&content);
        debug!("Loaded {} ({} entries)", path.display(), props.len());
        Self::from_properties(&props)
    }

    /// Build a configuration from parsed properties.
    /// Unknown keys are ignored, missing keys fall back to defaults.
    pub fn from_properties(props: &Properties) -> Result<Self> {
        let version = props
            .get(KEY_VERSION)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_VERSION)
            .to_string();

        let auth_mode = match props.get(KEY_AUTH_MODE) {
            Some(value) if !value.is_empty() => value.parse()?,
            _ => AuthMode::default(),
        };

        let singleplayer_enabled = props
            .get(KEY_SINGLEPLAYER_ENABLED)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        let singleplayer = if singleplayer_enabled {
            Some(OwnerIdentity {
                name: required_owner_field(props, KEY_OWNER_NAME)?,
                uuid: required_owner_field(props, KEY_OWNER_UUID)?,
            })
        } else {
            None
        };

        Ok(Self {
            version,
            auth_mode,
            singleplayer,
        })
    }

    pub fn singleplayer_enabled(&self) -> bool {
        self.singleplayer.is_some()
    }
}

fn required_owner_field(props: &Properties, key: &str) -> Result<String> {
    match props.get(key) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(HytaleDevError::Configuration(format!(
            "{} is required in {} when {}=true",
            key, CONFIG_FILE_NAME, KEY_SINGLEPLAYER_ENABLED
        ))),
    }
}

/// Key/value pairs in Java properties syntax.
///
/// Supports `#`/`!` comments, `=`, `:` or whitespace separators and
/// backslash line continuations. Escape sequences other than continuations
/// are kept as written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: HashMap<String, String>,
}

impl Properties {
    pub fn parse(content: &str) -> Self {
        let mut entries = HashMap::new();
        let mut logical = String::new();

        for raw in content.lines() {
            // continuation lines drop their leading whitespace too
            let line = raw.trim_start();

            if logical.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
                continue;
            }

            if let Some(stripped) = continued(line) {
                logical.push_str(stripped);
                continue;
            }

            logical.push_str(line);
            if let Some((key, value)) = split_entry(&logical) {
                entries.insert(key, value);
            }
            logical.clear();
        }

        if !logical.is_empty() {
            if let Some((key, value)) = split_entry(&logical) {
                entries.insert(key, value);
            }
        }

        Self { entries }
    }

    /// Trimmed value for `key`, if present
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Returns the line without its continuation backslash when it ends with an
/// odd number of backslashes
fn continued(line: &str) -> Option<&str> {
    let trailing = line.chars().rev().take_while(|c| *c == '\\').count();
    if trailing % 2 == 1 {
        Some(&line[..line.len() - 1])
    } else {
        None
    }
}

fn split_entry(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let sep = line.find(|c: char| c == '=' || c == ':' || c.is_whitespace());
    let (key, rest) = match sep {
        Some(idx) => (&line[..idx], &line[idx..]),
        None => (line, ""),
    };

    // Whitespace may surround a single '=' or ':' separator
    let rest = rest.trim_start();
    let rest = rest
        .strip_prefix('=')
        .or_else(|| rest.strip_prefix(':'))
        .unwrap_or(rest);

    Some((key.to_string(), rest.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_parses_to_defaults() {
        let props = Properties::parse(DEFAULT_CONFIG_TEMPLATE);
        let config = ServerConfig::from_properties(&props).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(props.get(KEY_OWNER_NAME), Some(""));
    }

    #[test]
    fn test_missing_file_is_bootstrapped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        let config = ServerConfig::load_or_init(&path).unwrap();

        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.version, "latest");
        assert_eq!(config.auth_mode, AuthMode::Authenticated);
        assert!(!config.singleplayer_enabled());
        assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_CONFIG_TEMPLATE);
    }

    #[test]
    fn test_existing_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "hytale.version=dev\nhytale.auth.mode=offline\n").unwrap();

        let config = ServerConfig::load_or_init(&path).unwrap();

        assert_eq!(config.version, "dev");
        assert_eq!(config.auth_mode, AuthMode::Offline);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "hytale.version=dev\nhytale.auth.mode=offline\n"
        );
    }

    #[test]
    fn test_singleplayer_requires_owner() {
        let props = Properties::parse(
            "hytale.singleplayer.enabled=true\nhytale.owner.name=Alice\n",
        );
        let err = ServerConfig::from_properties(&props).unwrap_err();
        match err {
            HytaleDevError::Configuration(msg) => assert!(msg.contains(KEY_OWNER_UUID)),
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_singleplayer_rejects_empty_owner() {
        // The generated template leaves both owner fields blank
        let content = DEFAULT_CONFIG_TEMPLATE.replace(
            "hytale.singleplayer.enabled=false",
            "hytale.singleplayer.enabled=true",
        );
        let err = ServerConfig::from_properties(&Properties::parse(&content)).unwrap_err();
        assert!(matches!(err, HytaleDevError::Configuration(_)));
    }

    #[test]
    fn test_singleplayer_with_owner() {
        let props = Properties::parse(
            "hytale.singleplayer.enabled=TRUE\n\
             hytale.owner.name = Alice\n\
             hytale.owner.uuid: 1234\n",
        );
        let config = ServerConfig::from_properties(&props).unwrap();
        assert_eq!(
            config.singleplayer,
            Some(OwnerIdentity {
                name: "Alice".into(),
                uuid: "1234".into(),
            })
        );
    }

    #[test]
    fn test_non_true_boolean_is_false() {
        let props = Properties::parse("hytale.singleplayer.enabled=yes\n");
        let config = ServerConfig::from_properties(&props).unwrap();
        assert!(!config.singleplayer_enabled());
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let props = Properties::parse("some.other.key=1\nhytale.version=dev\n");
        let config = ServerConfig::from_properties(&props).unwrap();
        assert_eq!(config.version, "dev");
        assert_eq!(props.len(), 2);
    }

    #[test]
    fn test_invalid_auth_mode() {
        let props = Properties::parse("hytale.auth.mode=open\n");
        let err = ServerConfig::from_properties(&props).unwrap_err();
        assert!(err.to_string().contains("'open'"));
    }

    #[test]
    fn test_auth_mode_case_insensitive() {
        assert_eq!("Insecure".parse::<AuthMode>().unwrap(), AuthMode::Insecure);
        assert_eq!(AuthMode::Insecure.to_string(), "insecure");
    }

    #[test]
    fn test_properties_syntax() {
        let props = Properties::parse(
            "! bang comment\n\
             # hash comment\n\
             \n\
             spaced   value with spaces  \n\
             colon:value\n\
             multi=first \\\n\
             \x20   second\n\
             dup=1\n\
             dup=2\n\
             bare\n",
        );
        assert_eq!(props.get("spaced"), Some("value with spaces"));
        assert_eq!(props.get("colon"), Some("value"));
        assert_eq!(props.get("multi"), Some("first second"));
        assert_eq!(props.get("dup"), Some("2"));
        assert_eq!(props.get("bare"), Some(""));
        assert_eq!(props.get("#"), None);
    }
}
