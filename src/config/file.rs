//! Config file discovery and parsing.
//!
//! Files are YAML unless their extension is `.json`.

use super::types::AppConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming a config file, consulted after `--config`.
pub const CONFIG_ENV_VAR: &str = "MATRIX_HISTORY_CONFIG";

const FILE_NAMES: [&str; 3] = [
    ".matrix-history.yaml",
    ".matrix-history.yml",
    ".matrix-history.json",
];

/// Locate the config file to use.
///
/// Precedence: the explicit path, then `$MATRIX_HISTORY_CONFIG`, then the
/// working directory and each of its ancestors, then
/// `~/.config/matrix-history/`. Paths that do not exist are skipped.
#[must_use]
pub fn discover_config_file(explicit_path: Option<&Path>) -> Option<PathBuf> {
    let from_env = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
    if let Some(path) = explicit_path
        .map(Path::to_path_buf)
        .into_iter()
        .chain(from_env)
        .find(|p| p.is_file())
    {
        return Some(path);
    }

    let cwd = std::env::current_dir().ok();
    let user_dir = dirs::config_dir().map(|d| d.join("matrix-history"));
    cwd.iter()
        .flat_map(|dir| dir.ancestors())
        .map(Path::to_path_buf)
        .chain(user_dir)
        .find_map(|dir| file_in(&dir))
}

fn file_in(dir: &Path) -> Option<PathBuf> {
    FILE_NAMES.iter().map(|name| dir.join(name)).find(|p| p.is_file())
}

/// Why a config file could not be used.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Parse one config file. Missing sections and keys take their defaults.
pub fn load_config_file(path: &Path) -> Result<AppConfig, ConfigFileError> {
    let text = std::fs::read_to_string(path).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => ConfigFileError::NotFound(path.to_path_buf()),
        _ => ConfigFileError::Read {
            path: path.to_path_buf(),
            source,
        },
    })?;

    if is_json(path) {
        serde_json::from_str(&text).map_err(|source| ConfigFileError::Json {
            path: path.to_path_buf(),
            source,
        })
    } else if text.trim().is_empty() {
        Ok(AppConfig::default())
    } else {
        serde_yaml::from_str(&text).map_err(|source| ConfigFileError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// The discovered config and where it came from.
///
/// An unreadable file is logged and replaced by defaults, so a broken
/// config never stops a command.
#[must_use]
pub fn load_or_default(explicit_path: Option<&Path>) -> (AppConfig, Option<PathBuf>) {
    let Some(path) = discover_config_file(explicit_path) else {
        return (AppConfig::default(), None);
    };
    match load_config_file(&path) {
        Ok(config) => {
            tracing::debug!(path = %path.display(), "Loaded configuration");
            (config, Some(path))
        }
        Err(e) => {
            tracing::warn!("{e}; using default configuration");
            (AppConfig::default(), None)
        }
    }
}

/// Commented YAML with every default spelled out, for `config init`.
#[must_use]
pub fn generate_example_config() -> String {
    let body = serde_yaml::to_string(&AppConfig::default()).unwrap_or_default();
    format!(
        "# matrix-history configuration\n\
         # Found in the working directory or any parent, or in ~/.config/matrix-history/.\n\
         # Point ${CONFIG_ENV_VAR} at a file to override discovery.\n\
         # TTLs are in seconds.\n\n{body}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_partial_sections_keep_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("history.yaml");
        std::fs::write(
            &path,
            "cache:\n  key_prefix: fw\n  diff_ttl_secs: 60\npagination:\n  default_page_size: 20\n",
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.cache.key_prefix, "fw");
        assert_eq!(config.cache.diff_ttl_secs, 60);
        assert_eq!(config.cache.snapshot_ttl_secs, 86_400);
        assert_eq!(config.pagination.default_page_size, 20);
    }

    #[test]
    fn test_json_by_extension() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("history.JSON");
        std::fs::write(&path, r#"{"search": {"max_results": 7}}"#).unwrap();
        assert_eq!(load_config_file(&path).unwrap().search.max_results, 7);

        std::fs::write(&path, "search: {}").unwrap();
        assert!(matches!(load_config_file(&path), Err(ConfigFileError::Json { .. })));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".matrix-history.yaml");
        std::fs::write(&path, "\n").unwrap();
        assert_eq!(load_config_file(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_missing_file() {
        let result = load_config_file(Path::new("/nonexistent/history.yaml"));
        assert!(matches!(result, Err(ConfigFileError::NotFound(_))));
    }

    #[test]
    fn test_broken_file_falls_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.yaml");
        std::fs::write(&path, "pagination: [not, a, map]\n").unwrap();

        let (config, loaded_from) = load_or_default(Some(&path));
        assert_eq!(config, AppConfig::default());
        assert!(loaded_from.is_none());
    }

    #[test]
    fn test_file_in_prefers_yaml() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(file_in(tmp.path()), None);

        std::fs::write(tmp.path().join(".matrix-history.json"), "{}").unwrap();
        std::fs::write(tmp.path().join(".matrix-history.yaml"), "").unwrap();
        assert_eq!(file_in(tmp.path()), Some(tmp.path().join(".matrix-history.yaml")));
    }

    #[test]
    fn test_explicit_path_wins() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.yaml");
        std::fs::write(&path, "{}\n").unwrap();
        assert_eq!(discover_config_file(Some(&path)), Some(path));
    }

    #[test]
    fn test_example_config_parses_back() {
        let example = generate_example_config();
        assert!(example.contains(CONFIG_ENV_VAR));
        let parsed: AppConfig = serde_yaml::from_str(&example).unwrap();
        assert_eq!(parsed, AppConfig::default());
    }
}
