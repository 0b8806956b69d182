use crate::host::atom::Atom;
use crate::runtime::interpreter::DEFAULT_CALL_DEPTH;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const CONFIG_FILE: &str = "pdscript.toml";

/// Port counts, lookup paths and creation arguments for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct HostConfig {
    pub inlets: usize,
    pub outlets: usize,
    /// Directory searched first when resolving script names.
    pub base_dir: PathBuf,
    pub search_paths: Vec<PathBuf>,
    /// Creation arguments appended after the script name.
    pub arguments: Vec<Atom>,
    pub call_depth: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            inlets: 1,
            outlets: 0,
            base_dir: PathBuf::from("."),
            search_paths: Vec::new(),
            arguments: Vec::new(),
            call_depth: DEFAULT_CALL_DEPTH,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{}: {error}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("{}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    node: Option<RawNode>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNode {
    inlets: Option<usize>,
    outlets: Option<usize>,
    search_paths: Option<Vec<String>>,
    arguments: Option<Vec<RawArgument>>,
    call_depth: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawArgument {
    Number(f64),
    Text(String),
}

impl HostConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        let root = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Self::from_toml(&text, &root).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parses a config file body. Relative search paths are taken from `root`.
    pub fn from_toml(text: &str, root: &Path) -> Result<Self, String> {
        let raw: RawConfig = toml::from_str(text).map_err(|err| err.to_string())?;
        let node = raw.node.unwrap_or_default();
        let defaults = Self::default();
        Ok(Self {
            inlets: node.inlets.unwrap_or(defaults.inlets).max(1),
            outlets: node.outlets.unwrap_or(defaults.outlets),
            base_dir: root.to_path_buf(),
            search_paths: node
                .search_paths
                .unwrap_or_default()
                .into_iter()
                .map(|entry| root.join(entry))
                .collect(),
            arguments: node
                .arguments
                .unwrap_or_default()
                .into_iter()
                .map(|arg| match arg {
                    RawArgument::Number(value) => Atom::Float(value),
                    RawArgument::Text(text) => Atom::Symbol(text),
                })
                .collect(),
            call_depth: node.call_depth.unwrap_or(defaults.call_depth),
        })
    }

    /// Config for a script file: the nearest `pdscript.toml` above it, or
    /// the defaults. The base directory is always the script's own.
    pub fn discover(script: &Path) -> Result<Self, ConfigError> {
        let base_dir = script
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        let mut config = match find_config(&base_dir) {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        config.base_dir = base_dir;
        Ok(config)
    }
}

pub fn find_config(start: &Path) -> Option<PathBuf> {
    let mut current = if start.is_dir() {
        start.to_path_buf()
    } else {
        start
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    };
    loop {
        let candidate = current.join(CONFIG_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        if !current.pop() {
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_node_table() {
        let config = HostConfig::from_toml(
            "[node]\ninlets = 3\noutlets = 2\nsearch_paths = [\"lib\"]\narguments = [\"gain\", 0.5]\ncall_depth = 64\n",
            Path::new("/patch"),
        )
        .expect("config");
        assert_eq!(config.inlets, 3);
        assert_eq!(config.outlets, 2);
        assert_eq!(config.search_paths, vec![PathBuf::from("/patch/lib")]);
        assert_eq!(config.arguments, vec![Atom::symbol("gain"), Atom::Float(0.5)]);
        assert_eq!(config.call_depth, 64);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = HostConfig::from_toml("", Path::new(".")).expect("config");
        assert_eq!(config.inlets, 1);
        assert_eq!(config.outlets, 0);
        assert_eq!(config.call_depth, DEFAULT_CALL_DEPTH);
    }

    #[test]
    fn zero_inlets_is_raised_to_one() {
        let config = HostConfig::from_toml("[node]\ninlets = 0\n", Path::new(".")).expect("config");
        assert_eq!(config.inlets, 1);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(HostConfig::from_toml("[node]\ninlet = 2\n", Path::new(".")).is_err());
    }

    #[test]
    fn discovers_config_in_parent_directory() {
        let dir = tempdir().expect("tempdir");
        let nested = dir.path().join("patch").join("scripts");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(dir.path().join(CONFIG_FILE), "[node]\noutlets = 2\n").expect("write");
        let script = nested.join("main.js");
        fs::write(&script, "post('x');").expect("write");

        let config = HostConfig::discover(&script).expect("config");
        assert_eq!(config.outlets, 2);
        assert_eq!(config.base_dir, nested);
        assert_eq!(find_config(&script), Some(dir.path().join(CONFIG_FILE)));
    }

    #[test]
    fn broken_config_reports_its_path() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[node\n").expect("write");
        let err = HostConfig::load(&path).expect_err("parse error");
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().starts_with(&path.display().to_string()));
    }
}
