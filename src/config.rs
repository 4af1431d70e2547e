//! Loading of iam-collect configuration files (JSONC) that point at the
//! snapshot storage.

use {
    crate::{
        store::{FileStore, LayeredStore, SnapshotStore},
        LensError,
    },
    serde::Deserialize,
    std::{fs, path::{Path, PathBuf}},
};

/// One parsed collect configuration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct CollectConfig {
    storage: StorageConfig,

    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
struct StorageConfig {
    #[serde(rename = "type")]
    kind: String,

    path: PathBuf,
}

impl CollectConfig {
    /// The snapshot root, resolved relative to the config file's directory.
    pub fn storage_root(&self) -> PathBuf {
        if self.storage.path.is_absolute() {
            self.storage.path.clone()
        } else {
            self.base_dir.join(&self.storage.path)
        }
    }
}

/// Parse the given config files. Line and block comments are stripped before
/// JSON parsing.
pub fn load_collect_configs(paths: &[PathBuf]) -> Result<Vec<CollectConfig>, LensError> {
    let mut configs = Vec::with_capacity(paths.len());
    for path in paths {
        configs.push(load_collect_config(path)?);
    }
    Ok(configs)
}

fn load_collect_config(path: &Path) -> Result<CollectConfig, LensError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| LensError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
    let stripped = strip_jsonc_comments(&raw);
    let mut config: CollectConfig = serde_json::from_str(&stripped)
        .map_err(|e| LensError::InvalidConfig(format!("{}: {}", path.display(), e)))?;

    if config.storage.kind != "file" {
        return Err(LensError::InvalidConfig(format!(
            "{}: unsupported storage type {:?}",
            path.display(),
            config.storage.kind
        )));
    }

    config.base_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    Ok(config)
}

/// Open the snapshot described by the configs: one file store per config,
/// layered in order.
pub fn open_store(configs: &[CollectConfig]) -> Result<Box<dyn SnapshotStore>, LensError> {
    if configs.is_empty() {
        return Err(LensError::InvalidConfig("no collect configurations given".to_string()));
    }

    let mut layers: Vec<Box<dyn SnapshotStore>> = Vec::with_capacity(configs.len());
    for config in configs {
        log::debug!("opening snapshot at {}", config.storage_root().display());
        layers.push(Box::new(FileStore::new(config.storage_root())));
    }
    Ok(Box::new(LayeredStore::new(layers)))
}

/// Remove `//` and `/* */` comments, leaving string literals intact.
fn strip_jsonc_comments(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' => match chars.peek() {
                Some('/') => {
                    for c in chars.by_ref() {
                        if c == '\n' {
                            out.push('\n');
                            break;
                        }
                    }
                }
                Some('*') => {
                    chars.next();
                    let mut last = '\0';
                    for c in chars.by_ref() {
                        if last == '*' && c == '/' {
                            break;
                        }
                        last = c;
                    }
                }
                _ => out.push(c),
            },
            _ => out.push(c),
        }
    }

    out
}
