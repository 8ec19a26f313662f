//! Name to ruleset mapping used by the worker.
//!
//! The registry always holds the built-in `standard` ruleset. At startup it
//! can be extended from a directory of ruleset descriptors: one TOML file per
//! ruleset, named after the file stem, e.g. `~/.battlesnake/rulesets/fast.toml`:
//!
//! ```toml
//! [ruleset]
//! base = "standard"
//! max_health = 50
//! min_food = 3
//! ```
//!
//! A descriptor that cannot be read, parsed or validated is logged and
//! skipped. It never removes or replaces a built-in.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::game_state::DEFAULT_RULESET;
use super::{Ruleset, StandardRules, StandardRuleset};

const DESCRIPTOR_EXTENSION: &str = "toml";
const DEFAULT_RULESETS_DIR: &str = ".battlesnake/rulesets";

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unable to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not valid TOML", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{} has no [ruleset] table", path.display())]
    MissingRuleset { path: PathBuf },
    #[error("{} does not name a base ruleset", path.display())]
    MissingBase { path: PathBuf },
    #[error("{} extends unknown ruleset '{base}'", path.display())]
    UnknownBase { path: PathBuf, base: String },
    #[error("{} has invalid parameters: {reason}", path.display())]
    InvalidParameters { path: PathBuf, reason: String },
    #[error("ruleset name '{name}' is already taken")]
    NameTaken { name: String },
}

#[derive(Clone)]
pub struct RulesetRegistry {
    rulesets: HashMap<String, Arc<dyn Ruleset>>,
}

impl std::fmt::Debug for RulesetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RulesetRegistry")
            .field("rulesets", &self.names())
            .finish()
    }
}

impl Default for RulesetRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl RulesetRegistry {
    pub fn with_builtin() -> Self {
        let mut rulesets: HashMap<String, Arc<dyn Ruleset>> = HashMap::new();
        rulesets.insert(
            DEFAULT_RULESET.to_string(),
            Arc::new(StandardRuleset::default()),
        );
        Self { rulesets }
    }

    /// Built-ins plus whatever loads from `dir`
    pub fn load(dir: Option<&Path>) -> Self {
        let mut registry = Self::with_builtin();
        if let Some(dir) = dir {
            registry.discover(dir);
        }
        registry
    }

    /// `~/.battlesnake/rulesets`
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_RULESETS_DIR))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Ruleset>> {
        self.rulesets.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rulesets.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.rulesets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        ruleset: Arc<dyn Ruleset>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.rulesets.contains_key(&name) {
            return Err(RegistryError::NameTaken { name });
        }
        self.rulesets.insert(name, ruleset);
        Ok(())
    }

    /// Load every descriptor in `dir`. Failures are logged and returned, the
    /// registry keeps whatever loaded.
    pub fn discover(&mut self, dir: &Path) -> Vec<RegistryError> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(dir = %dir.display(), "No ruleset directory, using built-in rulesets");
                return Vec::new();
            }
            Err(e) => {
                tracing::error!(dir = %dir.display(), error = %e, "Unable to list ruleset directory");
                return vec![RegistryError::Io {
                    path: dir.to_path_buf(),
                    source: e,
                }];
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|ext| ext.to_str()) == Some(DESCRIPTOR_EXTENSION)
            })
            .collect();
        paths.sort();

        let mut failures = Vec::new();
        for path in paths {
            let loaded = load_descriptor(&path)
                .and_then(|(name, ruleset)| self.register(name.clone(), Arc::new(ruleset)).map(|_| name));

            match loaded {
                Ok(name) => {
                    tracing::info!(name = %name, path = %path.display(), "Loaded ruleset");
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Unable to load ruleset, skipping");
                    failures.push(e);
                }
            }
        }

        failures
    }
}

/// Parse one descriptor into its name and ruleset
pub fn load_descriptor(path: &Path) -> Result<(String, StandardRuleset), RegistryError> {
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| RegistryError::InvalidParameters {
            path: path.to_path_buf(),
            reason: "file name is not a usable ruleset name".to_string(),
        })?
        .to_string();

    let contents = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut document: toml::Table = contents.parse().map_err(|source| RegistryError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let Some(toml::Value::Table(mut section)) = document.remove("ruleset") else {
        return Err(RegistryError::MissingRuleset {
            path: path.to_path_buf(),
        });
    };

    let base = match section.remove("base") {
        Some(toml::Value::String(base)) => base,
        _ => {
            return Err(RegistryError::MissingBase {
                path: path.to_path_buf(),
            });
        }
    };

    if base != DEFAULT_RULESET {
        return Err(RegistryError::UnknownBase {
            path: path.to_path_buf(),
            base,
        });
    }

    let rules: StandardRules = toml::Value::Table(section).try_into().map_err(
        |e: toml::de::Error| RegistryError::InvalidParameters {
            path: path.to_path_buf(),
            reason: e.message().to_string(),
        },
    )?;

    rules
        .validate()
        .map_err(|e| RegistryError::InvalidParameters {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    Ok((name, StandardRuleset::new(rules)))
}
