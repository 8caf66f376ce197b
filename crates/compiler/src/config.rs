//! Layered configuration: CLI flags override an optional `senie.toml`,
//! which overrides hardcoded defaults. Absence of the file is not an
//! error — most runs use only defaults and `--seed`.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_POPULATION: usize = 20;
pub const DEFAULT_MUTATION_RATE: f32 = 0.1;
pub const DEFAULT_SEED: u64 = 0;
pub const DEFAULT_CANVAS_WIDTH: i32 = 1000;
pub const DEFAULT_CANVAS_HEIGHT: i32 = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path} as TOML: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Deserialized straight from `senie.toml`; every field is optional so a
/// partial file only overrides what it mentions.
#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
    population: Option<usize>,
    mutation_rate: Option<f32>,
    seed: Option<u64>,
    canvas_width: Option<i32>,
    canvas_height: Option<i32>,
}

/// The fully-resolved configuration a run actually uses.
#[derive(Debug, Clone, PartialEq)]
pub struct SenieConfig {
    pub population: usize,
    pub mutation_rate: f32,
    pub seed: u64,
    pub canvas_width: i32,
    pub canvas_height: i32,
}

impl Default for SenieConfig {
    fn default() -> Self {
        SenieConfig {
            population: DEFAULT_POPULATION,
            mutation_rate: DEFAULT_MUTATION_RATE,
            seed: DEFAULT_SEED,
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
        }
    }
}

impl SenieConfig {
    /// Loads `senie.toml` from `path` if it exists, layering it over
    /// defaults; `cli_seed` (from `-s`) takes precedence over both.
    pub fn load(path: &Path, cli_seed: Option<u64>) -> Result<Self, ConfigError> {
        let mut config = SenieConfig::default();
        if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            let file: FileConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
            config.apply(file);
            debug!(path = %path.display(), "loaded senie.toml");
        } else {
            warn!(path = %path.display(), "no senie.toml found, using defaults");
        }
        if let Some(seed) = cli_seed {
            config.seed = seed;
        }
        Ok(config)
    }

    fn apply(&mut self, file: FileConfig) {
        if let Some(v) = file.population {
            self.population = v;
        }
        if let Some(v) = file.mutation_rate {
            self.mutation_rate = v;
        }
        if let Some(v) = file.seed {
            self.seed = v;
        }
        if let Some(v) = file.canvas_width {
            self.canvas_width = v;
        }
        if let Some(v) = file.canvas_height {
            self.canvas_height = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = SenieConfig::load(Path::new("/does/not/exist/senie.toml"), None).unwrap();
        assert_eq!(config, SenieConfig::default());
    }

    #[test]
    fn file_values_override_defaults_and_cli_seed_wins() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "population = 50\nmutation_rate = 0.25\nseed = 7\n").unwrap();
        let config = SenieConfig::load(file.path(), Some(99)).unwrap();
        assert_eq!(config.population, 50);
        assert_eq!(config.mutation_rate, 0.25);
        assert_eq!(config.seed, 99);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "population = [this is not valid").unwrap();
        assert!(matches!(
            SenieConfig::load(file.path(), None),
            Err(ConfigError::Parse { .. })
        ));
    }
}
