#![deny(missing_docs)]

//! # Settings
//!
//! Global flags, engine configuration loading and log setup.
//! Precedence: command line flag, then environment (a `.env` file included),
//! then the configuration file, then defaults.

use crate::error::{CliError, CliResult};
use apiprobe_core::EngineConfig;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Flags shared by every command.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Engine configuration file (YAML or JSON).
    #[clap(long, global = true, env = "APIPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Seed of the random value generator.
    #[clap(long, global = true, env = "APIPROBE_SEED")]
    pub seed: Option<u64>,
}

impl GlobalArgs {
    /// Loads the configuration file (if any) and applies flag overrides.
    pub fn engine_config(&self) -> CliResult<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                if !path.exists() {
                    return Err(CliError::Argument(format!(
                        "configuration file not found: {:?}",
                        path
                    )));
                }
                EngineConfig::load(path)?
            }
            None => EngineConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        Ok(config)
    }
}

/// Installs the log subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
    if installed.is_err() {
        tracing::debug!("log subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_seed_flag_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        fs::write(&path, "seed: 3\nexploration_max_iterations: 12\n").unwrap();

        let args = GlobalArgs {
            config: Some(path.clone()),
            seed: None,
        };
        let config = args.engine_config().unwrap();
        assert_eq!(config.seed, 3);
        assert_eq!(config.exploration_max_iterations, 12);

        let args = GlobalArgs {
            config: Some(path),
            seed: Some(99),
        };
        assert_eq!(args.engine_config().unwrap().seed, 99);
    }

    #[test]
    fn test_missing_config_file() {
        let args = GlobalArgs {
            config: Some(PathBuf::from("/definitely/not/here.yaml")),
            seed: None,
        };
        assert!(matches!(args.engine_config(), Err(CliError::Argument(_))));
    }

    #[test]
    fn test_defaults_without_file() {
        let config = GlobalArgs::default().engine_config().unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
