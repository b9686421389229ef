use crate::runtime::{
    combinators::CombinatorBase,
    data_structures::memory_image::Mode,
    error::{self, ErrorKind, machine_error},
    session::ReportStyle,
};
use serde::Deserialize;
use std::{fs, path::Path};

/// Machine configuration.  Every field has a default, so a configuration file only needs the
/// settings it changes.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Combinator firings and threaded body cells allowed per input unit.
    pub fuel: u64,

    pub memory_cells: usize,
    pub data_capacity: usize,
    pub return_capacity: usize,
    pub continuation_capacity: usize,

    /// The combinators loaded into the core dictionary.
    pub base: CombinatorBase,

    /// How input units are read when the session starts.
    pub mode: Mode,

    /// What the session prints after a successful unit.
    pub report: ReportStyle,

    /// Allow user definitions to shadow core words.
    pub permit_shadowing: bool,

    /// Include the location and call stack when reporting errors.
    pub verbose_errors: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            fuel: 100_000,
            memory_cells: 4096,
            data_capacity: 1024,
            return_capacity: 256,
            continuation_capacity: 1024,
            base: CombinatorBase::default(),
            mode: Mode::default(),
            report: ReportStyle::default(),
            permit_shadowing: false,
            verbose_errors: false,
        }
    }
}

impl Config {
    /// Read a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> error::Result<Config> {
        match toml::from_str(text) {
            Ok(config) => Ok(config),
            Err(error) => machine_error(ErrorKind::Io(format!("Invalid configuration: {}", error))),
        }
    }

    /// Read a configuration file.
    pub fn load(path: &Path) -> error::Result<Config> {
        let text = fs::read_to_string(path)?;
        Config::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = Config::from_toml_str("fuel = 12\nbase = \"ski\"\nreport = \"quiet\"\n").unwrap();

        assert_eq!(config.fuel, 12);
        assert_eq!(config.base, CombinatorBase::Ski);
        assert_eq!(config.report, ReportStyle::Quiet);
        assert_eq!(config.memory_cells, Config::default().memory_cells);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(Config::from_toml_str("fuell = 1\n").is_err());
    }
}
