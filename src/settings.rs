//! Code for loading program settings.
use crate::get_dotations_config_dir;
use crate::input::{input_err_msg, read_toml};
use crate::log::DEFAULT_LOG_LEVEL;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Default maximum number of nested formula evaluations
const DEFAULT_MAX_EVALUATION_DEPTH: usize = 256;

/// Default log level for program
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_max_evaluation_depth() -> usize {
    DEFAULT_MAX_EVALUATION_DEPTH
}

/// Get the path to where the settings file will be read from
pub fn get_settings_file_path() -> PathBuf {
    let mut path = get_dotations_config_dir();
    path.push(SETTINGS_FILE_NAME);

    path
}

/// Program settings from config file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// The default program log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// How deeply formulas may nest before evaluation is abandoned.
    ///
    /// Formulas referring to previous years recurse once per year, so this also bounds how far
    /// back a chain of yearly guarantees can go.
    #[serde(default = "default_max_evaluation_depth")]
    pub max_evaluation_depth: usize,
    /// Whether to record which values each formula requested
    #[serde(default)]
    pub trace_dependencies: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            max_evaluation_depth: DEFAULT_MAX_EVALUATION_DEPTH,
            trace_dependencies: false,
        }
    }
}

impl Settings {
    /// Read the contents of the settings file from the user's configuration directory.
    ///
    /// If the file is not present, default values for settings will be used
    ///
    /// # Returns
    ///
    /// The program settings as a `Settings` struct or an error if the file is invalid
    pub fn load() -> Result<Settings> {
        Self::load_from_path(&get_settings_file_path())
    }

    /// Read from the specified path, falling back to defaults if there is no file there
    pub fn load_from_path(file_path: &Path) -> Result<Settings> {
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        let settings: Settings = read_toml(file_path)?;
        settings
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.max_evaluation_depth > 0,
            "max_evaluation_depth cannot be zero"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_settings_load_from_path_no_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(SETTINGS_FILE_NAME); // NB: doesn't exist
        assert_eq!(
            Settings::load_from_path(&file_path).unwrap(),
            Settings::default()
        );
    }

    #[test]
    fn test_settings_load_from_path() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(SETTINGS_FILE_NAME);

        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "log_level = \"warn\"\ntrace_dependencies = true").unwrap();
        }

        assert_eq!(
            Settings::load_from_path(&file_path).unwrap(),
            Settings {
                log_level: "warn".to_string(),
                max_evaluation_depth: 256,
                trace_dependencies: true,
            }
        );
    }

    #[test]
    fn test_settings_load_from_path_invalid() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(SETTINGS_FILE_NAME);

        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "max_evaluation_depth = 0").unwrap();
        }

        assert_error!(
            Settings::load_from_path(&file_path),
            format!("Error reading {}", file_path.display())
        );
    }

    #[test]
    fn test_settings_file_path() {
        assert!(get_settings_file_path().ends_with("dotations/settings.toml"));
    }
}
