//! Configuration file data structures

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = ".supersize.toml";

/// Binary used when no apkanalyzer path is configured
pub const DEFAULT_APKANALYZER: &str = "apkanalyzer";

/// supersize configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Path to apkanalyzer (defaults to `apkanalyzer` on PATH)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apkanalyzer: Option<String>,

    /// JAVA_HOME passed to apkanalyzer
    #[serde(rename = "java-home", skip_serializing_if = "Option::is_none")]
    pub java_home: Option<PathBuf>,

    /// Analysis thresholds
    #[serde(default)]
    pub knobs: Knobs,

    /// Report settings
    #[serde(default)]
    pub report: ReportSettings,
}

impl ConfigFile {
    /// apkanalyzer binary to run
    pub fn apkanalyzer_binary(&self) -> &str {
        self.apkanalyzer.as_deref().unwrap_or(DEFAULT_APKANALYZER)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        self.knobs.validate()?;
        self.report.validate()
    }
}

/// Analysis thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Knobs {
    /// How many unresolved object paths get a warning
    #[serde(rename = "max-unmatched-paths-to-log", default = "default_max_unmatched")]
    pub max_unmatched_paths_to_log: usize,

    /// Padding in `.text` above which a warning is logged
    #[serde(rename = "text-padding-warning", default = "default_text_padding")]
    pub text_padding_warning: i64,

    /// Padding in data sections above which a warning is logged
    #[serde(rename = "data-padding-warning", default = "default_data_padding")]
    pub data_padding_warning: i64,
}

fn default_max_unmatched() -> usize {
    crate::ninja::DEFAULT_MAX_UNMATCHED_TO_LOG
}

fn default_text_padding() -> i64 {
    64
}

fn default_data_padding() -> i64 {
    256
}

impl Default for Knobs {
    fn default() -> Self {
        Self {
            max_unmatched_paths_to_log: default_max_unmatched(),
            text_padding_warning: default_text_padding(),
            data_padding_warning: default_data_padding(),
        }
    }
}

impl Knobs {
    /// Padding thresholds must be positive
    pub fn validate(&self) -> Result<()> {
        if self.text_padding_warning <= 0 {
            anyhow::bail!(
                "text-padding-warning must be positive (got {})",
                self.text_padding_warning
            );
        }
        if self.data_padding_warning <= 0 {
            anyhow::bail!(
                "data-padding-warning must be positive (got {})",
                self.data_padding_warning
            );
        }
        Ok(())
    }
}

/// Report settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSettings {
    /// Symbols listed in the top-N tables
    #[serde(rename = "top-n", default = "default_top_n")]
    pub top_n: usize,
}

fn default_top_n() -> usize {
    20
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
        }
    }
}

impl ReportSettings {
    /// `top-n` must be at least 1
    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            anyhow::bail!("report.top-n must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_default_uses_path_apkanalyzer() {
        let config = ConfigFile::default();
        assert_eq!(config.apkanalyzer_binary(), "apkanalyzer");
        assert_eq!(config.knobs.text_padding_warning, 64);
        assert_eq!(config.knobs.data_padding_warning, 256);
        assert_eq!(config.report.top_n, 20);
    }

    #[test]
    fn test_config_file_parses_kebab_case_keys() {
        let toml = r#"
apkanalyzer = "/sdk/cmdline-tools/latest/bin/apkanalyzer"
java-home = "/usr/lib/jvm/java-17"

[knobs]
max-unmatched-paths-to-log = 3
text-padding-warning = 128

[report]
top-n = 5
"#;
        let config: ConfigFile = toml_edit::de::from_str(toml).unwrap();
        assert_eq!(
            config.apkanalyzer_binary(),
            "/sdk/cmdline-tools/latest/bin/apkanalyzer"
        );
        assert_eq!(config.java_home, Some(PathBuf::from("/usr/lib/jvm/java-17")));
        assert_eq!(config.knobs.max_unmatched_paths_to_log, 3);
        assert_eq!(config.knobs.text_padding_warning, 128);
        assert_eq!(config.knobs.data_padding_warning, 256);
        assert_eq!(config.report.top_n, 5);
    }

    #[test]
    fn test_config_file_rejects_wrong_types() {
        let result: Result<ConfigFile, _> = toml_edit::de::from_str("[report]\ntop-n = \"many\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_with_zero_top_n_returns_error() {
        let mut config = ConfigFile::default();
        config.report.top_n = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_with_negative_padding_threshold_returns_error() {
        let mut config = ConfigFile::default();
        config.knobs.data_padding_warning = -1;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("data-padding-warning"));
    }

    #[test]
    fn test_serialize_omits_unset_paths() {
        let toml = toml_edit::ser::to_string_pretty(&ConfigFile::default()).unwrap();
        assert!(!toml.contains("apkanalyzer ="));
        assert!(toml.contains("[knobs]"));
        assert!(toml.contains("top-n = 20"));
    }
}
