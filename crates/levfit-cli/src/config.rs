//! CLI configuration via environment variables
//!
//! Levfit uses environment variables for optional configuration.
//! This keeps the CLI simple while allowing customization.

use std::env;

/// CLI configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Default to JSON report output (LEVFIT_JSON=1)
    pub default_json: bool,
    /// Disable colored output (LEVFIT_NO_COLOR=1 or NO_COLOR=1)
    pub no_color: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            default_json: env::var("LEVFIT_JSON")
                .map(|v| v == "1" || v.to_lowercase() == "true")
                .unwrap_or(false),
            no_color: env::var("LEVFIT_NO_COLOR").is_ok() || env::var("NO_COLOR").is_ok(),
        }
    }

    /// Apply the color preference to the global colored state.
    pub fn apply(&self) {
        if self.no_color {
            colored::control::set_override(false);
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_defaults() {
        env::remove_var("LEVFIT_JSON");
        env::remove_var("LEVFIT_NO_COLOR");
        env::remove_var("NO_COLOR");

        let config = Config::from_env();
        assert!(!config.default_json);
        assert!(!config.no_color);
    }

    #[test]
    #[serial]
    fn test_config_json_flag() {
        env::set_var("LEVFIT_JSON", "1");
        let config = Config::from_env();
        assert!(config.default_json);
        env::remove_var("LEVFIT_JSON");
    }
}
