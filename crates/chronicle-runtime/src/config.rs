//! Runtime configuration.

use chronicle_core::error::ChronicleError;

/// Environment variable controlling [`ChronicleConfig::autosave`].
pub const AUTOSAVE_VAR: &str = "CHRONICLE_AUTOSAVE";

/// Settings for a [`Chronicle`](crate::Chronicle) context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChronicleConfig {
    /// Execute a scope's queued saves when its work succeeds.
    pub autosave: bool,
}

impl Default for ChronicleConfig {
    fn default() -> Self {
        Self { autosave: true }
    }
}

impl ChronicleConfig {
    /// Reads configuration from the process environment. Unset variables
    /// keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ChronicleError::Config` for an unparseable value.
    pub fn from_env() -> Result<Self, ChronicleError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// Returns `ChronicleError::Config` for an unparseable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ChronicleError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(AUTOSAVE_VAR) {
            config.autosave = parse_bool(AUTOSAVE_VAR, &raw)?;
        }
        Ok(config)
    }
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ChronicleError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(ChronicleError::Config(format!(
            "{var} must be true, false, 1 or 0, got {other:?}"
        ))),
    }
}
