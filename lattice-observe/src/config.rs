//! Engine configuration.
//!
//! Configuration is per thread, like the rest of the engine state. The
//! defaults match what the tracking algorithm was tuned for; a document
//! only needs to name the fields it overrides.
//!
//! ```rust
//! use lattice_observe::config::{configure, ReactiveConfig};
//!
//! let config = ReactiveConfig::from_json(r#"{ "max_marker_bits": 8 }"#).unwrap();
//! configure(config).unwrap();
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ObserveError, Result};
use crate::reactive::context;

/// Upper bound for nested effect runs that use bit markers.
///
/// The markers are `u32` masks and bit 0 is never used, so at most 30
/// nesting levels keep a dedicated bit with room to spare.
pub const MAX_MARKER_BITS: u32 = 30;

/// Tunables for the tracking engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReactiveConfig {
    /// Nesting depth up to which effect runs use the bitwise
    /// dependency diff. Deeper runs fall back to a full cleanup.
    /// Zero disables the bitwise path entirely.
    pub max_marker_bits: u32,

    /// Emit a warning when a write or delete hits a read-only wrapper.
    pub warn_on_readonly_mutation: bool,
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        Self {
            max_marker_bits: MAX_MARKER_BITS,
            warn_on_readonly_mutation: true,
        }
    }
}

impl ReactiveConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(document: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_marker_bits > MAX_MARKER_BITS {
            return Err(ObserveError::InvalidMaxMarkerBits {
                got: self.max_marker_bits,
                max: MAX_MARKER_BITS,
            });
        }
        Ok(())
    }
}

/// Validate `config` and install it for the current thread.
pub fn configure(config: ReactiveConfig) -> Result<()> {
    config.validate()?;
    tracing::debug!(?config, "installing reactive configuration");
    context::set_config(config);
    Ok(())
}

/// The configuration active on the current thread.
pub fn current_config() -> ReactiveConfig {
    context::config()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = ReactiveConfig::from_json("{}").unwrap();
        assert_eq!(config, ReactiveConfig::default());
    }

    #[test]
    fn partial_document_overrides_fields() {
        let document = r#"{"warn_on_readonly_mutation": false}"#;
        let config = ReactiveConfig::from_json(document).unwrap();
        assert!(!config.warn_on_readonly_mutation);
        assert_eq!(config.max_marker_bits, MAX_MARKER_BITS);
    }

    #[test]
    fn rejects_too_many_marker_bits() {
        let err = ReactiveConfig::from_json(r#"{"max_marker_bits": 31}"#).unwrap_err();
        assert!(matches!(err, ObserveError::InvalidMaxMarkerBits { got: 31, .. }));
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = ReactiveConfig::from_json(r#"{"max_depth": 3}"#).unwrap_err();
        assert!(matches!(err, ObserveError::Config(_)));
    }

    #[test]
    fn configure_installs_for_current_thread() {
        let config = ReactiveConfig {
            max_marker_bits: 4,
            ..ReactiveConfig::default()
        };
        configure(config.clone()).unwrap();
        assert_eq!(current_config(), config);
        configure(ReactiveConfig::default()).unwrap();
    }
}
