//! Engine configuration from `IVS_*` environment variables.

use crate::adapters::tfhe::{DEFAULT_PRECISION_BITS, PRECISION_BITS_RANGE};
use crate::domain::EdgeActivation;
use crate::IvsError;

pub const DEFAULT_PERSONS: usize = 50;
pub const DEFAULT_INFECTIONS: usize = 5;
pub const DEFAULT_MAX_DISTANCE: usize = 5;
pub const DEFAULT_CONTACT_THRESHOLD: f64 = 5.0;

/// How assessments are printed by the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Settings for one engine session.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Number of people (N)
    pub persons: usize,

    /// Number of tracked infections (K)
    pub infections: usize,

    /// Breadth-first depth bound
    pub max_distance: usize,

    pub edge_activation: EdgeActivation,

    /// Fixed-point precision of the TFHE codec
    pub precision_bits: u32,

    /// Seed for reproducible runs; entropy-seeded when absent
    pub seed: Option<u64>,

    /// Print the network inspection dump at startup
    pub show_network: bool,

    pub output: OutputFormat,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            persons: DEFAULT_PERSONS,
            infections: DEFAULT_INFECTIONS,
            max_distance: DEFAULT_MAX_DISTANCE,
            edge_activation: EdgeActivation::IntegerOnly,
            precision_bits: DEFAULT_PRECISION_BITS,
            seed: None,
            show_network: true,
            output: OutputFormat::Text,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}

impl EngineConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    /// Returns `IvsError::Config` for unparsable or out-of-range values.
    pub fn from_env() -> Result<Self, IvsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns `IvsError::Config` for unparsable or out-of-range values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IvsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            name: &str,
        ) -> Result<Option<T>, IvsError> {
            match lookup(name) {
                None => Ok(None),
                Some(raw) => raw
                    .trim()
                    .parse::<T>()
                    .map(Some)
                    .map_err(|_| IvsError::Config(format!("{name}={raw:?} is not valid"))),
            }
        }

        let mut config = Self::default();

        if let Some(v) = parsed(&lookup, "IVS_PERSONS")? {
            config.persons = v;
        }
        if let Some(v) = parsed(&lookup, "IVS_INFECTIONS")? {
            config.infections = v;
        }
        if let Some(v) = parsed(&lookup, "IVS_MAX_DISTANCE")? {
            config.max_distance = v;
        }
        if let Some(v) = parsed(&lookup, "IVS_PRECISION_BITS")? {
            config.precision_bits = v;
        }
        config.seed = parsed(&lookup, "IVS_SEED")?;

        let threshold: f64 =
            parsed(&lookup, "IVS_CONTACT_THRESHOLD")?.unwrap_or(DEFAULT_CONTACT_THRESHOLD);
        config.edge_activation = match lookup("IVS_EDGE_ACTIVATION").as_deref().map(str::trim) {
            None | Some("integer") => EdgeActivation::IntegerOnly,
            Some("threshold") => EdgeActivation::Threshold(threshold),
            Some(other) => {
                return Err(IvsError::Config(format!(
                    "IVS_EDGE_ACTIVATION={other:?} must be \"integer\" or \"threshold\""
                )))
            }
        };

        if let Some(raw) = lookup("IVS_SHOW_NETWORK") {
            config.show_network = parse_bool(&raw).ok_or_else(|| {
                IvsError::Config(format!("IVS_SHOW_NETWORK={raw:?} is not a boolean"))
            })?;
        }

        config.output = match lookup("IVS_OUTPUT").as_deref().map(str::trim) {
            None | Some("text") => OutputFormat::Text,
            Some("json") => OutputFormat::Json,
            Some(other) => {
                return Err(IvsError::Config(format!(
                    "IVS_OUTPUT={other:?} must be \"text\" or \"json\""
                )))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Check invariants the engine relies on.
    ///
    /// # Errors
    /// Returns `IvsError::Config` describing the first violation.
    pub fn validate(&self) -> Result<(), IvsError> {
        if self.persons == 0 {
            return Err(IvsError::Config("person count must be at least 1".into()));
        }
        if self.infections == 0 {
            return Err(IvsError::Config("infection count must be at least 1".into()));
        }
        if !PRECISION_BITS_RANGE.contains(&self.precision_bits) {
            return Err(IvsError::Config(format!(
                "precision bits {} outside {PRECISION_BITS_RANGE:?}",
                self.precision_bits
            )));
        }
        if let EdgeActivation::Threshold(t) = self.edge_activation {
            if !t.is_finite() || t < 0.0 {
                return Err(IvsError::Config(format!(
                    "contact threshold {t} must be finite and non-negative"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[])).expect("defaults are valid");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.persons, 50);
        assert_eq!(config.infections, 5);
        assert_eq!(config.edge_activation, EdgeActivation::IntegerOnly);
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("IVS_PERSONS", "3"),
            ("IVS_INFECTIONS", "1"),
            ("IVS_EDGE_ACTIVATION", "threshold"),
            ("IVS_CONTACT_THRESHOLD", "7.5"),
            ("IVS_SEED", "42"),
            ("IVS_SHOW_NETWORK", "no"),
            ("IVS_OUTPUT", "json"),
        ]))
        .expect("valid overrides");

        assert_eq!(config.persons, 3);
        assert_eq!(config.infections, 1);
        assert_eq!(config.edge_activation, EdgeActivation::Threshold(7.5));
        assert_eq!(config.seed, Some(42));
        assert!(!config.show_network);
        assert_eq!(config.output, OutputFormat::Json);
    }

    #[test]
    fn test_invalid_values() {
        for vars in [
            vec![("IVS_PERSONS", "0")],
            vec![("IVS_PERSONS", "many")],
            vec![("IVS_INFECTIONS", "0")],
            vec![("IVS_EDGE_ACTIVATION", "always")],
            vec![("IVS_EDGE_ACTIVATION", "threshold"), ("IVS_CONTACT_THRESHOLD", "-1")],
            vec![("IVS_PRECISION_BITS", "32")],
            vec![("IVS_SHOW_NETWORK", "maybe")],
        ] {
            assert!(
                matches!(EngineConfig::from_lookup(lookup(&vars)), Err(IvsError::Config(_))),
                "{vars:?} should be rejected"
            );
        }
    }
}
