//! Configuration: speed profile, contractor tuning and server settings
//!
//! All three can live in one TOML file:
//! ```toml
//! [profile]
//! traffic_signal_penalty = 2      # seconds
//! u_turn_penalty = 20             # seconds
//!
//! [profile.turn_function]
//! kind = "sigmoid"
//! max_penalty = 7.5               # seconds
//!
//! [contractor]
//! witness_hop_limit = 5
//!
//! [server]
//! port = 5000
//! ```

use kestrel_common::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ebg::{SigmoidTurnFunction, TurnFunction};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KestrelConfig {
    pub profile: ProfileConfig,
    pub contractor: ContractorConfig,
    pub server: ServerConfig,
}

impl KestrelConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.contractor.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&text)
    }
}

/// Profile values as written by the user (penalties in seconds)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileConfig {
    pub traffic_signal_penalty: f64,
    pub u_turn_penalty: f64,
    pub compress_geometry: bool,
    pub small_component_size: usize,
    pub turn_function: Option<TurnFunctionConfig>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            traffic_signal_penalty: 2.0,
            u_turn_penalty: 20.0,
            compress_geometry: true,
            small_component_size: 1000,
            turn_function: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnFunctionConfig {
    Sigmoid {
        /// Seconds
        max_penalty: f64,
        #[serde(default = "default_turn_bias")]
        turn_bias: f64,
        #[serde(default)]
        left_side_driving: bool,
    },
}

fn default_turn_bias() -> f64 {
    1.075
}

/// Profile as consumed by graph construction (penalties in deciseconds)
#[derive(Clone)]
pub struct SpeedProfile {
    pub traffic_signal_penalty: i32,
    pub u_turn_penalty: i32,
    pub compress_geometry: bool,
    pub small_component_size: usize,
    pub turn_function: Option<Arc<dyn TurnFunction>>,
}

impl fmt::Debug for SpeedProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeedProfile")
            .field("traffic_signal_penalty", &self.traffic_signal_penalty)
            .field("u_turn_penalty", &self.u_turn_penalty)
            .field("compress_geometry", &self.compress_geometry)
            .field("small_component_size", &self.small_component_size)
            .field("has_turn_function", &self.turn_function.is_some())
            .finish()
    }
}

impl Default for SpeedProfile {
    fn default() -> Self {
        // defaults are finite and non-negative
        Self::from_config(&ProfileConfig::default()).unwrap_or(Self {
            traffic_signal_penalty: 0,
            u_turn_penalty: 0,
            compress_geometry: true,
            small_component_size: 0,
            turn_function: None,
        })
    }
}

fn seconds_to_deciseconds(name: &str, seconds: f64) -> Result<i32> {
    if !seconds.is_finite() || seconds < 0.0 || seconds > 86_400.0 {
        return Err(Error::Config(format!("{name} must be within 0..=86400 seconds, got {seconds}")));
    }
    Ok((seconds * 10.0).round() as i32)
}

impl SpeedProfile {
    pub fn from_config(config: &ProfileConfig) -> Result<Self> {
        let turn_function: Option<Arc<dyn TurnFunction>> = match &config.turn_function {
            None => None,
            Some(TurnFunctionConfig::Sigmoid {
                max_penalty,
                turn_bias,
                left_side_driving,
            }) => {
                if *turn_bias <= 0.0 || !turn_bias.is_finite() {
                    return Err(Error::Config(format!("turn_bias must be positive, got {turn_bias}")));
                }
                Some(Arc::new(SigmoidTurnFunction {
                    max_penalty: seconds_to_deciseconds("max_penalty", *max_penalty)? as f64,
                    turn_bias: *turn_bias,
                    left_side_driving: *left_side_driving,
                }))
            }
        };
        Ok(Self {
            traffic_signal_penalty: seconds_to_deciseconds(
                "traffic_signal_penalty",
                config.traffic_signal_penalty,
            )?,
            u_turn_penalty: seconds_to_deciseconds("u_turn_penalty", config.u_turn_penalty)?,
            compress_geometry: config.compress_geometry,
            small_component_size: config.small_component_size,
            turn_function,
        })
    }

    /// Profile without any turn cost, used by tests that reason about raw weights
    pub fn without_penalties() -> Self {
        Self {
            traffic_signal_penalty: 0,
            u_turn_penalty: 0,
            compress_geometry: false,
            small_component_size: 0,
            turn_function: None,
        }
    }
}

/// Contraction hierarchy tuning
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContractorConfig {
    /// Disable to insert every candidate shortcut (reference mode for tests)
    pub witness_search: bool,
    pub witness_hop_limit: u32,
    pub witness_settle_limit: usize,
    pub edge_quotient_factor: f64,
    pub original_quotient_factor: f64,
    pub depth_factor: f64,
    pub contracted_neighbours_factor: f64,
    /// 0 = rayon's default pool
    pub threads: usize,
}

impl Default for ContractorConfig {
    fn default() -> Self {
        Self {
            witness_search: true,
            witness_hop_limit: 5,
            witness_settle_limit: 1000,
            edge_quotient_factor: 2.0,
            original_quotient_factor: 1.0,
            depth_factor: 1.0,
            contracted_neighbours_factor: 0.0,
            threads: 0,
        }
    }
}

impl ContractorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.witness_hop_limit == 0 {
            return Err(Error::Config("witness_hop_limit must be at least 1".into()));
        }
        if self.witness_settle_limit == 0 {
            return Err(Error::Config("witness_settle_limit must be at least 1".into()));
        }
        let factors = [
            self.edge_quotient_factor,
            self.original_quotient_factor,
            self.depth_factor,
            self.contracted_neighbours_factor,
        ];
        if factors.iter().any(|f| !f.is_finite() || *f < 0.0) {
            return Err(Error::Config("priority factors must be finite and non-negative".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Upper bound for spatial lookups of one request
    pub query_timeout_ms: u64,
    /// File holding the dataset version counter; reload is checked per request
    pub version_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5000,
            query_timeout_ms: 2000,
            version_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parses() {
        let config = KestrelConfig::from_toml(
            r#"
            [profile]
            traffic_signal_penalty = 2
            u_turn_penalty = 20.5
            compress_geometry = false

            [profile.turn_function]
            kind = "sigmoid"
            max_penalty = 7.5

            [contractor]
            witness_hop_limit = 3
            witness_settle_limit = 250

            [server]
            port = 8080
            "#,
        )
        .unwrap();

        let profile = SpeedProfile::from_config(&config.profile).unwrap();
        assert_eq!(profile.traffic_signal_penalty, 20);
        assert_eq!(profile.u_turn_penalty, 205);
        assert!(!profile.compress_geometry);
        let f = profile.turn_function.expect("turn function configured");
        assert!(f.penalty(-90.0) > f.penalty(90.0));

        assert_eq!(config.contractor.witness_hop_limit, 3);
        assert_eq!(config.contractor.witness_settle_limit, 250);
        assert!(config.contractor.witness_search);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "0.0.0.0");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = KestrelConfig::from_toml("").unwrap();
        assert_eq!(config.contractor, ContractorConfig::default());
        assert_eq!(config.profile, ProfileConfig::default());
        let profile = SpeedProfile::default();
        assert_eq!(profile.u_turn_penalty, 200);
        assert!(profile.turn_function.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(KestrelConfig::from_toml("[contractor]\nwitness_hop_limit = 0").is_err());
        assert!(KestrelConfig::from_toml("[contractor]\nunknown = 1").is_err());

        let profile = ProfileConfig {
            u_turn_penalty: -1.0,
            ..ProfileConfig::default()
        };
        assert!(matches!(SpeedProfile::from_config(&profile), Err(Error::Config(_))));
    }
}
