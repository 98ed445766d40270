use crate::core::latency::LatencyError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from out-of-range scenario parameters.
#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("parameter `{name}` must be non-negative, got {value}")]
    Negative { name: &'static str, value: Decimal },
    #[error("parameter `{name}` must lie in {range}, got {value}")]
    OutOfRange {
        name: &'static str,
        range: &'static str,
        value: Decimal,
    },
    #[error("iteration cap must be at least 1")]
    ZeroIterations,
}

/// Errors from loading a scenario parameter or market file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] ParamsError),
    #[error(transparent)]
    Latency(#[from] LatencyError),
}

/// Scalar parameters of one scenario run.
///
/// The record is immutable once built and is passed by reference into
/// every engine call, so independent scenarios can be evaluated side by
/// side without observing each other. Perturbations are expressed by
/// building a new record (see [`ScenarioParams::with_sovereignty_premium`]).
///
/// Every field has a calibrated default, so a parameter file only needs
/// to name the values it overrides:
///
/// ```
/// use flop_trade::core::params::ScenarioParams;
/// use rust_decimal_macros::dec;
///
/// let params = ScenarioParams::from_toml_str(r#"sovereignty_premium = "0.20""#).unwrap();
/// assert_eq!(params.sovereignty_premium, dec!(0.20));
/// assert_eq!(params.max_iterations, 30);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioParams {
    /// Share of total compute demand that is the traded good (training), α.
    pub training_share: Decimal,
    /// Total global compute demand over the clearing horizon, Q_total.
    pub total_demand: Decimal,
    /// Sovereignty premium λ.
    pub sovereignty_premium: Decimal,
    /// Latency degradation rate τ, per millisecond.
    pub latency_penalty: Decimal,
    /// Absolute price tolerance for solver convergence.
    pub tolerance: Decimal,
    /// Iteration cap for the equilibrium solver.
    pub max_iterations: usize,
    /// Round-trip latency used for domestic delivery when the latency
    /// table has no self-pair.
    pub domestic_latency_ms: Decimal,
    /// Fraction of each supplier's capacity offered to the traded market.
    pub capacity_share: Decimal,
    /// Allowed deviation of the demand-weight sum from one.
    pub weight_tolerance: Decimal,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            training_share: dec!(0.50),
            total_demand: dec!(60_000_000_000),
            sovereignty_premium: dec!(0.10),
            latency_penalty: dec!(0.0008),
            tolerance: dec!(0.0001),
            max_iterations: 30,
            domestic_latency_ms: dec!(5),
            capacity_share: Decimal::ONE,
            weight_tolerance: dec!(0.000001),
        }
    }
}

impl ScenarioParams {
    /// Copy of these parameters with a different sovereignty premium.
    pub fn with_sovereignty_premium(&self, lambda: Decimal) -> Self {
        Self {
            sovereignty_premium: lambda,
            ..self.clone()
        }
    }

    /// Copy of these parameters with a different total demand.
    pub fn with_total_demand(&self, total_demand: Decimal) -> Self {
        Self {
            total_demand,
            ..self.clone()
        }
    }

    /// Copy of these parameters with a different iteration cap.
    pub fn with_max_iterations(&self, max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..self.clone()
        }
    }

    /// Quantity of the traded good demanded by a country with weight `omega`.
    pub fn traded_demand(&self, omega: Decimal) -> Decimal {
        self.training_share * omega * self.total_demand
    }

    /// Check every parameter against its admissible range.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.training_share < Decimal::ZERO || self.training_share > Decimal::ONE {
            return Err(ParamsError::OutOfRange {
                name: "training_share",
                range: "[0, 1]",
                value: self.training_share,
            });
        }
        let non_negative = [
            ("total_demand", self.total_demand),
            ("sovereignty_premium", self.sovereignty_premium),
            ("latency_penalty", self.latency_penalty),
            ("domestic_latency_ms", self.domestic_latency_ms),
            ("weight_tolerance", self.weight_tolerance),
        ];
        for (name, value) in non_negative {
            if value < Decimal::ZERO {
                return Err(ParamsError::Negative { name, value });
            }
        }
        if self.tolerance <= Decimal::ZERO {
            return Err(ParamsError::OutOfRange {
                name: "tolerance",
                range: "(0, inf)",
                value: self.tolerance,
            });
        }
        if self.capacity_share <= Decimal::ZERO || self.capacity_share > Decimal::ONE {
            return Err(ParamsError::OutOfRange {
                name: "capacity_share",
                range: "(0, 1]",
                value: self.capacity_share,
            });
        }
        if self.max_iterations == 0 {
            return Err(ParamsError::ZeroIterations);
        }
        Ok(())
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let params: Self = toml::from_str(s)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let params: Self = serde_json::from_str(s)?;
        params.validate()?;
        Ok(params)
    }

    /// Load parameters from a `.json` or `.toml` file (by extension; TOML
    /// is assumed for anything other than `.json`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }
}
