use crate::core::cost_table::CostTable;
use crate::core::country::CountryCost;
use crate::core::latency::{LatencyError, LatencyRecord, LatencyTable};
use crate::core::params::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// On-disk market description: the country-cost table plus raw latency
/// measurements.
///
/// ```json
/// {
///   "countries": [
///     { "id": "ISL", "name": "Iceland", "unit_cost": "1.10",
///       "capacity": "100", "demand_weight": "0.4" }
///   ],
///   "latencies": [
///     { "source": "ISL", "destination": "GBR", "latency_ms": "28" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketInput {
    pub countries: Vec<CountryCost>,
    #[serde(default)]
    pub latencies: Vec<LatencyRecord>,
}

impl MarketInput {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn cost_table(&self) -> CostTable {
        self.countries.iter().cloned().collect()
    }

    /// Symmetrized table of the measured latencies.
    pub fn latency_table(&self) -> Result<LatencyTable, LatencyError> {
        LatencyTable::from_records(&self.latencies)
    }
}
