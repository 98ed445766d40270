//! # flop-trade
//!
//! Capacity-constrained equilibrium and bilateral sourcing engine for
//! cross-border trade in computing capacity.
//!
//! Training compute is a globally traded good: its price clears a merit
//! order of national suppliers against the export demand of every country
//! whose domestic cost exceeds the world price by more than a sovereignty
//! premium. Inference compute is latency-sensitive: every demand center
//! buys from whichever source minimizes cost inflated by round-trip delay.
//!
//! ## Architecture
//!
//! - **core** — Country identifiers, the cost table, the latency table, scenario parameters
//! - **market** — Supply stack, export demand, equilibrium solver, allocation and shadow values
//! - **sourcing** — All-pairs bilateral sourcing, regime classification, revenue attribution
//! - **analysis** — Concentration and rank metrics, welfare cost of sovereignty, sensitivity sweeps
//! - **simulation** — Random market generation

pub mod analysis;
pub mod core;
pub mod market;
pub mod simulation;
pub mod sourcing;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::analysis::sensitivity::{run_sweep, standard_scenarios, Scenario, SweepReport};
    pub use crate::analysis::welfare::{Counterfactual, WelfareReport};
    pub use crate::core::cost_table::{CostAdjustment, CostTable, InputError};
    pub use crate::core::country::{CountryCost, CountryId};
    pub use crate::core::latency::{LatencyRecord, LatencyTable};
    pub use crate::core::market_input::MarketInput;
    pub use crate::core::params::ScenarioParams;
    pub use crate::market::equilibrium::{solve_equilibrium, ClearingStatus, EquilibriumResult};
    pub use crate::sourcing::bilateral::{source_all, SourcingRecord, SourcingReport};
    pub use crate::sourcing::regime::{Regime, RegimeSummary};
    pub use crate::sourcing::revenue::RevenueShares;
}
