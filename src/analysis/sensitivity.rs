use crate::analysis::metrics::{spearman_rho, top_n};
use crate::core::cost_table::{CostAdjustment, CostTable, InputError};
use crate::core::country::CountryId;
use crate::core::latency::LatencyTable;
use crate::core::params::ScenarioParams;
use crate::market::equilibrium::{solve_equilibrium, ClearingStatus};
use crate::sourcing::bilateral::source_all;
use crate::sourcing::revenue::RevenueShares;
use chrono::{DateTime, Utc};
use log::{info, warn};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Number of cheapest countries compared against the baseline.
pub const TOP_N: usize = 5;

/// One perturbation of the baseline market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub label: String,
    /// Applied in order to a copy of the base cost table.
    pub adjustments: Vec<CostAdjustment>,
    /// Replaces the base parameters when set.
    pub params: Option<ScenarioParams>,
}

impl Scenario {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            adjustments: Vec::new(),
            params: None,
        }
    }

    pub fn with_adjustment(mut self, adjustment: CostAdjustment) -> Self {
        self.adjustments.push(adjustment);
        self
    }

    pub fn with_params(mut self, params: ScenarioParams) -> Self {
        self.params = Some(params);
        self
    }
}

/// The standard sensitivity set: baseline, costs shifted by ±0.01, costs
/// scaled by ±10%, and a doubled sovereignty premium.
pub fn standard_scenarios(base: &ScenarioParams) -> Vec<Scenario> {
    vec![
        Scenario::new("Baseline"),
        Scenario::new("Costs +0.01").with_adjustment(CostAdjustment::Shift(dec!(0.01))),
        Scenario::new("Costs -0.01").with_adjustment(CostAdjustment::Shift(dec!(-0.01))),
        Scenario::new("Costs +10%").with_adjustment(CostAdjustment::Scale(dec!(1.10))),
        Scenario::new("Costs -10%").with_adjustment(CostAdjustment::Scale(dec!(0.90))),
        Scenario::new("Sovereignty premium doubled")
            .with_params(base.with_sovereignty_premium(base.sovereignty_premium * dec!(2))),
    ]
}

/// Results of one successful scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub label: String,
    pub price: Decimal,
    pub status: ClearingStatus,
    pub exporter_count: usize,
    /// Export HHI of the cleared training market.
    pub concentration: Decimal,
    /// HHI of inference supply shares.
    pub inference_concentration: Decimal,
    /// Demand centers whose cheapest inference source is foreign.
    pub inference_importers: usize,
    /// Spearman correlation of unit costs against the baseline.
    pub rank_correlation: Option<f64>,
    pub top: Vec<CountryId>,
    pub top_unchanged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScenarioOutcome {
    Completed(ScenarioSummary),
    Failed { label: String, error: String },
}

impl ScenarioOutcome {
    pub fn label(&self) -> &str {
        match self {
            ScenarioOutcome::Completed(s) => &s.label,
            ScenarioOutcome::Failed { label, .. } => label,
        }
    }
}

/// Outcome of a batch of scenarios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<ScenarioOutcome>,
}

impl SweepReport {
    pub fn completed(&self) -> impl Iterator<Item = &ScenarioSummary> {
        self.outcomes.iter().filter_map(|o| match o {
            ScenarioOutcome::Completed(s) => Some(s),
            ScenarioOutcome::Failed { .. } => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|o| match o {
            ScenarioOutcome::Failed { label, error } => Some((label.as_str(), error.as_str())),
            ScenarioOutcome::Completed(_) => None,
        })
    }

    pub fn outcome(&self, label: &str) -> Option<&ScenarioOutcome> {
        self.outcomes.iter().find(|o| o.label() == label)
    }
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Sensitivity Sweep {} ===", self.run_id)?;
        writeln!(f, "Started: {}", self.started_at.to_rfc3339())?;
        for outcome in &self.outcomes {
            match outcome {
                ScenarioOutcome::Completed(s) => {
                    let rho = s
                        .rank_correlation
                        .map(|r| format!("{:.4}", r))
                        .unwrap_or_else(|| "-".to_string());
                    writeln!(
                        f,
                        "  [{}] p={:.4} ({}) exporters={} HHI={:.4} inference importers={} rho={} top{}={}",
                        s.label,
                        s.price,
                        s.status,
                        s.exporter_count,
                        s.concentration,
                        s.inference_importers,
                        rho,
                        TOP_N,
                        if s.top_unchanged { "same" } else { "CHANGED" }
                    )?;
                }
                ScenarioOutcome::Failed { label, error } => {
                    writeln!(f, "  [{}] FAILED: {}", label, error)?;
                }
            }
        }
        Ok(())
    }
}

struct Baseline {
    table: CostTable,
    top: Vec<CountryId>,
}

fn run_one(
    scenario: &Scenario,
    base_table: &CostTable,
    latency: &LatencyTable,
    base_params: &ScenarioParams,
    baseline: Option<&Baseline>,
) -> Result<(ScenarioSummary, CostTable), InputError> {
    let params = scenario.params.as_ref().unwrap_or(base_params);
    let table = base_table.adjusted(&scenario.adjustments)?;
    let equilibrium = solve_equilibrium(&table, params)?;
    let sourcing = source_all(&table, latency, params)?;
    let revenue = RevenueShares::from_report(&sourcing, &table, true);

    let top = top_n(&table, TOP_N);
    let (rank_correlation, top_unchanged) = match baseline {
        Some(b) => (spearman_rho(&table, &b.table), top == b.top),
        None => (Some(1.0), true),
    };

    let summary = ScenarioSummary {
        label: scenario.label.clone(),
        price: equilibrium.price,
        status: equilibrium.status,
        exporter_count: equilibrium.exporter_count(),
        concentration: equilibrium.concentration(),
        inference_concentration: revenue.inference_concentration,
        inference_importers: sourcing.inference_importers().count(),
        rank_correlation,
        top,
        top_unchanged,
    };
    Ok((summary, table))
}

/// Evaluate every scenario against its own derived copy of `base_table`.
///
/// The first scenario that completes becomes the baseline for rank
/// comparisons. A failing scenario is recorded and the sweep moves on.
pub fn run_sweep(
    base_table: &CostTable,
    latency: &LatencyTable,
    params: &ScenarioParams,
    scenarios: &[Scenario],
) -> SweepReport {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let mut baseline: Option<Baseline> = None;
    let mut outcomes = Vec::with_capacity(scenarios.len());

    for scenario in scenarios {
        match run_one(scenario, base_table, latency, params, baseline.as_ref()) {
            Ok((summary, table)) => {
                info!(
                    "scenario '{}': p={} ({}), {} exporters",
                    summary.label, summary.price, summary.status, summary.exporter_count
                );
                if baseline.is_none() {
                    baseline = Some(Baseline {
                        table,
                        top: summary.top.clone(),
                    });
                }
                outcomes.push(ScenarioOutcome::Completed(summary));
            }
            Err(e) => {
                warn!("scenario '{}' failed: {}", scenario.label, e);
                outcomes.push(ScenarioOutcome::Failed {
                    label: scenario.label.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        "sweep {} finished: {} of {} scenarios completed",
        run_id,
        outcomes
            .iter()
            .filter(|o| matches!(o, ScenarioOutcome::Completed(_)))
            .count(),
        outcomes.len()
    );

    SweepReport {
        run_id,
        started_at,
        outcomes,
    }
}
