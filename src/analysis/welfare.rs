use crate::analysis::metrics::to_f64;
use crate::core::cost_table::CostTable;
use crate::sourcing::bilateral::SourcingReport;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deadweight cost of keeping production at home when a cheaper
/// supplier exists.
///
/// Each demand center contributes `ω·max(0, c_k − best foreign)` for
/// training and `ω·max(0, domestic delivered − best delivered)` for
/// inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelfareReport {
    pub training: Decimal,
    pub inference: Decimal,
    /// Demand-weighted average domestic unit cost.
    pub weighted_average_cost: Decimal,
}

impl WelfareReport {
    pub fn compute(table: &CostTable, report: &SourcingReport) -> Self {
        let mut training = Decimal::ZERO;
        let mut inference = Decimal::ZERO;
        let mut weighted_average_cost = Decimal::ZERO;

        for record in report.records() {
            let Some(country) = table.get(&record.country) else {
                continue;
            };
            let omega = country.demand_weight;
            weighted_average_cost += omega * country.unit_cost;
            if let Some(foreign) = &record.foreign_training {
                training += omega * (record.domestic_cost - foreign.cost).max(Decimal::ZERO);
            }
            inference += omega
                * (record.domestic_delivered_cost - record.best_delivered_cost).max(Decimal::ZERO);
        }

        Self {
            training,
            inference,
            weighted_average_cost,
        }
    }

    pub fn total(&self) -> Decimal {
        self.training + self.inference
    }

    /// Total welfare cost as a percentage of average compute spending.
    pub fn percent_of_spending(&self) -> f64 {
        if self.weighted_average_cost <= Decimal::ZERO {
            return 0.0;
        }
        to_f64(self.total() / self.weighted_average_cost) * 100.0
    }
}

impl fmt::Display for WelfareReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Welfare Cost of Sovereignty ===")?;
        writeln!(f, "Training:  {:.4}", self.training)?;
        writeln!(f, "Inference: {:.4}", self.inference)?;
        writeln!(f, "Total:     {:.4} ({:.1}% of spending)", self.total(), self.percent_of_spending())
    }
}

/// How many demand centers stay domestic under a sovereignty threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdOutcome {
    pub threshold: Decimal,
    /// Countries with `c_k ≤ (1 + θ)·min c`.
    pub domestic_count: usize,
    /// Demand weight of everyone else.
    pub importing_share: Decimal,
}

/// Compare two sovereignty thresholds against the global minimum cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counterfactual {
    pub base: ThresholdOutcome,
    pub alternative: ThresholdOutcome,
}

impl Counterfactual {
    /// Evaluate `base` and `alternative` thresholds, e.g. 10% vs 20%.
    ///
    /// # Examples
    ///
    /// ```
    /// use flop_trade::analysis::welfare::Counterfactual;
    /// use flop_trade::core::cost_table::CostTable;
    /// use flop_trade::core::country::CountryCost;
    /// use rust_decimal_macros::dec;
    ///
    /// let table: CostTable = vec![
    ///     CountryCost::new("A", "A", dec!(1.00), dec!(10), dec!(0.5)),
    ///     CountryCost::new("B", "B", dec!(1.15), dec!(10), dec!(0.3)),
    ///     CountryCost::new("C", "C", dec!(1.50), dec!(10), dec!(0.2)),
    /// ]
    /// .into_iter()
    /// .collect();
    ///
    /// let cf = Counterfactual::compute(&table, dec!(0.10), dec!(0.20));
    /// assert_eq!(cf.additional_domestic(), 1);
    /// assert_eq!(cf.alternative.importing_share, dec!(0.2));
    /// ```
    pub fn compute(table: &CostTable, base: Decimal, alternative: Decimal) -> Self {
        Self {
            base: threshold_outcome(table, base),
            alternative: threshold_outcome(table, alternative),
        }
    }

    /// Extra countries kept at home by the alternative threshold.
    pub fn additional_domestic(&self) -> i64 {
        self.alternative.domestic_count as i64 - self.base.domestic_count as i64
    }
}

fn threshold_outcome(table: &CostTable, threshold: Decimal) -> ThresholdOutcome {
    let Some(min_cost) = table.cheapest().map(|c| c.unit_cost) else {
        return ThresholdOutcome {
            threshold,
            domestic_count: 0,
            importing_share: Decimal::ZERO,
        };
    };
    let ceiling = (Decimal::ONE + threshold) * min_cost;
    let (domestic, importing): (Vec<_>, Vec<_>) =
        table.countries().iter().partition(|c| c.unit_cost <= ceiling);
    ThresholdOutcome {
        threshold,
        domestic_count: domestic.len(),
        importing_share: importing.iter().map(|c| c.demand_weight).sum(),
    }
}
