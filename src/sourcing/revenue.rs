use crate::analysis::metrics::herfindahl;
use crate::core::cost_table::CostTable;
use crate::core::country::CountryId;
use crate::sourcing::bilateral::{SourcingRecord, SourcingReport};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A supplier's slice of one good's market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierShare {
    pub source: CountryId,
    /// Demand weight served, normalized over all demand centers.
    pub share: Decimal,
    /// Foreign demand centers served.
    pub hub_count: usize,
}

/// Market shares by supplier for both goods, derived from sourcing choices.
///
/// Every demand center's weight is attributed to whoever supplies it,
/// itself included, so the shares of each good sum to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueShares {
    /// Training suppliers, largest share first.
    pub training: Vec<SupplierShare>,
    /// Inference suppliers, largest share first.
    pub inference: Vec<SupplierShare>,
    /// HHI of training shares.
    pub training_concentration: Decimal,
    /// HHI of inference shares.
    pub inference_concentration: Decimal,
}

impl RevenueShares {
    /// Attribute demand weights from `table` to the sources chosen in
    /// `report`. With `sovereign` set, choices follow the sovereignty
    /// regime.
    pub fn from_report(report: &SourcingReport, table: &CostTable, sovereign: bool) -> Self {
        let training = attribute(report, table, |r| r.training_source(sovereign));
        let inference = attribute(report, table, |r| r.inference_source(sovereign));
        Self {
            training_concentration: herfindahl(training.iter().map(|s| s.share)),
            inference_concentration: herfindahl(inference.iter().map(|s| s.share)),
            training,
            inference,
        }
    }

    pub fn training_share(&self, country: &CountryId) -> Decimal {
        lookup(&self.training, country)
    }

    pub fn inference_share(&self, country: &CountryId) -> Decimal {
        lookup(&self.inference, country)
    }

    /// Suppliers serving at least one foreign center with inference.
    pub fn inference_hubs(&self) -> impl Iterator<Item = &SupplierShare> {
        self.inference.iter().filter(|s| s.hub_count > 0)
    }
}

fn lookup(shares: &[SupplierShare], country: &CountryId) -> Decimal {
    shares
        .iter()
        .find(|s| &s.source == country)
        .map(|s| s.share)
        .unwrap_or(Decimal::ZERO)
}

fn attribute<'r>(
    report: &'r SourcingReport,
    table: &CostTable,
    source_of: impl Fn(&'r SourcingRecord) -> &'r CountryId,
) -> Vec<SupplierShare> {
    let mut weight: HashMap<&CountryId, Decimal> = HashMap::new();
    let mut hubs: HashMap<&CountryId, usize> = HashMap::new();
    // First-seen order keeps the output deterministic on equal shares.
    let mut order: Vec<&CountryId> = Vec::new();

    for record in report.records() {
        let omega = table
            .get(&record.country)
            .map(|c| c.demand_weight)
            .unwrap_or(Decimal::ZERO);
        let source = source_of(record);
        if !weight.contains_key(source) {
            order.push(source);
        }
        *weight.entry(source).or_insert(Decimal::ZERO) += omega;
        let hub = hubs.entry(source).or_insert(0);
        if source != &record.country {
            *hub += 1;
        }
    }

    let total: Decimal = weight.values().copied().sum();
    if total <= Decimal::ZERO {
        return Vec::new();
    }

    let mut shares: Vec<SupplierShare> = order
        .into_iter()
        .map(|source| SupplierShare {
            source: source.clone(),
            share: weight[source] / total,
            hub_count: hubs[source],
        })
        .filter(|s| s.share > Decimal::ZERO || s.hub_count > 0)
        .collect();
    shares.sort_by(|a, b| b.share.cmp(&a.share));
    shares
}

impl fmt::Display for RevenueShares {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Revenue Shares ===")?;
        writeln!(f, "HHI training:  {:.4}", self.training_concentration)?;
        writeln!(f, "HHI inference: {:.4}", self.inference_concentration)?;
        for (title, shares) in [("Training", &self.training), ("Inference", &self.inference)] {
            writeln!(f, "\n{} suppliers:", title)?;
            for s in shares.iter().take(10) {
                writeln!(
                    f,
                    "  {:<6} {:>6.1}%  serves {} foreign",
                    s.source,
                    s.share * Decimal::ONE_HUNDRED,
                    s.hub_count
                )?;
            }
        }
        Ok(())
    }
}
