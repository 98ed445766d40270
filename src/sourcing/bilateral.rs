use crate::core::cost_table::{CostTable, InputError};
use crate::core::country::{CountryCost, CountryId};
use crate::core::latency::LatencyTable;
use crate::core::params::ScenarioParams;
use crate::sourcing::regime::{classify, Regime};
use log::{debug, info};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cost of serving a demand center from a source `latency_ms` away:
/// `(1 + τ·latency)·cost`.
///
/// # Examples
///
/// ```
/// use flop_trade::sourcing::bilateral::delivered_cost;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(delivered_cost(dec!(1.0), dec!(50), dec!(0.0008)), dec!(1.04));
/// ```
pub fn delivered_cost(unit_cost: Decimal, latency_ms: Decimal, latency_penalty: Decimal) -> Decimal {
    (Decimal::ONE + latency_penalty * latency_ms) * unit_cost
}

/// The cheapest foreign supplier found for one good.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignOption {
    pub source: CountryId,
    /// Raw unit cost for training, delivered cost for inference.
    pub cost: Decimal,
}

/// Sourcing outcome for one demand center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcingRecord {
    pub country: CountryId,
    pub domestic_cost: Decimal,
    pub domestic_latency_ms: Decimal,
    /// Domestic cost with domestic latency applied.
    pub domestic_delivered_cost: Decimal,
    /// Argmin of delivered cost over all reachable sources, itself included.
    pub best_source: CountryId,
    pub best_delivered_cost: Decimal,
    /// Cheapest eligible foreign supplier by raw cost.
    pub foreign_training: Option<ForeignOption>,
    /// Cheapest reachable eligible foreign supplier by delivered cost.
    pub foreign_inference: Option<ForeignOption>,
    /// Regime with no sovereignty premium.
    pub regime: Regime,
    /// Regime under the report's sovereignty premium.
    pub sovereign_regime: Regime,
}

impl SourcingRecord {
    pub fn regime(&self, sovereign: bool) -> Regime {
        if sovereign {
            self.sovereign_regime
        } else {
            self.regime
        }
    }

    /// Who supplies this center's training compute.
    pub fn training_source(&self, sovereign: bool) -> &CountryId {
        match &self.foreign_training {
            Some(f) if self.regime(sovereign).imports_training() => &f.source,
            _ => &self.country,
        }
    }

    /// Who supplies this center's inference compute.
    pub fn inference_source(&self, sovereign: bool) -> &CountryId {
        match &self.foreign_inference {
            Some(f) if self.regime(sovereign).imports_inference() => &f.source,
            _ => &self.country,
        }
    }

    pub fn imports_inference(&self) -> bool {
        self.best_source != self.country
    }
}

/// Per-demand-center sourcing for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcingReport {
    pub sovereignty_premium: Decimal,
    pub latency_penalty: Decimal,
    records: Vec<SourcingRecord>,
}

impl SourcingReport {
    /// Records in cost-table order.
    pub fn records(&self) -> &[SourcingRecord] {
        &self.records
    }

    pub fn record(&self, country: &CountryId) -> Option<&SourcingRecord> {
        self.records.iter().find(|r| &r.country == country)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Demand centers whose best inference source is foreign.
    pub fn inference_importers(&self) -> impl Iterator<Item = &SourcingRecord> {
        self.records.iter().filter(|r| r.imports_inference())
    }
}

impl fmt::Display for SourcingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Bilateral Sourcing ===")?;
        writeln!(f, "Sovereignty premium: {}", self.sovereignty_premium)?;
        writeln!(f, "Latency penalty:     {} per ms", self.latency_penalty)?;
        writeln!(
            f,
            "\n{:<6} {:>10} {:>12} {:>6} {:>12} {:<36} {}",
            "ISO", "cost", "delivered", "best", "best cost", "regime", "with premium"
        )?;
        for r in &self.records {
            writeln!(
                f,
                "{:<6} {:>10.4} {:>12.4} {:>6} {:>12.4} {:<36} {}",
                r.country,
                r.domestic_cost,
                r.domestic_delivered_cost,
                r.best_source,
                r.best_delivered_cost,
                r.regime.label(),
                r.sovereign_regime.label()
            )?;
        }
        Ok(())
    }
}

/// Exact all-pairs search for one demand center.
///
/// Candidates are visited in cost-ranked order and replaced only by a
/// strictly cheaper one, so the first-encountered candidate wins ties.
/// Excluded countries may supply themselves but no one else. Foreign
/// sources without a latency entry are skipped for inference; training
/// is latency-insensitive and needs none.
fn source_one(
    center: &CountryCost,
    ranked: &[&CountryCost],
    latency: &LatencyTable,
    params: &ScenarioParams,
) -> SourcingRecord {
    let tau = params.latency_penalty;
    let domestic_latency_ms = latency.domestic(&center.id, params.domestic_latency_ms);
    let domestic_delivered_cost = delivered_cost(center.unit_cost, domestic_latency_ms, tau);

    let mut best: Option<(&CountryId, Decimal)> = None;
    let mut foreign_training: Option<(&CountryId, Decimal)> = None;
    let mut foreign_inference: Option<(&CountryId, Decimal)> = None;

    for source in ranked {
        if source.id == center.id {
            if best.map_or(true, |(_, cost)| domestic_delivered_cost < cost) {
                best = Some((&center.id, domestic_delivered_cost));
            }
            continue;
        }
        if source.excluded {
            continue;
        }

        if foreign_training.map_or(true, |(_, cost)| source.unit_cost < cost) {
            foreign_training = Some((&source.id, source.unit_cost));
        }

        let Some(ms) = latency.latency(&source.id, &center.id) else {
            continue;
        };
        let delivered = delivered_cost(source.unit_cost, ms, tau);
        if foreign_inference.map_or(true, |(_, cost)| delivered < cost) {
            foreign_inference = Some((&source.id, delivered));
        }
        if best.map_or(true, |(_, cost)| delivered < cost) {
            best = Some((&source.id, delivered));
        }
    }

    let (best_source, best_delivered_cost) = best
        .map(|(id, cost)| (id.clone(), cost))
        .unwrap_or_else(|| (center.id.clone(), domestic_delivered_cost));
    let to_option = |found: Option<(&CountryId, Decimal)>| {
        found.map(|(id, cost)| ForeignOption {
            source: id.clone(),
            cost,
        })
    };
    let foreign_training = to_option(foreign_training);
    let foreign_inference = to_option(foreign_inference);

    let train_cost = foreign_training.as_ref().map(|f| f.cost);
    let inference_cost = foreign_inference.as_ref().map(|f| f.cost);
    let regime = classify(
        center.unit_cost,
        train_cost,
        domestic_delivered_cost,
        inference_cost,
        Decimal::ZERO,
    );
    let sovereign_regime = classify(
        center.unit_cost,
        train_cost,
        domestic_delivered_cost,
        inference_cost,
        params.sovereignty_premium,
    );

    SourcingRecord {
        country: center.id.clone(),
        domestic_cost: center.unit_cost,
        domestic_latency_ms,
        domestic_delivered_cost,
        best_source,
        best_delivered_cost,
        foreign_training,
        foreign_inference,
        regime,
        sovereign_regime,
    }
}

/// Assign every demand center its cheapest supplier and classify its
/// regime, with and without the sovereignty premium.
///
/// The search is O(n²) in the number of countries: every pair is compared
/// exactly.
///
/// # Examples
///
/// ```
/// use flop_trade::core::cost_table::CostTable;
/// use flop_trade::core::country::{CountryCost, CountryId};
/// use flop_trade::core::latency::{LatencyRecord, LatencyTable};
/// use flop_trade::core::params::ScenarioParams;
/// use flop_trade::sourcing::bilateral::source_all;
/// use rust_decimal_macros::dec;
///
/// let table: CostTable = vec![
///     CountryCost::new("X", "X", dec!(1.0), dec!(10), dec!(0.5)),
///     CountryCost::new("Y", "Y", dec!(1.1), dec!(10), dec!(0.5)),
/// ]
/// .into_iter()
/// .collect();
/// let latency = LatencyTable::from_records(&[LatencyRecord::new("X", "Y", dec!(50))]).unwrap();
///
/// let report = source_all(&table, &latency, &ScenarioParams::default()).unwrap();
/// let y = report.record(&CountryId::new("Y")).unwrap();
/// assert_eq!(y.best_source.as_str(), "X");
/// assert_eq!(y.best_delivered_cost, dec!(1.04));
/// assert_eq!(y.domestic_delivered_cost, dec!(1.1044));
/// ```
pub fn source_all(
    table: &CostTable,
    latency: &LatencyTable,
    params: &ScenarioParams,
) -> Result<SourcingReport, InputError> {
    params.validate()?;
    table.validate(params.weight_tolerance)?;

    let ranked = table.ranked();
    let records: Vec<SourcingRecord> = table
        .countries()
        .iter()
        .map(|center| source_one(center, &ranked, latency, params))
        .collect();

    for r in &records {
        debug!(
            "{}: best {} at {} (domestic {}), {} / {}",
            r.country, r.best_source, r.best_delivered_cost, r.domestic_delivered_cost, r.regime, r.sovereign_regime
        );
    }
    info!(
        "sourced {} demand centers; {} import inference",
        records.len(),
        records.iter().filter(|r| r.imports_inference()).count()
    );

    Ok(SourcingReport {
        sovereignty_premium: params.sovereignty_premium,
        latency_penalty: params.latency_penalty,
        records,
    })
}
