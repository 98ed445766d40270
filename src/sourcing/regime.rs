use crate::core::country::CountryId;
use crate::sourcing::bilateral::SourcingReport;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How a demand center obtains the two goods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Regime {
    /// Domestic production wins for both training and inference.
    FullDomestic,
    /// Foreign supply wins for both goods.
    FullImport,
    /// Imports training, builds inference capacity at home.
    ImportTrainingBuildInference,
    /// Trains at home, imports inference.
    BuildTrainingImportInference,
}

impl Regime {
    pub const ALL: [Regime; 4] = [
        Regime::FullDomestic,
        Regime::FullImport,
        Regime::ImportTrainingBuildInference,
        Regime::BuildTrainingImportInference,
    ];

    /// Combine the per-good make-or-buy decisions.
    pub fn from_choices(domestic_training: bool, domestic_inference: bool) -> Self {
        match (domestic_training, domestic_inference) {
            (true, true) => Regime::FullDomestic,
            (false, false) => Regime::FullImport,
            (false, true) => Regime::ImportTrainingBuildInference,
            (true, false) => Regime::BuildTrainingImportInference,
        }
    }

    pub fn imports_training(&self) -> bool {
        matches!(self, Regime::FullImport | Regime::ImportTrainingBuildInference)
    }

    pub fn imports_inference(&self) -> bool {
        matches!(self, Regime::FullImport | Regime::BuildTrainingImportInference)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Regime::FullDomestic => "full domestic",
            Regime::FullImport => "full import",
            Regime::ImportTrainingBuildInference => "import training, build inference",
            Regime::BuildTrainingImportInference => "build training, import inference",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether domestic production is preferred for one good.
///
/// Domestic wins whenever `domestic ≤ (1 + λ)·best_foreign`; with no
/// foreign option at all, domestic wins by default.
pub fn prefers_domestic(domestic: Decimal, best_foreign: Option<Decimal>, premium: Decimal) -> bool {
    match best_foreign {
        Some(foreign) => domestic <= (Decimal::ONE + premium) * foreign,
        None => true,
    }
}

/// Classify a demand center from its domestic and best foreign costs for
/// each good. Training compares raw costs; inference compares delivered
/// costs.
pub fn classify(
    domestic_training: Decimal,
    foreign_training: Option<Decimal>,
    domestic_inference: Decimal,
    foreign_inference: Option<Decimal>,
    premium: Decimal,
) -> Regime {
    Regime::from_choices(
        prefers_domestic(domestic_training, foreign_training, premium),
        prefers_domestic(domestic_inference, foreign_inference, premium),
    )
}

/// Number of demand centers in each regime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimeSummary {
    pub counts: BTreeMap<Regime, usize>,
}

impl RegimeSummary {
    /// Count regimes in a report, with or without the sovereignty premium.
    pub fn from_report(report: &SourcingReport, sovereign: bool) -> Self {
        let mut counts: BTreeMap<Regime, usize> = Regime::ALL.iter().map(|r| (*r, 0)).collect();
        for record in report.records() {
            *counts.entry(record.regime(sovereign)).or_insert(0) += 1;
        }
        Self { counts }
    }

    pub fn count(&self, regime: Regime) -> usize {
        self.counts.get(&regime).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

impl fmt::Display for RegimeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (regime, count) in &self.counts {
            writeln!(f, "  {:<36} {}", regime.label(), count)?;
        }
        Ok(())
    }
}

/// Countries whose regime differs between two reports, e.g. before and
/// after a cost-recovery adjustment. Countries present in only one report
/// are ignored.
pub fn regime_changes(
    before: &SourcingReport,
    after: &SourcingReport,
    sovereign: bool,
) -> Vec<(CountryId, Regime, Regime)> {
    before
        .records()
        .iter()
        .filter_map(|b| {
            let a = after.record(&b.country)?;
            let (from, to) = (b.regime(sovereign), a.regime(sovereign));
            (from != to).then(|| (b.country.clone(), from, to))
        })
        .collect()
}
