use crate::core::country::CountryId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors arising from latency table construction.
#[derive(Debug, Error, PartialEq)]
pub enum LatencyError {
    #[error("latency must be non-negative, got {latency_ms} ms for {from} -> {to}")]
    Negative {
        from: CountryId,
        to: CountryId,
        latency_ms: Decimal,
    },
}

/// One measured round-trip delay between two countries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyRecord {
    pub source: CountryId,
    pub destination: CountryId,
    pub latency_ms: Decimal,
}

impl LatencyRecord {
    pub fn new(source: impl Into<String>, destination: impl Into<String>, latency_ms: Decimal) -> Self {
        Self {
            source: CountryId::new(source),
            destination: CountryId::new(destination),
            latency_ms,
        }
    }
}

/// Pre-indexed round-trip latency between country pairs.
///
/// The table is symmetrized as it is filled: a measured `(A, B)` also
/// answers `(B, A)` until `(B, A)` is measured itself. The table holds
/// measurements only: domestic delivery uses the `(K, K)` self-pair when
/// present and a default supplied by the caller otherwise. Foreign pairs
/// that were never measured in either direction have no latency; callers
/// must skip them rather than treat them as zero.
///
/// # Examples
///
/// ```
/// use flop_trade::core::country::CountryId;
/// use flop_trade::core::latency::LatencyTable;
/// use rust_decimal_macros::dec;
///
/// let mut table = LatencyTable::new();
/// table.insert(CountryId::new("KAZ"), CountryId::new("DEU"), dec!(62)).unwrap();
///
/// let kaz = CountryId::new("KAZ");
/// let deu = CountryId::new("DEU");
/// assert_eq!(table.latency(&deu, &kaz), Some(dec!(62)));
/// assert_eq!(table.latency(&kaz, &kaz), None);
/// assert_eq!(table.domestic(&kaz, dec!(5)), dec!(5));
/// assert_eq!(table.latency(&kaz, &CountryId::new("BRA")), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LatencyTable {
    /// (source, destination) -> latency in ms.
    pairs: HashMap<(CountryId, CountryId), Decimal>,
    /// Pairs filled from the reverse direction rather than measured.
    inferred: HashSet<(CountryId, CountryId)>,
}

impl LatencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a symmetrized table from raw records.
    pub fn from_records(records: &[LatencyRecord]) -> Result<Self, LatencyError> {
        let mut table = Self::new();
        for r in records {
            table.insert(r.source.clone(), r.destination.clone(), r.latency_ms)?;
        }
        Ok(table)
    }

    /// Record a measured latency from `source` to `destination`.
    pub fn insert(
        &mut self,
        source: CountryId,
        destination: CountryId,
        latency_ms: Decimal,
    ) -> Result<(), LatencyError> {
        if latency_ms < Decimal::ZERO {
            return Err(LatencyError::Negative {
                from: source,
                to: destination,
                latency_ms,
            });
        }
        let forward = (source.clone(), destination.clone());
        let reverse = (destination, source);

        self.inferred.remove(&forward);
        self.pairs.insert(forward, latency_ms);

        if reverse.0 == reverse.1 {
            return Ok(());
        }
        // Fill the reverse direction unless it was measured.
        if !self.pairs.contains_key(&reverse) || self.inferred.contains(&reverse) {
            self.pairs.insert(reverse.clone(), latency_ms);
            self.inferred.insert(reverse);
        }
        Ok(())
    }

    /// Measured (or symmetrized) latency from `source` to `destination`.
    pub fn latency(&self, source: &CountryId, destination: &CountryId) -> Option<Decimal> {
        self.pairs
            .get(&(source.clone(), destination.clone()))
            .copied()
    }

    /// Domestic delivery latency for `country`: its self-pair, or
    /// `default_ms` when none was measured.
    pub fn domestic(&self, country: &CountryId, default_ms: Decimal) -> Decimal {
        self.latency(country, country).unwrap_or(default_ms)
    }

    /// Number of directed pairs held, including inferred reverses.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Whether `(source, destination)` was filled from the reverse direction.
    pub fn is_inferred(&self, source: &CountryId, destination: &CountryId) -> bool {
        self.inferred
            .contains(&(source.clone(), destination.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn id(s: &str) -> CountryId {
        CountryId::new(s)
    }

    #[test]
    fn test_reverse_inherits_forward() {
        let table =
            LatencyTable::from_records(&[LatencyRecord::new("X", "Y", dec!(50))]).unwrap();
        assert_eq!(table.latency(&id("Y"), &id("X")), Some(dec!(50)));
        assert!(table.is_inferred(&id("Y"), &id("X")));
        assert!(!table.is_inferred(&id("X"), &id("Y")));
    }

    #[test]
    fn test_measured_reverse_wins_in_any_order() {
        let forward_first = LatencyTable::from_records(
            &[
                LatencyRecord::new("X", "Y", dec!(50)),
                LatencyRecord::new("Y", "X", dec!(55)),
            ],
        )
        .unwrap();
        let reverse_first = LatencyTable::from_records(
            &[
                LatencyRecord::new("Y", "X", dec!(55)),
                LatencyRecord::new("X", "Y", dec!(50)),
            ],
        )
        .unwrap();

        for table in [forward_first, reverse_first] {
            assert_eq!(table.latency(&id("X"), &id("Y")), Some(dec!(50)));
            assert_eq!(table.latency(&id("Y"), &id("X")), Some(dec!(55)));
        }
    }

    #[test]
    fn test_remeasured_forward_updates_inferred_reverse() {
        let mut table = LatencyTable::new();
        table.insert(id("X"), id("Y"), dec!(50)).unwrap();
        table.insert(id("X"), id("Y"), dec!(40)).unwrap();
        assert_eq!(table.latency(&id("Y"), &id("X")), Some(dec!(40)));
    }

    #[test]
    fn test_domestic_self_pair_and_default() {
        let table =
            LatencyTable::from_records(&[LatencyRecord::new("Y", "Y", dec!(3))]).unwrap();
        assert_eq!(table.domestic(&id("Y"), dec!(5)), dec!(3));
        assert_eq!(table.domestic(&id("X"), dec!(5)), dec!(5));
        assert_eq!(table.domestic(&id("X"), dec!(12)), dec!(12));
        assert_eq!(table.latency(&id("X"), &id("X")), None);
    }

    #[test]
    fn test_missing_foreign_pair() {
        let table = LatencyTable::new();
        assert_eq!(table.latency(&id("X"), &id("Y")), None);
    }

    #[test]
    fn test_negative_latency_rejected() {
        let result =
            LatencyTable::from_records(&[LatencyRecord::new("X", "Y", dec!(-1))]);
        assert!(matches!(result, Err(LatencyError::Negative { .. })));
    }
}
