use crate::core::country::{CountryCost, CountryId};
use crate::core::params::ParamsError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Input invariants violated by a cost table or its parameters.
///
/// These are raised before any solver runs so that a degenerate input never
/// produces a misleading price.
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("cost table is empty")]
    EmptyTable,
    #[error("country {0} appears more than once")]
    DuplicateCountry(CountryId),
    #[error("unknown country {0}")]
    UnknownCountry(CountryId),
    #[error("unit cost of {country} must be non-negative, got {cost}")]
    NegativeCost { country: CountryId, cost: Decimal },
    #[error("capacity of {country} must be non-negative, got {capacity}")]
    NegativeCapacity {
        country: CountryId,
        capacity: Decimal,
    },
    #[error("demand weight of {country} must be non-negative, got {weight}")]
    NegativeDemandWeight { country: CountryId, weight: Decimal },
    #[error("demand weights must sum to 1 (±{tolerance}), got {sum}")]
    DemandWeightSum { sum: Decimal, tolerance: Decimal },
    #[error("no eligible supplier: every country is excluded")]
    NoEligibleSupplier,
    #[error(transparent)]
    Params(#[from] ParamsError),
}

/// A perturbation applied to a cost table to derive a scenario table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CostAdjustment {
    /// Add a constant to every unit cost; results are floored at zero.
    Shift(Decimal),
    /// Multiply every unit cost by a factor.
    Scale(Decimal),
    /// Replace one country's unit cost (e.g. a cost-recovery correction
    /// for subsidized electricity).
    Override { country: CountryId, unit_cost: Decimal },
    /// Exclude one country from the supply side.
    Exclude(CountryId),
}

/// The per-country cost table consumed by the engine.
///
/// Input order is preserved; it is the tie-break order wherever two
/// countries have identical costs.
///
/// # Examples
///
/// ```
/// use flop_trade::core::cost_table::CostTable;
/// use flop_trade::core::country::CountryCost;
/// use rust_decimal_macros::dec;
///
/// let table: CostTable = vec![
///     CountryCost::new("ISL", "Iceland", dec!(1.10), dec!(100), dec!(0.4)),
///     CountryCost::new("USA", "United States", dec!(1.60), dec!(900), dec!(0.6)),
/// ]
/// .into_iter()
/// .collect();
///
/// assert!(table.validate(dec!(0.000001)).is_ok());
/// assert_eq!(table.cheapest().unwrap().id.as_str(), "ISL");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostTable {
    countries: Vec<CountryCost>,
}

impl CostTable {
    pub fn new() -> Self {
        Self {
            countries: Vec::new(),
        }
    }

    pub fn add(&mut self, country: CountryCost) {
        self.countries.push(country);
    }

    pub fn countries(&self) -> &[CountryCost] {
        &self.countries
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    pub fn get(&self, id: &CountryId) -> Option<&CountryCost> {
        self.countries.iter().find(|c| &c.id == id)
    }

    /// Sum of demand weights across all countries.
    pub fn total_demand_weight(&self) -> Decimal {
        self.countries.iter().map(|c| c.demand_weight).sum()
    }

    /// Countries that may sell into the traded market, in input order.
    pub fn eligible_suppliers(&self) -> impl Iterator<Item = &CountryCost> {
        self.countries.iter().filter(|c| c.is_eligible_supplier())
    }

    /// The cheapest country (first in input order on ties).
    pub fn cheapest(&self) -> Option<&CountryCost> {
        self.countries
            .iter()
            .reduce(|best, c| if c.unit_cost < best.unit_cost { c } else { best })
    }

    /// Countries in ascending cost order; stable, so ties keep input order.
    pub fn ranked(&self) -> Vec<&CountryCost> {
        let mut ranked: Vec<&CountryCost> = self.countries.iter().collect();
        ranked.sort_by(|a, b| a.unit_cost.cmp(&b.unit_cost));
        ranked
    }

    /// Check the table invariants: non-empty, unique identifiers,
    /// non-negative costs, capacities and weights, weights summing to one
    /// within `weight_tolerance`, and at least one eligible supplier.
    pub fn validate(&self, weight_tolerance: Decimal) -> Result<(), InputError> {
        if self.countries.is_empty() {
            return Err(InputError::EmptyTable);
        }

        let mut seen = HashSet::new();
        for c in &self.countries {
            if !seen.insert(&c.id) {
                return Err(InputError::DuplicateCountry(c.id.clone()));
            }
            if c.unit_cost < Decimal::ZERO {
                return Err(InputError::NegativeCost {
                    country: c.id.clone(),
                    cost: c.unit_cost,
                });
            }
            if c.capacity < Decimal::ZERO {
                return Err(InputError::NegativeCapacity {
                    country: c.id.clone(),
                    capacity: c.capacity,
                });
            }
            if c.demand_weight < Decimal::ZERO {
                return Err(InputError::NegativeDemandWeight {
                    country: c.id.clone(),
                    weight: c.demand_weight,
                });
            }
        }

        let sum = self.total_demand_weight();
        if (sum - Decimal::ONE).abs() > weight_tolerance {
            return Err(InputError::DemandWeightSum {
                sum,
                tolerance: weight_tolerance,
            });
        }

        if self.eligible_suppliers().next().is_none() {
            return Err(InputError::NoEligibleSupplier);
        }
        Ok(())
    }

    /// Derive a new table with the given adjustments applied in order.
    ///
    /// `self` is left untouched, so a shared baseline table can feed any
    /// number of scenarios.
    pub fn adjusted(&self, adjustments: &[CostAdjustment]) -> Result<CostTable, InputError> {
        let mut derived = self.clone();
        for adjustment in adjustments {
            match adjustment {
                CostAdjustment::Shift(delta) => {
                    for c in &mut derived.countries {
                        c.unit_cost = (c.unit_cost + *delta).max(Decimal::ZERO);
                    }
                }
                CostAdjustment::Scale(factor) => {
                    for c in &mut derived.countries {
                        c.unit_cost *= *factor;
                    }
                }
                CostAdjustment::Override { country, unit_cost } => {
                    let entry = derived.get_mut(country)?;
                    entry.unit_cost = *unit_cost;
                }
                CostAdjustment::Exclude(country) => {
                    derived.get_mut(country)?.excluded = true;
                }
            }
        }
        Ok(derived)
    }

    fn get_mut(&mut self, id: &CountryId) -> Result<&mut CountryCost, InputError> {
        self.countries
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| InputError::UnknownCountry(id.clone()))
    }
}

impl FromIterator<CountryCost> for CostTable {
    fn from_iter<T: IntoIterator<Item = CountryCost>>(iter: T) -> Self {
        Self {
            countries: iter.into_iter().collect(),
        }
    }
}
