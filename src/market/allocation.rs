use crate::analysis::metrics::herfindahl;
use crate::core::country::CountryId;
use crate::market::supply_stack::SupplyStack;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Allocation at or above this fraction of tradable capacity counts as
/// capacity-binding. Solver allocations rarely land exactly on capacity.
pub const BINDING_THRESHOLD: Decimal = dec!(0.99);

/// One active exporter's share of the cleared market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExporterAllocation {
    pub country: CountryId,
    pub unit_cost: Decimal,
    pub tradable_capacity: Decimal,
    pub allocated: Decimal,
    /// `allocated / total_allocated`.
    pub share: Decimal,
    /// `p − c` when capacity binds and the exporter earns a rent;
    /// `None` otherwise.
    pub shadow_value: Option<Decimal>,
}

impl ExporterAllocation {
    pub fn is_capacity_bound(&self) -> bool {
        self.shadow_value.is_some()
    }
}

/// Merit-order allocation of a quantity at a cleared price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    /// Active exporters in cost order.
    pub exporters: Vec<ExporterAllocation>,
    pub total_allocated: Decimal,
    /// Demand left unserved after every eligible supplier priced at or
    /// below the clearing price is exhausted.
    pub unmet: Decimal,
    /// Herfindahl-Hirschman index of export shares.
    ///
    /// Zero with no exporters, not 1.0: a market that clears nothing is
    /// reported as empty rather than as a single-supplier monopoly.
    pub concentration: Decimal,
}

impl Allocation {
    pub fn exporter(&self, country: &CountryId) -> Option<&ExporterAllocation> {
        self.exporters.iter().find(|e| &e.country == country)
    }

    pub fn exporter_count(&self) -> usize {
        self.exporters.len()
    }

    /// Exporters whose capacity binds, with their shadow values.
    pub fn shadow_values(&self) -> impl Iterator<Item = (&CountryId, Decimal)> {
        self.exporters
            .iter()
            .filter_map(|e| e.shadow_value.map(|mu| (&e.country, mu)))
    }
}

/// Fill `demand` from the cheapest eligible suppliers priced at or below
/// `price`, each up to its tradable capacity.
///
/// # Algorithm
///
/// 1. Walk the stack in cost order, skipping excluded suppliers.
/// 2. Give each supplier `min(capacity, remaining)`; stop once nothing
///    remains or the next supplier costs more than `price`.
/// 3. Normalize allocations into shares and compute the HHI.
/// 4. A supplier allocated at least [`BINDING_THRESHOLD`] of its capacity
///    with cost strictly below `price` has shadow value `price − cost`.
pub fn allocate(stack: &SupplyStack, price: Decimal, demand: Decimal) -> Allocation {
    let mut exporters = Vec::new();
    let mut remaining = demand.max(Decimal::ZERO);

    for entry in stack.eligible() {
        if remaining <= Decimal::ZERO || entry.unit_cost > price {
            break;
        }
        let allocated = entry.tradable_capacity.min(remaining);
        if allocated > Decimal::ZERO {
            remaining -= allocated;
            exporters.push(ExporterAllocation {
                country: entry.country.clone(),
                unit_cost: entry.unit_cost,
                tradable_capacity: entry.tradable_capacity,
                allocated,
                share: Decimal::ZERO,
                shadow_value: None,
            });
        }
    }

    let total_allocated: Decimal = exporters.iter().map(|e| e.allocated).sum();
    for e in &mut exporters {
        e.share = e.allocated / total_allocated;
        let binding = e.allocated >= e.tradable_capacity * BINDING_THRESHOLD;
        if binding && e.unit_cost < price {
            e.shadow_value = Some(price - e.unit_cost);
        }
    }
    let concentration = herfindahl(exporters.iter().map(|e| e.share));

    Allocation {
        exporters,
        total_allocated,
        unmet: remaining,
        concentration,
    }
}
