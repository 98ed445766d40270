use crate::core::cost_table::CostTable;
use crate::core::country::CountryId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One supplier's position in the merit order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackEntry {
    pub country: CountryId,
    pub unit_cost: Decimal,
    /// Capacity offered to the traded market (capacity share applied).
    pub tradable_capacity: Decimal,
    pub excluded: bool,
}

/// Where a quantity lands on the supply stack.
#[derive(Debug, Clone, PartialEq)]
pub enum StackClearing {
    /// Nothing to clear.
    NoDemand,
    /// Eligible cumulative capacity first meets demand at `position`
    /// (index into [`SupplyStack::entries`]); the clearing price is that
    /// supplier's cost.
    Marginal { position: usize, price: Decimal },
    /// Demand exceeds all eligible capacity. `ceiling` is the most expensive
    /// eligible cost.
    Shortfall { ceiling: Decimal, shortfall: Decimal },
}

/// Countries ordered by ascending unit cost.
///
/// The ordering is a stable sort, so suppliers with identical costs keep
/// their input order. Excluded suppliers stay in the stack for ranking and
/// reporting but never contribute capacity.
///
/// # Examples
///
/// ```
/// use flop_trade::core::cost_table::CostTable;
/// use flop_trade::core::country::CountryCost;
/// use flop_trade::market::supply_stack::{StackClearing, SupplyStack};
/// use rust_decimal::Decimal;
/// use rust_decimal_macros::dec;
///
/// let table: CostTable = vec![
///     CountryCost::new("A", "A", dec!(1.0), dec!(100), dec!(0.5)),
///     CountryCost::new("B", "B", dec!(1.2), dec!(50), dec!(0.3)),
///     CountryCost::new("C", "C", dec!(0.9), dec!(10), dec!(0.2)).sanctioned(),
/// ]
/// .into_iter()
/// .collect();
///
/// let stack = SupplyStack::build(&table, Decimal::ONE);
/// assert_eq!(stack.total_capacity(), dec!(150));
/// assert_eq!(
///     stack.clear(dec!(120)),
///     StackClearing::Marginal { position: 2, price: dec!(1.2) },
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyStack {
    entries: Vec<StackEntry>,
}

impl SupplyStack {
    /// Build the merit order from a cost table, offering `capacity_share`
    /// of each supplier's capacity to the traded market.
    pub fn build(table: &CostTable, capacity_share: Decimal) -> Self {
        let entries = table
            .ranked()
            .into_iter()
            .map(|c| StackEntry {
                country: c.id.clone(),
                unit_cost: c.unit_cost,
                tradable_capacity: c.capacity * capacity_share,
                excluded: c.excluded,
            })
            .collect();
        Self { entries }
    }

    /// All suppliers in cost order, excluded ones included.
    pub fn entries(&self) -> &[StackEntry] {
        &self.entries
    }

    /// Suppliers that may sell into the traded market, in cost order.
    pub fn eligible(&self) -> impl Iterator<Item = &StackEntry> {
        self.entries.iter().filter(|e| !e.excluded)
    }

    /// Cost of the cheapest eligible supplier.
    pub fn floor_price(&self) -> Option<Decimal> {
        self.eligible().next().map(|e| e.unit_cost)
    }

    /// Cost of the most expensive eligible supplier.
    pub fn ceiling_price(&self) -> Option<Decimal> {
        self.eligible().last().map(|e| e.unit_cost)
    }

    /// Total eligible tradable capacity.
    pub fn total_capacity(&self) -> Decimal {
        self.eligible().map(|e| e.tradable_capacity).sum()
    }

    /// Running total of eligible capacity at each eligible supplier.
    pub fn cumulative_capacity(&self) -> Vec<(&CountryId, Decimal)> {
        let mut cumulative = Decimal::ZERO;
        self.eligible()
            .map(|e| {
                cumulative += e.tradable_capacity;
                (&e.country, cumulative)
            })
            .collect()
    }

    /// 1-based cost rank of every country, excluded ones included.
    pub fn rank_of(&self, country: &CountryId) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| &e.country == country)
            .map(|i| i + 1)
    }

    /// Walk the eligible suppliers accumulating capacity until it meets
    /// `demand`. The clearing price is the cost of the supplier that first
    /// satisfies it.
    pub fn clear(&self, demand: Decimal) -> StackClearing {
        if demand <= Decimal::ZERO {
            return StackClearing::NoDemand;
        }

        let mut cumulative = Decimal::ZERO;
        let mut ceiling = None;
        for (position, entry) in self.entries.iter().enumerate() {
            if entry.excluded {
                continue;
            }
            cumulative += entry.tradable_capacity;
            ceiling = Some(entry.unit_cost);
            if cumulative >= demand {
                return StackClearing::Marginal {
                    position,
                    price: entry.unit_cost,
                };
            }
        }

        StackClearing::Shortfall {
            ceiling: ceiling.unwrap_or(Decimal::ZERO),
            shortfall: demand - cumulative,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::country::CountryCost;
    use rust_decimal_macros::dec;

    fn abc() -> CostTable {
        vec![
            CountryCost::new("A", "Alpha", dec!(1.0), dec!(100), dec!(0.5)),
            CountryCost::new("B", "Beta", dec!(1.2), dec!(50), dec!(0.3)),
            CountryCost::new("C", "Gamma", dec!(0.9), dec!(10), dec!(0.2)).sanctioned(),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_order_keeps_excluded() {
        let stack = SupplyStack::build(&abc(), Decimal::ONE);
        let order: Vec<&str> = stack.entries().iter().map(|e| e.country.as_str()).collect();
        assert_eq!(order, vec!["C", "A", "B"]);
        assert_eq!(stack.rank_of(&CountryId::new("C")), Some(1));
    }

    #[test]
    fn test_floor_and_ceiling_skip_excluded() {
        let stack = SupplyStack::build(&abc(), Decimal::ONE);
        assert_eq!(stack.floor_price(), Some(dec!(1.0)));
        assert_eq!(stack.ceiling_price(), Some(dec!(1.2)));
    }

    #[test]
    fn test_cumulative_capacity() {
        let stack = SupplyStack::build(&abc(), Decimal::ONE);
        let cumulative: Vec<Decimal> = stack.cumulative_capacity().into_iter().map(|(_, c)| c).collect();
        assert_eq!(cumulative, vec![dec!(100), dec!(150)]);
    }

    #[test]
    fn test_capacity_share_scales_offer() {
        let stack = SupplyStack::build(&abc(), dec!(0.5));
        assert_eq!(stack.total_capacity(), dec!(75));
    }

    #[test]
    fn test_clear_within_first_supplier() {
        let stack = SupplyStack::build(&abc(), Decimal::ONE);
        assert_eq!(
            stack.clear(dec!(60)),
            StackClearing::Marginal {
                position: 1,
                price: dec!(1.0),
            }
        );
    }

    #[test]
    fn test_clear_exactly_at_capacity() {
        let stack = SupplyStack::build(&abc(), Decimal::ONE);
        assert_eq!(
            stack.clear(dec!(100)),
            StackClearing::Marginal {
                position: 1,
                price: dec!(1.0),
            }
        );
    }

    #[test]
    fn test_clear_no_demand() {
        let stack = SupplyStack::build(&abc(), Decimal::ONE);
        assert_eq!(stack.clear(Decimal::ZERO), StackClearing::NoDemand);
    }

    #[test]
    fn test_clear_shortfall() {
        let stack = SupplyStack::build(&abc(), Decimal::ONE);
        assert_eq!(
            stack.clear(dec!(200)),
            StackClearing::Shortfall {
                ceiling: dec!(1.2),
                shortfall: dec!(50),
            }
        );
    }

    #[test]
    fn test_equal_costs_keep_input_order() {
        let table: CostTable = vec![
            CountryCost::new("P", "P", dec!(1.0), dec!(10), dec!(0.5)),
            CountryCost::new("Q", "Q", dec!(1.0), dec!(10), dec!(0.5)),
        ]
        .into_iter()
        .collect();
        let stack = SupplyStack::build(&table, Decimal::ONE);
        assert_eq!(stack.entries()[0].country.as_str(), "P");
        assert_eq!(
            stack.clear(dec!(5)),
            StackClearing::Marginal {
                position: 0,
                price: dec!(1.0),
            }
        );
    }
}
