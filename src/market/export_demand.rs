use crate::core::cost_table::CostTable;
use crate::core::country::CountryId;
use crate::core::params::ScenarioParams;
use rust_decimal::Decimal;

/// Quantity of the traded good demanded from foreign suppliers at a price.
///
/// Implementations must be non-increasing in `price`; the equilibrium
/// solver relies on it for its fixed point to exist.
pub trait DemandSchedule {
    fn quantity_at(&self, price: Decimal) -> Decimal;
}

/// A price-insensitive demand, useful for clearing a known quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedDemand(pub Decimal);

impl DemandSchedule for FixedDemand {
    fn quantity_at(&self, _price: Decimal) -> Decimal {
        self.0
    }
}

/// Export demand implied by the cost table.
///
/// A country imports the traded good when its domestic cost exceeds the
/// market price marked up by the sovereignty premium, `c_k > (1 + λ)·p`.
/// Each importer contributes `α·ω_k·Q_total`. Excluded countries take part
/// as importers like any other.
///
/// # Examples
///
/// ```
/// use flop_trade::core::cost_table::CostTable;
/// use flop_trade::core::country::CountryCost;
/// use flop_trade::core::params::ScenarioParams;
/// use flop_trade::market::export_demand::{DemandSchedule, ExportDemand};
/// use rust_decimal::Decimal;
/// use rust_decimal_macros::dec;
///
/// let table: CostTable = vec![
///     CountryCost::new("CHP", "Cheap", dec!(1.0), dec!(100), dec!(0.25)),
///     CountryCost::new("EXP", "Expensive", dec!(2.0), dec!(0), dec!(0.75)),
/// ]
/// .into_iter()
/// .collect();
/// let params = ScenarioParams {
///     training_share: dec!(0.5),
///     total_demand: dec!(1000),
///     sovereignty_premium: Decimal::ZERO,
///     ..Default::default()
/// };
///
/// let demand = ExportDemand::new(&table, &params);
/// assert_eq!(demand.quantity_at(dec!(1.0)), dec!(375));
/// assert_eq!(demand.quantity_at(dec!(2.0)), Decimal::ZERO);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ExportDemand<'a> {
    table: &'a CostTable,
    params: &'a ScenarioParams,
}

impl<'a> ExportDemand<'a> {
    pub fn new(table: &'a CostTable, params: &'a ScenarioParams) -> Self {
        Self { table, params }
    }

    /// Whether a country producing at `unit_cost` imports at `price`.
    fn imports(&self, unit_cost: Decimal, price: Decimal) -> bool {
        unit_cost > (Decimal::ONE + self.params.sovereignty_premium) * price
    }

    /// Countries that import at `price`, in table order.
    pub fn importers_at(&self, price: Decimal) -> Vec<&'a CountryId> {
        self.table
            .countries()
            .iter()
            .filter(|c| self.imports(c.unit_cost, price))
            .map(|c| &c.id)
            .collect()
    }
}

impl DemandSchedule for ExportDemand<'_> {
    fn quantity_at(&self, price: Decimal) -> Decimal {
        self.table
            .countries()
            .iter()
            .filter(|c| self.imports(c.unit_cost, price))
            .map(|c| self.params.traded_demand(c.demand_weight))
            .sum()
    }
}
