use crate::core::cost_table::{CostTable, InputError};
use crate::core::country::CountryId;
use crate::core::params::ScenarioParams;
use crate::market::allocation::{allocate, Allocation, ExporterAllocation};
use crate::market::export_demand::{DemandSchedule, ExportDemand};
use crate::market::supply_stack::{StackClearing, SupplyStack};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a clearing run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClearingStatus {
    /// The price is a fixed point within tolerance.
    Converged,
    /// The iteration cap was reached first; the last price is an
    /// approximation.
    Exhausted,
    /// Export demand exceeds all eligible capacity even at the most
    /// expensive eligible supplier's cost.
    Infeasible,
}

impl fmt::Display for ClearingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ClearingStatus::Converged => "converged",
            ClearingStatus::Exhausted => "iteration cap reached",
            ClearingStatus::Infeasible => "demand exceeds eligible capacity",
        };
        f.write_str(label)
    }
}

/// Solver state between iterations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverState {
    /// Current trial price.
    pub price: Decimal,
    /// Iterations completed.
    pub iteration: usize,
    /// Export demand evaluated in the last iteration.
    pub export_demand: Decimal,
    /// Stack position of the marginal supplier found in the last iteration.
    pub marginal: Option<usize>,
    /// Demand left over once all eligible capacity is used.
    pub shortfall: Decimal,
}

impl SolverState {
    /// Start at the cheapest eligible supplier's cost. `None` when the stack
    /// has no eligible supplier.
    pub fn initial(stack: &SupplyStack) -> Option<Self> {
        stack.floor_price().map(|price| Self {
            price,
            iteration: 0,
            export_demand: Decimal::ZERO,
            marginal: None,
            shortfall: Decimal::ZERO,
        })
    }
}

/// Outcome of a single solver transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The price moved; another iteration is needed.
    Continuing(SolverState),
    /// The price is a fixed point, or there is nothing to clear.
    Converged(SolverState),
    /// The iteration cap was reached without settling.
    Exhausted(SolverState),
    /// Demand still exceeds eligible capacity at the ceiling price.
    Infeasible(SolverState),
}

impl Step {
    /// State after the transition, whatever its outcome.
    pub fn state(&self) -> &SolverState {
        match self {
            Step::Continuing(s) | Step::Converged(s) | Step::Exhausted(s) | Step::Infeasible(s) => s,
        }
    }

    /// Whether the run stops here.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Step::Continuing(_))
    }
}

/// One fixed-point transition.
///
/// Evaluates export demand at the current price and clears it against the
/// stack. The new price is the cost of the marginal supplier. The run
/// converges once a marginal supplier is found and the price moved by less
/// than the tolerance. Zero demand leaves the price where it is, which is a
/// fixed point. Demand beyond all eligible capacity moves the price to the
/// most expensive eligible cost; if it is already there the run is
/// infeasible. Otherwise the run continues until the iteration cap.
pub fn step<D: DemandSchedule>(
    state: &SolverState,
    stack: &SupplyStack,
    demand: &D,
    params: &ScenarioParams,
) -> Step {
    let quantity = demand.quantity_at(state.price);
    let iteration = state.iteration + 1;

    let (next, settled) = match stack.clear(quantity) {
        StackClearing::NoDemand => {
            let next = SolverState {
                price: state.price,
                iteration,
                export_demand: quantity,
                marginal: None,
                shortfall: Decimal::ZERO,
            };
            return Step::Converged(next);
        }
        StackClearing::Marginal { position, price } => {
            let settled = (price - state.price).abs() < params.tolerance;
            let next = SolverState {
                price,
                iteration,
                export_demand: quantity,
                marginal: Some(position),
                shortfall: Decimal::ZERO,
            };
            (next, settled)
        }
        StackClearing::Shortfall { ceiling, shortfall } => {
            let stuck = (ceiling - state.price).abs() < params.tolerance;
            let next = SolverState {
                price: ceiling,
                iteration,
                export_demand: quantity,
                marginal: None,
                shortfall,
            };
            if stuck {
                return Step::Infeasible(next);
            }
            (next, false)
        }
    };

    debug!(
        "iteration {}: demand {} -> price {} (marginal {:?})",
        next.iteration, next.export_demand, next.price, next.marginal
    );

    if settled {
        Step::Converged(next)
    } else if next.iteration >= params.max_iterations {
        Step::Exhausted(next)
    } else {
        Step::Continuing(next)
    }
}

/// Cleared market for the traded good.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquilibriumResult {
    /// Market-clearing price `p`.
    pub price: Decimal,
    pub status: ClearingStatus,
    pub iterations: usize,
    /// Sovereignty premium the market was cleared under.
    pub sovereignty_premium: Decimal,
    /// Export demand the allocation was filled against.
    pub export_demand: Decimal,
    /// Demand beyond all eligible capacity (non-zero only when infeasible).
    pub shortfall: Decimal,
    pub allocation: Allocation,
}

impl EquilibriumResult {
    /// Whether the price is a fixed point. Callers must check this before
    /// relying on `price`.
    pub fn converged(&self) -> bool {
        self.status == ClearingStatus::Converged
    }

    /// Whether all export demand is served.
    pub fn is_clearing(&self) -> bool {
        self.status != ClearingStatus::Infeasible
    }

    pub fn exporters(&self) -> &[ExporterAllocation] {
        &self.allocation.exporters
    }

    pub fn exporter_count(&self) -> usize {
        self.allocation.exporter_count()
    }

    /// Herfindahl-Hirschman index of export shares.
    pub fn concentration(&self) -> Decimal {
        self.allocation.concentration
    }

    /// Total quantity cleared through exports.
    pub fn total_cleared(&self) -> Decimal {
        self.allocation.total_allocated
    }

    pub fn share(&self, country: &CountryId) -> Decimal {
        self.allocation
            .exporter(country)
            .map(|e| e.share)
            .unwrap_or(Decimal::ZERO)
    }

    /// Shadow value of `country`'s capacity; zero unless it binds.
    pub fn shadow_value(&self, country: &CountryId) -> Decimal {
        self.allocation
            .exporter(country)
            .and_then(|e| e.shadow_value)
            .unwrap_or(Decimal::ZERO)
    }

    /// Capacity-constrained break-even premium `c_k / p − 1` for every
    /// country in `table`: the premium above which `k` would rather
    /// produce at home than buy at the cleared price.
    pub fn break_even_premia(&self, table: &CostTable) -> Vec<(CountryId, Decimal)> {
        if self.price <= Decimal::ZERO {
            return Vec::new();
        }
        table
            .countries()
            .iter()
            .map(|c| (c.id.clone(), c.unit_cost / self.price - Decimal::ONE))
            .collect()
    }
}

impl fmt::Display for EquilibriumResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Training Market Equilibrium ===")?;
        writeln!(f, "Sovereignty premium: {}", self.sovereignty_premium)?;
        writeln!(f, "Clearing price:      {}", self.price)?;
        writeln!(f, "Status:              {} after {} iterations", self.status, self.iterations)?;
        writeln!(f, "Export demand:       {}", self.export_demand)?;
        writeln!(f, "Cleared quantity:    {}", self.total_cleared())?;
        if self.shortfall > Decimal::ZERO {
            writeln!(f, "Shortfall:           {}", self.shortfall)?;
        }
        writeln!(f, "Exporters:           {}", self.exporter_count())?;
        writeln!(f, "HHI:                 {:.4}", self.concentration())?;

        writeln!(f, "\n{:<6} {:>10} {:>16} {:>8} {:>10}", "ISO", "cost", "allocated", "share", "mu")?;
        for e in self.exporters() {
            let mu = e
                .shadow_value
                .map(|m| format!("{:.4}", m))
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                f,
                "{:<6} {:>10.4} {:>16.0} {:>7.1}% {:>10}",
                e.country,
                e.unit_cost,
                e.allocated,
                e.share * Decimal::ONE_HUNDRED,
                mu
            )?;
        }
        Ok(())
    }
}

/// Run the fixed-point iteration to completion against an arbitrary
/// demand schedule.
pub fn clear_market<D: DemandSchedule>(
    stack: &SupplyStack,
    demand: &D,
    params: &ScenarioParams,
) -> Result<EquilibriumResult, InputError> {
    let mut state = SolverState::initial(stack).ok_or(InputError::NoEligibleSupplier)?;

    let (state, status) = loop {
        match step(&state, stack, demand, params) {
            Step::Continuing(next) => state = next,
            Step::Converged(s) => break (s, ClearingStatus::Converged),
            Step::Infeasible(s) => break (s, ClearingStatus::Infeasible),
            Step::Exhausted(s) => {
                let status = if s.shortfall > Decimal::ZERO {
                    ClearingStatus::Infeasible
                } else {
                    ClearingStatus::Exhausted
                };
                break (s, status);
            }
        }
    };

    let allocation = allocate(stack, state.price, state.export_demand);

    match status {
        ClearingStatus::Converged => info!(
            "cleared at {} after {} iterations: {} exporters, HHI {:.4}",
            state.price,
            state.iteration,
            allocation.exporter_count(),
            allocation.concentration
        ),
        ClearingStatus::Exhausted => warn!(
            "no fixed point within {} iterations; last price {}",
            params.max_iterations, state.price
        ),
        ClearingStatus::Infeasible => warn!(
            "export demand {} exceeds eligible capacity by {} at price {}",
            state.export_demand, state.shortfall, state.price
        ),
    }

    Ok(EquilibriumResult {
        price: state.price,
        status,
        iterations: state.iteration,
        sovereignty_premium: params.sovereignty_premium,
        export_demand: state.export_demand,
        shortfall: state.shortfall,
        allocation,
    })
}

/// Validate inputs and clear the training market implied by `table`.
///
/// # Examples
///
/// ```
/// use flop_trade::core::cost_table::CostTable;
/// use flop_trade::core::country::CountryCost;
/// use flop_trade::core::params::ScenarioParams;
/// use flop_trade::market::equilibrium::solve_equilibrium;
/// use rust_decimal::Decimal;
/// use rust_decimal_macros::dec;
///
/// let table: CostTable = vec![
///     CountryCost::new("A", "A", dec!(1.0), dec!(100), dec!(0)),
///     CountryCost::new("B", "B", dec!(1.2), dec!(50), dec!(0)),
///     CountryCost::new("D", "Importer", dec!(5.0), dec!(0), dec!(1)).sanctioned(),
/// ]
/// .into_iter()
/// .collect();
/// let params = ScenarioParams {
///     training_share: dec!(0.5),
///     total_demand: dec!(240),
///     sovereignty_premium: Decimal::ZERO,
///     ..Default::default()
/// };
///
/// let eq = solve_equilibrium(&table, &params).unwrap();
/// assert!(eq.converged());
/// assert_eq!(eq.price, dec!(1.2));
/// assert_eq!(eq.total_cleared(), dec!(120));
/// ```
pub fn solve_equilibrium(
    table: &CostTable,
    params: &ScenarioParams,
) -> Result<EquilibriumResult, InputError> {
    params.validate()?;
    table.validate(params.weight_tolerance)?;
    let stack = SupplyStack::build(table, params.capacity_share);
    let demand = ExportDemand::new(table, params);
    clear_market(&stack, &demand, params)
}

/// Clear the market once per sovereignty premium, all else equal.
pub fn solve_for_premia(
    table: &CostTable,
    params: &ScenarioParams,
    premia: &[Decimal],
) -> Result<Vec<EquilibriumResult>, InputError> {
    premia
        .iter()
        .map(|&lambda| solve_equilibrium(table, &params.with_sovereignty_premium(lambda)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::country::CountryCost;
    use crate::market::export_demand::FixedDemand;
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

    fn stack() -> SupplyStack {
        SupplyStack::build(&abc(), Decimal::ONE)
    }

    #[test]
    fn test_initial_state_skips_excluded() {
        let state = SolverState::initial(&stack()).unwrap();
        assert_eq!(state.price, dec!(1.0));
        assert_eq!(state.iteration, 0);
    }

    #[test]
    fn test_step_converges_when_price_holds() {
        let params = ScenarioParams::default();
        let state = SolverState::initial(&stack()).unwrap();
        match step(&state, &stack(), &FixedDemand(dec!(60)), &params) {
            Step::Converged(s) => {
                assert_eq!(s.price, dec!(1.0));
                assert_eq!(s.marginal, Some(1));
                assert_eq!(s.iteration, 1);
            }
            other => panic!("expected convergence, got {:?}", other),
        }
    }

    #[test]
    fn test_step_moves_to_marginal_cost() {
        let params = ScenarioParams::default();
        let state = SolverState::initial(&stack()).unwrap();
        let next = step(&state, &stack(), &FixedDemand(dec!(120)), &params);
        assert!(matches!(next, Step::Continuing(_)));
        assert_eq!(next.state().price, dec!(1.2));
        assert_eq!(next.state().marginal, Some(2));

        let last = step(next.state(), &stack(), &FixedDemand(dec!(120)), &params);
        assert!(matches!(last, Step::Converged(_)));
    }

    #[test]
    fn test_step_zero_demand_holds_price() {
        let params = ScenarioParams::default();
        let state = SolverState::initial(&stack()).unwrap();
        let next = step(&state, &stack(), &FixedDemand(Decimal::ZERO), &params);
        assert!(matches!(next, Step::Converged(_)));
        assert_eq!(next.state().price, dec!(1.0));
        assert_eq!(next.state().marginal, None);
    }

    #[test]
    fn test_step_shortfall_then_infeasible() {
        let params = ScenarioParams::default();
        let state = SolverState::initial(&stack()).unwrap();
        let first = step(&state, &stack(), &FixedDemand(dec!(200)), &params);
        assert!(matches!(first, Step::Continuing(_)));
        assert_eq!(first.state().price, dec!(1.2));
        assert_eq!(first.state().shortfall, dec!(50));
        assert!(!first.is_terminal());

        let second = step(first.state(), &stack(), &FixedDemand(dec!(200)), &params);
        assert!(matches!(second, Step::Infeasible(_)));
        assert!(second.is_terminal());
    }

    #[test]
    fn test_step_exhausted_at_cap() {
        let params = ScenarioParams::default().with_max_iterations(1);
        let state = SolverState::initial(&stack()).unwrap();
        let next = step(&state, &stack(), &FixedDemand(dec!(120)), &params);
        assert!(matches!(next, Step::Exhausted(_)));
        assert!(next.is_terminal());
    }

    #[test]
    fn test_clear_market_first_supplier_suffices() {
        let eq = clear_market(&stack(), &FixedDemand(dec!(60)), &ScenarioParams::default()).unwrap();
        assert!(eq.converged());
        assert_eq!(eq.price, dec!(1.0));
        assert_eq!(eq.exporter_count(), 1);
        assert_eq!(eq.share(&CountryId::new("A")), Decimal::ONE);
        assert_eq!(eq.concentration(), Decimal::ONE);
        assert_eq!(eq.share(&CountryId::new("B")), Decimal::ZERO);
    }

    #[test]
    fn test_clear_market_second_supplier_marginal() {
        let eq = clear_market(&stack(), &FixedDemand(dec!(120)), &ScenarioParams::default()).unwrap();
        assert!(eq.converged());
        assert_eq!(eq.price, dec!(1.2));
        assert_eq!(eq.shadow_value(&CountryId::new("A")), dec!(0.2));
        assert_eq!(eq.shadow_value(&CountryId::new("B")), Decimal::ZERO);
        assert_eq!(eq.total_cleared(), dec!(120));
    }

    #[test]
    fn test_clear_market_infeasible_is_flagged() {
        let eq = clear_market(&stack(), &FixedDemand(dec!(500)), &ScenarioParams::default()).unwrap();
        assert_eq!(eq.status, ClearingStatus::Infeasible);
        assert!(!eq.is_clearing());
        assert!(!eq.converged());
        assert_eq!(eq.price, dec!(1.2));
        assert_eq!(eq.shortfall, dec!(350));
        assert_eq!(eq.total_cleared(), dec!(150));
    }

    #[test]
    fn test_exhausted_when_cap_too_small() {
        let params = ScenarioParams::default().with_max_iterations(1);
        let eq = clear_market(&stack(), &FixedDemand(dec!(120)), &params).unwrap();
        assert_eq!(eq.status, ClearingStatus::Exhausted);
        assert_eq!(eq.price, dec!(1.2));
        assert!(eq.is_clearing());
    }

    #[test]
    fn test_zero_total_demand() {
        let params = ScenarioParams::default().with_total_demand(Decimal::ZERO);
        let eq = solve_equilibrium(&abc(), &params).unwrap();
        assert!(eq.converged());
        assert_eq!(eq.price, dec!(1.0));
        assert_eq!(eq.exporter_count(), 0);
        assert_eq!(eq.total_cleared(), Decimal::ZERO);
    }

    #[test]
    fn test_solve_rejects_degenerate_table() {
        let table: CostTable = vec![CountryCost::new("A", "Alpha", dec!(1.0), dec!(100), dec!(0.4))]
            .into_iter()
            .collect();
        let result = solve_equilibrium(&table, &ScenarioParams::default());
        assert!(matches!(result, Err(InputError::DemandWeightSum { .. })));
    }

    fn four_tier() -> CostTable {
        vec![
            CountryCost::new("A", "Alpha", dec!(1.0), dec!(30), dec!(0.1)),
            CountryCost::new("B", "Beta", dec!(1.3), dec!(30), dec!(0.2)),
            CountryCost::new("C", "Gamma", dec!(1.6), dec!(30), dec!(0.3)),
            CountryCost::new("D", "Delta", dec!(2.0), dec!(30), dec!(0.4)),
        ]
        .into_iter()
        .collect()
    }

    fn four_tier_params() -> ScenarioParams {
        ScenarioParams {
            training_share: dec!(0.5),
            total_demand: dec!(100),
            ..Default::default()
        }
    }

    #[test]
    fn test_sovereignty_premium_never_raises_price() {
        let results =
            solve_for_premia(&four_tier(), &four_tier_params(), &[dec!(0), dec!(0.1), dec!(0.2)]).unwrap();
        assert_eq!(results.len(), 3);
        for eq in &results {
            assert!(eq.converged());
            assert_eq!(eq.export_demand, dec!(35));
        }
        for pair in results.windows(2) {
            assert!(pair[1].price <= pair[0].price);
        }
    }

    #[test]
    fn test_oscillating_demand_exhausts() {
        // At λ = 0.5 demand flips between 35 (p = 1.0) and 20 (p = 1.3).
        let params = four_tier_params().with_sovereignty_premium(dec!(0.5));
        let eq = solve_equilibrium(&four_tier(), &params).unwrap();
        assert_eq!(eq.status, ClearingStatus::Exhausted);
        assert_eq!(eq.iterations, 30);
        assert_eq!(eq.price, dec!(1.0));
        assert_eq!(eq.export_demand, dec!(20));
    }

    #[test]
    fn test_break_even_premia() {
        let eq = clear_market(&stack(), &FixedDemand(dec!(120)), &ScenarioParams::default()).unwrap();
        let premia = eq.break_even_premia(&abc());
        let b = premia.iter().find(|(c, _)| c.as_str() == "B").unwrap();
        assert_eq!(b.1, Decimal::ZERO);
        let a = premia.iter().find(|(c, _)| c.as_str() == "A").unwrap();
        assert!(a.1 < Decimal::ZERO);
    }
}
