use crate::core::cost_table::CostTable;
use crate::core::country::CountryId;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Herfindahl-Hirschman index: the sum of squared shares.
///
/// Lies in `[1/n, 1]` for `n` shares that sum to one. An empty set of
/// shares has index zero.
pub fn herfindahl(shares: impl IntoIterator<Item = Decimal>) -> Decimal {
    shares.into_iter().map(|s| s * s).sum()
}

/// Decimal to `f64` for presentation-only ratios.
pub(crate) fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// 1-based fractional ranks of `values`; tied values share the mean of the
/// ranks they span.
fn fractional_ranks(values: &[Decimal]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end hold ranks start+1..=end.
        let mean = (start + end + 1) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = mean;
        }
        start = end;
    }
    ranks
}

fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        cov += (a - mean_x) * (b - mean_y);
        var_x += (a - mean_x).powi(2);
        var_y += (b - mean_y).powi(2);
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Spearman rank correlation between two cost tables over the countries
/// they share.
///
/// Returns `None` with fewer than two common countries or when either
/// side has no variation.
pub fn spearman_rho(a: &CostTable, b: &CostTable) -> Option<f64> {
    let other: HashMap<&CountryId, Decimal> =
        b.countries().iter().map(|c| (&c.id, c.unit_cost)).collect();
    let (left, right): (Vec<Decimal>, Vec<Decimal>) = a
        .countries()
        .iter()
        .filter_map(|c| other.get(&c.id).map(|&cost| (c.unit_cost, cost)))
        .unzip();
    if left.len() < 2 {
        return None;
    }
    pearson(&fractional_ranks(&left), &fractional_ranks(&right))
}

/// The `n` cheapest countries, cheapest first.
pub fn top_n(table: &CostTable, n: usize) -> Vec<CountryId> {
    table
        .ranked()
        .into_iter()
        .take(n)
        .map(|c| c.id.clone())
        .collect()
}

/// Break-even sovereignty premium for every country against the cheapest
/// eligible foreign supplier: `λ*_k = c_k / min_{j≠k} c_j − 1`.
///
/// A country with a non-positive value is cheaper than any foreign
/// supplier and builds at any premium; a country is indifferent between
/// building and importing exactly at its premium. Countries without an
/// eligible foreign supplier, or whose cheapest foreign supplier is free,
/// are omitted.
///
/// # Examples
///
/// ```
/// use flop_trade::analysis::metrics::break_even_premium;
/// use flop_trade::core::cost_table::CostTable;
/// use flop_trade::core::country::CountryCost;
/// use rust_decimal_macros::dec;
///
/// let table: CostTable = vec![
///     CountryCost::new("X", "X", dec!(1.0), dec!(10), dec!(0.5)),
///     CountryCost::new("Y", "Y", dec!(1.25), dec!(10), dec!(0.5)),
/// ]
/// .into_iter()
/// .collect();
///
/// let premia = break_even_premium(&table);
/// assert_eq!(premia[1].1, dec!(0.25));
/// assert_eq!(premia[0].1, dec!(-0.2));
/// ```
pub fn break_even_premium(table: &CostTable) -> Vec<(CountryId, Decimal)> {
    table
        .countries()
        .iter()
        .filter_map(|k| {
            let best_foreign = table
                .eligible_suppliers()
                .filter(|j| j.id != k.id)
                .map(|j| j.unit_cost)
                .min()?;
            if best_foreign <= Decimal::ZERO {
                return None;
            }
            Some((k.id.clone(), k.unit_cost / best_foreign - Decimal::ONE))
        })
        .collect()
}
