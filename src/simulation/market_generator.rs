//! Random market generation for benchmarks and property tests.
//!
//! Countries are scattered on a plane; latency grows with distance, so
//! the generated latency table behaves like a real one (nearby countries
//! are cheap to serve, distant ones expensive).

use crate::core::country::CountryCost;
use crate::core::latency::LatencyRecord;
use crate::core::market_input::MarketInput;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Configuration for generating a random market.
#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// Number of countries.
    pub country_count: usize,
    /// Minimum unit cost.
    pub min_cost: Decimal,
    /// Maximum unit cost.
    pub max_cost: Decimal,
    /// Minimum capacity per country.
    pub min_capacity: Decimal,
    /// Maximum capacity per country.
    pub max_capacity: Decimal,
    /// Probability that a country is excluded from supply. The first
    /// country is never excluded.
    pub exclusion_rate: f64,
    /// Probability that a foreign pair has a latency measurement.
    pub latency_coverage: f64,
    /// Latency floor for any foreign pair, in ms.
    pub base_latency_ms: Decimal,
    /// Latency at the maximum distance on the plane, in ms.
    pub max_latency_ms: Decimal,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            country_count: 20,
            min_cost: dec!(0.80),
            max_cost: dec!(2.50),
            min_capacity: Decimal::from(1_000_000),
            max_capacity: Decimal::from(5_000_000_000u64),
            exclusion_rate: 0.05,
            latency_coverage: 1.0,
            base_latency_ms: dec!(2),
            max_latency_ms: dec!(300),
        }
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, min: Decimal, max: Decimal, dp: u32) -> Decimal {
    let t = Decimal::from_f64_retain(rng.gen::<f64>()).unwrap_or(Decimal::ZERO);
    (min + (max - min) * t).round_dp(dp)
}

/// Generate a valid random market: non-negative costs and capacities,
/// demand weights summing exactly to one, at least one eligible supplier.
pub fn generate_random_market<R: Rng + ?Sized>(config: &MarketConfig, rng: &mut R) -> MarketInput {
    let n = config.country_count;

    // Raw weights in [1, 100), normalized so they sum to exactly one.
    let raw: Vec<Decimal> = (0..n).map(|_| Decimal::from(rng.gen_range(1u32..100))).collect();
    let raw_total: Decimal = raw.iter().copied().sum();
    let mut weights: Vec<Decimal> = raw.iter().map(|w| (w / raw_total).round_dp(8)).collect();
    if let Some((last, rest)) = weights.split_last_mut() {
        let rest_total: Decimal = rest.iter().copied().sum();
        *last = (Decimal::ONE - rest_total).max(Decimal::ZERO);
    }

    let countries: Vec<CountryCost> = weights
        .into_iter()
        .enumerate()
        .map(|(i, weight)| {
            let country = CountryCost::new(
                format!("C{:03}", i),
                format!("Country {}", i),
                uniform(rng, config.min_cost, config.max_cost, 4),
                uniform(rng, config.min_capacity, config.max_capacity, 0),
                weight,
            );
            if i > 0 && rng.gen_bool(config.exclusion_rate) {
                country.sanctioned()
            } else {
                country
            }
        })
        .collect();

    let positions: Vec<(f64, f64)> = (0..n).map(|_| (rng.gen(), rng.gen())).collect();
    let max_distance = 2f64.sqrt();
    let mut latencies = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            if !rng.gen_bool(config.latency_coverage) {
                continue;
            }
            let (xi, yi) = positions[i];
            let (xj, yj) = positions[j];
            let distance = ((xi - xj).powi(2) + (yi - yj).powi(2)).sqrt() / max_distance;
            let spread = config.max_latency_ms - config.base_latency_ms;
            let scaled = Decimal::from_f64_retain(distance).unwrap_or(Decimal::ZERO);
            latencies.push(LatencyRecord::new(
                countries[i].id.as_str(),
                countries[j].id.as_str(),
                (config.base_latency_ms + spread * scaled).round_dp(1),
            ));
        }
    }

    MarketInput {
        countries,
        latencies,
    }
}
