//! How the training market responds to the sovereignty premium.
//!
//! Clears a generated market at a ladder of premia, then runs the
//! standard sensitivity scenarios with one deliberately broken scenario
//! to show that a failure does not stop the sweep.

use flop_trade::market::equilibrium::solve_for_premia;
use flop_trade::prelude::*;
use flop_trade::simulation::market_generator::{generate_random_market, MarketConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal_macros::dec;

fn main() {
    println!("╔══════════════════════════════════════════╗");
    println!("║   flop-trade: Sovereignty Premium Sweep  ║");
    println!("╚══════════════════════════════════════════╝\n");

    let config = MarketConfig {
        country_count: 30,
        ..Default::default()
    };
    let market = generate_random_market(&config, &mut StdRng::seed_from_u64(2024));
    let table = market.cost_table();
    let params = ScenarioParams::default();

    println!("━━━ Premium Ladder ━━━\n");
    let premia = [dec!(0), dec!(0.05), dec!(0.10), dec!(0.20), dec!(0.40)];
    match solve_for_premia(&table, &params, &premia) {
        Ok(results) => {
            println!("{:>8} {:>10} {:>10} {:>8} {}", "lambda", "price", "exporters", "HHI", "status");
            for eq in &results {
                println!(
                    "{:>8} {:>10.4} {:>10} {:>8.4} {}",
                    eq.sovereignty_premium,
                    eq.price,
                    eq.exporter_count(),
                    eq.concentration(),
                    eq.status
                );
            }
        }
        Err(e) => eprintln!("cannot clear: {}", e),
    }

    println!("\n━━━ Sensitivity Scenarios ━━━\n");
    let latency = match market.latency_table() {
        Ok(latency) => latency,
        Err(e) => {
            eprintln!("bad latency data: {}", e);
            return;
        }
    };
    let mut scenarios = standard_scenarios(&params);
    scenarios.push(
        Scenario::new("Sanction a country that does not exist")
            .with_adjustment(CostAdjustment::Exclude(CountryId::new("XXX"))),
    );
    let report = run_sweep(&table, &latency, &params, &scenarios);
    println!("{}", report);
}
