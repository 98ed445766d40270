//! Clearing a small regional compute market.
//!
//! Shows the training equilibrium, the bilateral inference sourcing, and
//! the welfare cost of a 10% sovereignty premium.

use flop_trade::prelude::*;
use rust_decimal_macros::dec;

fn main() {
    println!("╔══════════════════════════════════════════╗");
    println!("║   flop-trade: Regional Market Example    ║");
    println!("╚══════════════════════════════════════════╝\n");

    let table: CostTable = vec![
        CountryCost::new("ISL", "Iceland", dec!(1.00), dec!(30), dec!(0.05)),
        CountryCost::new("NOR", "Norway", dec!(1.05), dec!(60), dec!(0.10)),
        CountryCost::new("IRN", "Iran", dec!(0.80), dec!(100), dec!(0.05)).sanctioned(),
        CountryCost::new("USA", "United States", dec!(1.40), dec!(60), dec!(0.40)),
        CountryCost::new("DEU", "Germany", dec!(1.60), dec!(20), dec!(0.25)),
        CountryCost::new("JPN", "Japan", dec!(1.70), dec!(20), dec!(0.15)),
    ]
    .into_iter()
    .collect();

    let latency = match LatencyTable::from_records(
        &[
            LatencyRecord::new("ISL", "NOR", dec!(20)),
            LatencyRecord::new("ISL", "USA", dec!(40)),
            LatencyRecord::new("ISL", "DEU", dec!(30)),
            LatencyRecord::new("NOR", "DEU", dec!(15)),
            LatencyRecord::new("USA", "JPN", dec!(120)),
            LatencyRecord::new("DEU", "JPN", dec!(200)),
            LatencyRecord::new("IRN", "DEU", dec!(80)),
        ],
    ) {
        Ok(latency) => latency,
        Err(e) => {
            eprintln!("bad latency data: {}", e);
            return;
        }
    };

    let params = ScenarioParams {
        training_share: dec!(0.5),
        total_demand: dec!(200),
        ..Default::default()
    };

    // --- Training: capacity-constrained clearing ---
    println!("━━━ Training Market ━━━\n");
    match solve_equilibrium(&table, &params) {
        Ok(eq) => println!("{}", eq),
        Err(e) => eprintln!("cannot clear: {}", e),
    }

    // --- Inference: latency-adjusted sourcing ---
    println!("━━━ Inference Sourcing ━━━\n");
    let report = match source_all(&table, &latency, &params) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("cannot source: {}", e);
            return;
        }
    };
    println!("{}", report);
    println!("Regimes with a {} sovereignty premium:", params.sovereignty_premium);
    print!("{}", RegimeSummary::from_report(&report, true));
    println!();

    println!("{}", RevenueShares::from_report(&report, &table, true));
    println!("{}", WelfareReport::compute(&table, &report));
}
