//! flop-trade CLI
//!
//! Clear compute markets and run sourcing analysis from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Clear the training market
//! flop-trade equilibrium --input market.json
//!
//! # Override the sovereignty premium and print JSON
//! flop-trade equilibrium --input market.json --lambda 0.2 --format json
//!
//! # Per-country sourcing and regimes
//! flop-trade sourcing --input market.json --params scenario.toml
//!
//! # Standard sensitivity sweep
//! flop-trade sweep --input market.json
//!
//! # Generate a random market for testing
//! flop-trade generate --countries 40 --seed 7 --output market.json
//! ```

use flop_trade::analysis::metrics::break_even_premium;
use flop_trade::analysis::sensitivity::{run_sweep, standard_scenarios};
use flop_trade::analysis::welfare::{Counterfactual, WelfareReport};
use flop_trade::core::cost_table::CostTable;
use flop_trade::core::latency::LatencyTable;
use flop_trade::core::market_input::MarketInput;
use flop_trade::core::params::ScenarioParams;
use flop_trade::market::equilibrium::solve_equilibrium;
use flop_trade::simulation::market_generator::{generate_random_market, MarketConfig};
use flop_trade::sourcing::bilateral::source_all;
use flop_trade::sourcing::regime::RegimeSummary;
use flop_trade::sourcing::revenue::RevenueShares;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fs;
use std::process;

fn print_usage() {
    eprintln!(
        r#"flop-trade — capacity-constrained compute trade equilibrium

USAGE:
    flop-trade <COMMAND> [OPTIONS]

COMMANDS:
    equilibrium Clear the training market
    sourcing    Assign every demand center its cheapest supplier
    sweep       Run the standard sensitivity scenarios
    generate    Generate a random market (for testing)
    help        Show this message

OPTIONS (equilibrium, sourcing, sweep):
    --input <FILE>      Path to JSON market file
    --params <FILE>     Scenario parameters (.toml or .json)
    --lambda <X>        Override the sovereignty premium
    --format <FORMAT>   Output format: text (default) or json

OPTIONS (generate):
    --countries <N>     Number of countries (default: 20)
    --seed <S>          RNG seed (default: random)
    --output <FILE>     Write to file instead of stdout

LOGGING:
    RUST_LOG=debug      Trace solver iterations

EXAMPLES:
    flop-trade equilibrium --input market.json
    flop-trade equilibrium --input market.json --lambda 0.2 --format json
    flop-trade sourcing --input market.json --params scenario.toml
    flop-trade sweep --input market.json --format json
    flop-trade generate --countries 40 --seed 7 --output market.json"#
    );
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// Options shared by the analysis commands.
struct RunOptions {
    input: String,
    params: ScenarioParams,
    json: bool,
}

fn parse_run_options(args: &[String]) -> RunOptions {
    let mut input_path = None;
    let mut params_path: Option<String> = None;
    let mut lambda: Option<Decimal> = None;
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input_path = Some(
                    args.get(i)
                        .cloned()
                        .unwrap_or_else(|| fail("--input requires a file path")),
                );
            }
            "--params" => {
                i += 1;
                params_path = Some(
                    args.get(i)
                        .cloned()
                        .unwrap_or_else(|| fail("--params requires a file path")),
                );
            }
            "--lambda" => {
                i += 1;
                lambda = Some(
                    args.get(i)
                        .and_then(|s| s.parse().ok())
                        .unwrap_or_else(|| fail("--lambda requires a decimal number")),
                );
            }
            "--format" => {
                i += 1;
                format = args
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| fail("--format requires 'text' or 'json'"));
            }
            _ => fail(format!("unknown option: {}", args[i])),
        }
        i += 1;
    }

    let input = input_path.unwrap_or_else(|| fail("--input <FILE> is required"));
    let mut params = match params_path {
        Some(path) => ScenarioParams::load(&path)
            .unwrap_or_else(|e| fail(format!("loading parameters from '{}': {}", path, e))),
        None => ScenarioParams::default(),
    };
    if let Some(lambda) = lambda {
        params = params.with_sovereignty_premium(lambda);
    }

    RunOptions {
        input,
        params,
        json: format == "json",
    }
}

fn load_market(options: &RunOptions) -> (CostTable, LatencyTable) {
    let market = MarketInput::load(&options.input).unwrap_or_else(|e| {
        eprintln!("Expected format:");
        eprintln!(
            r#"{{
  "countries": [
    {{ "id": "ISL", "name": "Iceland", "unit_cost": "1.10", "capacity": "1000000", "demand_weight": "0.4" }}
  ],
  "latencies": [
    {{ "source": "ISL", "destination": "GBR", "latency_ms": "28" }}
  ]
}}"#
        );
        fail(e)
    });
    let latency = market.latency_table().unwrap_or_else(|e| fail(e));
    (market.cost_table(), latency)
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => fail(e),
    }
}

fn cmd_equilibrium(args: &[String]) {
    let options = parse_run_options(args);
    let (table, _) = load_market(&options);
    let result = solve_equilibrium(&table, &options.params).unwrap_or_else(|e| fail(e));

    if options.json {
        print_json(&result);
        return;
    }

    println!("{}", result);
    if !result.is_clearing() {
        println!("WARNING: export demand exceeds all eligible capacity; the price does not clear.");
    }

    println!("Break-even premium (lambda*), cheapest ten:");
    let mut premia = break_even_premium(&table);
    premia.sort_by(|a, b| a.1.cmp(&b.1));
    for (country, lambda) in premia.iter().take(10) {
        println!("  {:<6} {:>8.4}", country, lambda);
    }
}

fn cmd_sourcing(args: &[String]) {
    let options = parse_run_options(args);
    let (table, latency) = load_market(&options);
    let report = source_all(&table, &latency, &options.params).unwrap_or_else(|e| fail(e));
    let revenue = RevenueShares::from_report(&report, &table, true);
    let welfare = WelfareReport::compute(&table, &report);
    let counterfactual = Counterfactual::compute(
        &table,
        options.params.sovereignty_premium,
        options.params.sovereignty_premium * dec!(2),
    );

    if options.json {
        #[derive(serde::Serialize)]
        struct SourcingOutput<'a> {
            report: &'a flop_trade::sourcing::bilateral::SourcingReport,
            revenue: &'a RevenueShares,
            welfare: &'a WelfareReport,
            counterfactual: &'a Counterfactual,
        }
        print_json(&SourcingOutput {
            report: &report,
            revenue: &revenue,
            welfare: &welfare,
            counterfactual: &counterfactual,
        });
        return;
    }

    println!("{}", report);
    println!("Regimes without sovereignty premium:");
    print!("{}", RegimeSummary::from_report(&report, false));
    println!("Regimes with sovereignty premium {}:", options.params.sovereignty_premium);
    print!("{}", RegimeSummary::from_report(&report, true));
    println!();
    println!("{}", revenue);
    println!("{}", welfare);
    println!(
        "Raising the premium from {} to {} keeps {} more countries domestic; importing demand share {} -> {}",
        counterfactual.base.threshold,
        counterfactual.alternative.threshold,
        counterfactual.additional_domestic(),
        counterfactual.base.importing_share.round_dp(4),
        counterfactual.alternative.importing_share.round_dp(4)
    );
}

fn cmd_sweep(args: &[String]) {
    let options = parse_run_options(args);
    let (table, latency) = load_market(&options);
    let scenarios = standard_scenarios(&options.params);
    let report = run_sweep(&table, &latency, &options.params, &scenarios);

    if options.json {
        print_json(&report);
    } else {
        println!("{}", report);
    }
    if report.failed().next().is_some() {
        process::exit(2);
    }
}

fn cmd_generate(args: &[String]) {
    let mut countries = 20usize;
    let mut seed: Option<u64> = None;
    let mut output_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--countries" => {
                i += 1;
                countries = args
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| fail("--countries requires a number"));
            }
            "--seed" => {
                i += 1;
                seed = Some(
                    args.get(i)
                        .and_then(|s| s.parse().ok())
                        .unwrap_or_else(|| fail("--seed requires a number")),
                );
            }
            "--output" => {
                i += 1;
                output_path = Some(
                    args.get(i)
                        .cloned()
                        .unwrap_or_else(|| fail("--output requires a file path")),
                );
            }
            _ => fail(format!("unknown option: {}", args[i])),
        }
        i += 1;
    }
    if countries == 0 {
        fail("--countries must be at least 1");
    }

    let config = MarketConfig {
        country_count: countries,
        ..Default::default()
    };
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let market = generate_random_market(&config, &mut rng);
    let json = market.to_json_pretty().unwrap_or_else(|e| fail(e));

    if let Some(path) = output_path {
        fs::write(&path, &json).unwrap_or_else(|e| fail(format!("writing to '{}': {}", path, e)));
        eprintln!(
            "Generated {} countries with {} latency pairs → {}",
            market.countries.len(),
            market.latencies.len(),
            path
        );
    } else {
        println!("{}", json);
    }
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "equilibrium" => cmd_equilibrium(rest),
        "sourcing" => cmd_sourcing(rest),
        "sweep" => cmd_sweep(rest),
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
