use flop_trade::analysis::metrics::break_even_premium;
use flop_trade::analysis::sensitivity::{run_sweep, standard_scenarios, ScenarioOutcome};
use flop_trade::analysis::welfare::WelfareReport;
use flop_trade::core::cost_table::{CostAdjustment, CostTable, InputError};
use flop_trade::core::country::{CountryCost, CountryId};
use flop_trade::core::latency::{LatencyRecord, LatencyTable};
use flop_trade::core::market_input::MarketInput;
use flop_trade::core::params::ScenarioParams;
use flop_trade::market::equilibrium::{solve_equilibrium, ClearingStatus};
use flop_trade::sourcing::bilateral::source_all;
use flop_trade::sourcing::regime::{regime_changes, Regime, RegimeSummary};
use flop_trade::sourcing::revenue::RevenueShares;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn id(s: &str) -> CountryId {
    CountryId::new(s)
}

/// Six-country market: two cheap northern suppliers, a sanctioned
/// low-cost producer, and three expensive importers.
fn regional_market() -> (CostTable, LatencyTable) {
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

    let latency = LatencyTable::from_records(
        &[
            LatencyRecord::new("ISL", "NOR", dec!(20)),
            LatencyRecord::new("ISL", "USA", dec!(40)),
            LatencyRecord::new("ISL", "DEU", dec!(30)),
            LatencyRecord::new("NOR", "DEU", dec!(15)),
            LatencyRecord::new("USA", "JPN", dec!(120)),
            LatencyRecord::new("DEU", "JPN", dec!(200)),
            LatencyRecord::new("IRN", "DEU", dec!(80)),
        ],
    )
    .unwrap();
    (table, latency)
}

fn regional_params() -> ScenarioParams {
    ScenarioParams {
        training_share: dec!(0.5),
        total_demand: dec!(200),
        ..Default::default()
    }
}

/// Full pipeline: cost table → equilibrium → sourcing → revenue → welfare.
#[test]
fn full_pipeline_regional_market() {
    let (table, latency) = regional_market();
    let params = regional_params();

    // USA, DEU and JPN import: 100 * (0.40 + 0.25 + 0.15) = 80.
    let eq = solve_equilibrium(&table, &params).unwrap();
    assert_eq!(eq.status, ClearingStatus::Converged);
    assert_eq!(eq.iterations, 2);
    assert_eq!(eq.export_demand, dec!(80));
    assert_eq!(eq.price, dec!(1.05));
    assert_eq!(eq.exporter_count(), 2);
    assert_eq!(eq.share(&id("ISL")), dec!(0.375));
    assert_eq!(eq.share(&id("NOR")), dec!(0.625));
    assert_eq!(eq.concentration(), dec!(0.53125));
    assert_eq!(eq.shadow_value(&id("ISL")), dec!(0.05));
    assert_eq!(eq.shadow_value(&id("NOR")), Decimal::ZERO);
    assert_eq!(eq.share(&id("IRN")), Decimal::ZERO);

    let report = source_all(&table, &latency, &params).unwrap();
    assert_eq!(report.len(), 6);

    let deu = report.record(&id("DEU")).unwrap();
    assert_eq!(deu.best_source, id("ISL"));
    assert_eq!(deu.best_delivered_cost, dec!(1.024));

    let jpn = report.record(&id("JPN")).unwrap();
    assert_eq!(jpn.best_source, id("USA"));
    assert_eq!(jpn.best_delivered_cost, dec!(1.5344));
    assert_eq!(jpn.sovereign_regime, Regime::FullImport);

    // The sanctioned producer still supplies itself.
    let irn = report.record(&id("IRN")).unwrap();
    assert_eq!(irn.best_source, id("IRN"));
    assert_eq!(irn.regime, Regime::FullDomestic);

    let nor = report.record(&id("NOR")).unwrap();
    assert_eq!(nor.regime, Regime::FullImport);
    assert_eq!(nor.sovereign_regime, Regime::FullDomestic);

    let plain = RegimeSummary::from_report(&report, false);
    assert_eq!(plain.count(Regime::FullDomestic), 2);
    assert_eq!(plain.count(Regime::FullImport), 4);
    let sovereign = RegimeSummary::from_report(&report, true);
    assert_eq!(sovereign.count(Regime::FullDomestic), 3);
    assert_eq!(sovereign.count(Regime::FullImport), 3);
    assert_eq!(sovereign.total(), 6);

    let revenue = RevenueShares::from_report(&report, &table, true);
    assert_eq!(revenue.training_share(&id("ISL")), dec!(0.85));
    assert_eq!(revenue.training[0].hub_count, 3);
    assert_eq!(revenue.inference_share(&id("ISL")), dec!(0.70));
    assert_eq!(revenue.inference_share(&id("USA")), dec!(0.15));
    let inference_total: Decimal = revenue.inference.iter().map(|s| s.share).sum();
    assert_eq!(inference_total, Decimal::ONE);

    let welfare = WelfareReport::compute(&table, &report);
    // NOR 0.10*0.05 + USA 0.40*0.40 + DEU 0.25*0.60 + JPN 0.15*0.70
    assert_eq!(welfare.training, dec!(0.42));
    assert!(welfare.inference > Decimal::ZERO);
    assert!(welfare.percent_of_spending() > 0.0);
}

#[test]
fn first_supplier_suffices() {
    let table: CostTable = vec![
        CountryCost::new("A", "A", dec!(1.0), dec!(100), dec!(0)),
        CountryCost::new("B", "B", dec!(1.2), dec!(50), dec!(0)),
        CountryCost::new("C", "C", dec!(0.9), dec!(10), dec!(0)).sanctioned(),
        CountryCost::new("D", "Importer", dec!(5.0), dec!(0), dec!(1)).sanctioned(),
    ]
    .into_iter()
    .collect();
    let params = ScenarioParams {
        training_share: dec!(0.5),
        total_demand: dec!(120),
        sovereignty_premium: Decimal::ZERO,
        ..Default::default()
    };

    let eq = solve_equilibrium(&table, &params).unwrap();
    assert!(eq.converged());
    assert_eq!(eq.price, dec!(1.0));
    let a = eq.allocation.exporter(&id("A")).unwrap();
    assert_eq!(a.allocated, dec!(60));
    assert_eq!(a.share, Decimal::ONE);
    assert_eq!(eq.concentration(), Decimal::ONE);
    assert!(eq.allocation.exporter(&id("B")).is_none());
}

#[test]
fn second_supplier_sets_price() {
    let table: CostTable = vec![
        CountryCost::new("A", "A", dec!(1.0), dec!(100), dec!(0)),
        CountryCost::new("B", "B", dec!(1.2), dec!(50), dec!(0)),
        CountryCost::new("C", "C", dec!(0.9), dec!(10), dec!(0)).sanctioned(),
        CountryCost::new("D", "Importer", dec!(5.0), dec!(0), dec!(1)).sanctioned(),
    ]
    .into_iter()
    .collect();
    let params = ScenarioParams {
        training_share: dec!(0.5),
        total_demand: dec!(240),
        sovereignty_premium: Decimal::ZERO,
        ..Default::default()
    };

    let eq = solve_equilibrium(&table, &params).unwrap();
    assert!(eq.converged());
    assert_eq!(eq.price, dec!(1.2));
    assert_eq!(eq.allocation.exporter(&id("A")).unwrap().allocated, dec!(100));
    assert_eq!(eq.shadow_value(&id("A")), dec!(0.2));
    assert_eq!(eq.allocation.exporter(&id("B")).unwrap().allocated, dec!(20));
    assert_eq!(eq.shadow_value(&id("B")), Decimal::ZERO);

    // Doubling demand again exceeds the 150 units of eligible capacity.
    let eq = solve_equilibrium(&table, &params.with_total_demand(dec!(480))).unwrap();
    assert_eq!(eq.status, ClearingStatus::Infeasible);
    assert!(!eq.is_clearing());
    assert_eq!(eq.price, dec!(1.2));
    assert_eq!(eq.shortfall, dec!(90));
}

#[test]
fn degenerate_inputs_fail_fast() {
    let all_excluded: CostTable = vec![
        CountryCost::new("A", "A", dec!(1.0), dec!(100), dec!(0.5)).sanctioned(),
        CountryCost::new("B", "B", dec!(1.2), dec!(50), dec!(0.5)).sanctioned(),
    ]
    .into_iter()
    .collect();
    assert_eq!(
        solve_equilibrium(&all_excluded, &ScenarioParams::default()).unwrap_err(),
        InputError::NoEligibleSupplier
    );

    let negative_capacity: CostTable =
        vec![CountryCost::new("A", "A", dec!(1.0), dec!(-1), dec!(1))]
            .into_iter()
            .collect();
    assert!(matches!(
        solve_equilibrium(&negative_capacity, &ScenarioParams::default()),
        Err(InputError::NegativeCapacity { .. })
    ));

    assert_eq!(
        solve_equilibrium(&CostTable::new(), &ScenarioParams::default()).unwrap_err(),
        InputError::EmptyTable
    );
}

#[test]
fn cost_recovery_adjustment_changes_regimes() {
    let (table, latency) = regional_market();
    let params = regional_params();
    let before = source_all(&table, &latency, &params).unwrap();

    let adjusted = table
        .adjusted(&[CostAdjustment::Override {
            country: id("ISL"),
            unit_cost: dec!(1.30),
        }])
        .unwrap();
    let after = source_all(&adjusted, &latency, &params).unwrap();

    let changes = regime_changes(&before, &after, true);
    assert_eq!(
        changes,
        vec![
            (id("ISL"), Regime::FullDomestic, Regime::FullImport),
            (id("USA"), Regime::FullImport, Regime::ImportTrainingBuildInference),
        ]
    );
    // The shared table is untouched.
    assert_eq!(table.get(&id("ISL")).unwrap().unit_cost, dec!(1.00));
}

#[test]
fn sweep_over_regional_market() {
    let (table, latency) = regional_market();
    let params = regional_params();
    let mut scenarios = standard_scenarios(&params);
    scenarios.push(
        flop_trade::analysis::sensitivity::Scenario::new("Sanction unknown")
            .with_adjustment(CostAdjustment::Exclude(id("XXX"))),
    );

    let report = run_sweep(&table, &latency, &params, &scenarios);
    assert_eq!(report.outcomes.len(), 7);
    assert_eq!(report.completed().count(), 6);
    assert_eq!(report.failed().count(), 1);

    match report.outcome("Baseline") {
        Some(ScenarioOutcome::Completed(s)) => {
            assert_eq!(s.price, dec!(1.05));
            assert_eq!(s.top[0], id("IRN"));
        }
        other => panic!("unexpected baseline outcome {:?}", other),
    }
}

#[test]
fn break_even_premium_ranks_importers() {
    let (table, _) = regional_market();
    let premia = break_even_premium(&table);
    let jpn = premia.iter().find(|(c, _)| c == &id("JPN")).unwrap();
    assert_eq!(jpn.1, dec!(0.70));
    let isl = premia.iter().find(|(c, _)| c == &id("ISL")).unwrap();
    // NOR is the cheapest eligible foreign supplier for ISL.
    assert!(isl.1 < Decimal::ZERO);
}

#[test]
fn market_file_round_trip() {
    let input = MarketInput {
        countries: vec![
            CountryCost::new("X", "X", dec!(1.0), dec!(10), dec!(0.5)),
            CountryCost::new("Y", "Y", dec!(1.1), dec!(10), dec!(0.5)),
        ],
        latencies: vec![LatencyRecord::new("X", "Y", dec!(50))],
    };
    let path = std::env::temp_dir().join(format!("flop-trade-market-{}.json", std::process::id()));
    std::fs::write(&path, input.to_json_pretty().unwrap()).unwrap();

    let loaded = MarketInput::load(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(loaded, input);

    let params = ScenarioParams::default().with_sovereignty_premium(Decimal::ZERO);
    let report = source_all(
        &loaded.cost_table(),
        &loaded.latency_table().unwrap(),
        &params,
    )
    .unwrap();
    let y = report.record(&id("Y")).unwrap();
    assert_eq!(y.best_source, id("X"));
    assert_eq!(y.best_delivered_cost, dec!(1.04));
    assert_eq!(y.domestic_delivered_cost, dec!(1.1044));
}

#[test]
fn params_file_overrides_defaults() {
    let path = std::env::temp_dir().join(format!("flop-trade-params-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        "sovereignty_premium = \"0.20\"\ntotal_demand = \"200\"\n",
    )
    .unwrap();
    let params = ScenarioParams::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(params.sovereignty_premium, dec!(0.20));
    assert_eq!(params.total_demand, dec!(200));
    assert_eq!(params.latency_penalty, dec!(0.0008));
}
