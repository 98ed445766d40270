pub mod cost_table;
pub mod country;
pub mod latency;
pub mod market_input;
pub mod params;
