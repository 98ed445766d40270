pub mod market_generator;
