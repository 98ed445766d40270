pub mod allocation;
pub mod equilibrium;
pub mod export_demand;
pub mod supply_stack;
