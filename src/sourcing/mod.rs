pub mod bilateral;
pub mod regime;
pub mod revenue;
