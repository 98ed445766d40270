pub mod metrics;
pub mod sensitivity;
pub mod welfare;
