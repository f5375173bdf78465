//! Port traits at the boundary between the simulator and the outside world.

pub mod market_data_port;
pub mod signal_port;
pub mod config_port;
pub mod report_port;
