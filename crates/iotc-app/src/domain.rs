pub mod detection;
pub mod ports;
pub mod tunables;
