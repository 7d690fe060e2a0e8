pub mod buffers;
pub mod retrain;
pub mod tasks;
pub mod telemetry;
