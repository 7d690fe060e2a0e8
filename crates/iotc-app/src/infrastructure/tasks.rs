pub mod ota;
pub mod publish;
pub mod retrain;
