pub mod analysis;
pub mod config;
pub mod error;
pub mod indicator;
pub mod model;
pub mod signal;
pub mod snapshot;
pub mod source;
pub mod storage;
pub mod timeframe;
