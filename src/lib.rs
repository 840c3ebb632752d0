pub mod adjustments;
pub mod backtest;
pub mod calibration;
pub mod cli;
pub mod compare;
pub mod config;
pub mod dataset;
pub mod error;
pub mod export;
pub mod logging;
pub mod model;
pub mod parallel;
pub mod projection;
pub mod rating;
pub mod situational;
pub mod storage;

pub use error::EngineError;
