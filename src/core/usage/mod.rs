pub mod aggregator;
pub mod discovery;
pub mod error;
pub mod event;
pub mod horizons;
pub mod refresh;
pub mod tailer;
