pub mod api;
pub mod compactor;
pub mod config;
pub mod engine;
pub mod export;
pub mod journal;
pub mod limits;
pub mod model;
pub mod observability;
pub mod wal;
