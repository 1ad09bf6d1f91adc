pub mod catalog;
pub mod codec;
pub mod compactor;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod driver;
pub mod handlers;
pub mod model;
pub mod observability;
pub mod repository;
pub mod store;
pub mod wal;
