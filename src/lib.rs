pub mod api;
pub mod config;
pub mod humanize;
pub mod jobspec;
pub mod observability;
pub mod queue;
pub mod runtime;
pub mod secrets;
pub mod storage;
pub mod store;
pub mod worker;
