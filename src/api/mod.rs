pub mod auth;
mod error;
pub mod models;
mod server;
pub mod services;
pub mod state;
pub mod tx;
mod validation;

pub use server::{build_router, run, run_worker_only};
