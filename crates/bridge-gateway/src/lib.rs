pub mod admission;
pub mod auth;
pub mod capability;
pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod errors;
pub mod rest;
pub mod router;
pub mod rpc;
pub mod state;
pub mod ws;

pub use config::{Args, Config};
pub use router::build_router;
pub use state::{AppState, SharedState};
