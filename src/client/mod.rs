//! Remote generation clients.

mod provider;
pub mod providers;
mod types;

pub use provider::GenerationClient;
pub use types::{ClientKind, GenerationRequest};
