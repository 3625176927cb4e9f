pub mod relay;
pub mod types;

pub use relay::{AgentRelay, RelayError};
pub use types::*;
