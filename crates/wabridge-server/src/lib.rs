pub mod bridge;
pub mod config;
pub mod dispatcher;
pub mod encoder;
pub mod error;
pub mod filter;
pub mod lifecycle;
pub mod pump;

pub use bridge::{run_bridge, BridgeExit, ExitReason};
pub use config::{BridgeConfig, DEFAULT_READY_MESSAGE};
pub use error::BridgeError;
pub use lifecycle::{BridgeContext, BridgeState, DestroyOutcome, LifecycleController, ShutdownReport};
