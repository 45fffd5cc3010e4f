pub mod comm;
pub mod config;
pub mod core;
pub mod events;
pub mod process;
pub mod reactor;
pub mod service;

pub use comm::Comm;
pub use config::EngineConfig;
pub use core::{Core, CoreRef};
pub use events::EngineEvent;
pub use process::engine_process;
pub use service::{EngineHandle, EngineMessage, make_engine_channel};
