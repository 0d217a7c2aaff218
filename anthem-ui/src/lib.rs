//! anthem-ui library interface
//!
//! Exposes the client, polling engine, stage flow and result projection
//! for the binary and for integration testing.

pub mod client;
pub mod flow;
pub mod poller;
pub mod render;

pub use client::{ClientError, GenerationClient};
pub use flow::{StageFlow, UiStage};
pub use poller::{PollEngine, PollSession, SessionManager, SessionState, StatusSource};
pub use render::ResultView;
