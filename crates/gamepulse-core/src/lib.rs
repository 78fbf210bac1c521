//! # GamePulse
//!
//! Conversational analytics over gaming data APIs.
//!
//! GamePulse answers free-text questions ("top games on Twitch", "what do
//! Elden Ring players also play?") by routing them to a metric of one of
//! several third-party sources, retrieving and normalizing the data, and
//! phrasing a ranked answer with a chart specification.
//!
//! ## Architecture
//!
//! - **Routing**: registry phrase scoring or keyword intent parsing
//! - **Sources**: Steam, Twitch, RAWG, SteamSpy and Gamalytic behind one
//!   guarded client trait (circuit breaker, rate limit, timeout)
//! - **Retriever**: payload normalization into `{name, value}` tables
//! - **Respond**: text summaries, attribution and chart specs
//! - **Usage**: monthly per-API call counters
//! - **Agent**: tool-calling conversation over an OpenAI-compatible model
//!
//! ## Quick Start
//!
//! ```bash
//! # One-shot question
//! gamepulse ask "What are the top games on Twitch?"
//!
//! # Interactive session
//! gamepulse chat
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod agent;
pub mod config;
pub mod error;
pub mod models;
pub mod respond;
pub mod retriever;
pub mod routing;
pub mod sources;
pub mod usage;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::agent::{ChatAgent, NluBackend, OpenAiBackend};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::respond::{Assistant, Response};
    pub use crate::retriever::Retriever;
    pub use crate::routing::{Registry, Router};
    pub use crate::sources::{SourceClient, SourceSet};
    pub use crate::usage::UsageTracker;
}
