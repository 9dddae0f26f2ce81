//! Game core for emoguess.
//!
//! - `state`: derives a player's view of a game from stored rows
//! - `turn`: guess evaluation, scoring and turn advance
//! - `presence`: join, capacity and idle-kick rules
//! - `service`: the `GameService` facade used by the HTTP layer
//!
//! Storage is reached only through the traits in `repo`.

pub mod config;
pub mod error;
pub mod memory;
pub mod nickname;
pub mod presence;
pub mod repo;
pub mod service;
pub mod state;
pub mod turn;

pub use config::GameConfig;
pub use error::{GameError, Result};
pub use service::GameService;
