//! Room engine: membership, sessions, permissions, read state, threads,
//! bans, federation invitations and scheduled messages.
//!
//! Every mutation goes through [`RoomCoordinator`], which runs each
//! multi-row operation inside one store transaction.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod notifier;
pub mod read_marker;
pub mod sweeper;
pub mod token;

pub use config::CoreConfig;
pub use coordinator::RoomCoordinator;
pub use error::{CoreError, CoreResult, Entity};
pub use notifier::{Notifier, PollOutcome, RoomActivity};
