//! Per-table queries.
//!
//! Everything here is a free function over `&Connection` so that the
//! coordinator can compose several of them inside one `Database::with_tx`.

pub mod attendees;
pub mod bans;
pub mod invitations;
pub mod messages;
pub mod rooms;
pub mod scheduled;
pub mod sessions;
pub mod threads;
