//! Read marker arithmetic, independent of storage.

use huddle_types::models::UNREAD_FIRST_MESSAGE;

/// Map a client supplied marker to a storable one. Zero, negative or
/// missing markers all mean "nothing read yet"; `0` itself is never stored.
pub fn normalize(marker: Option<i64>) -> i64 {
    match marker {
        Some(id) if id > 0 => id,
        _ => UNREAD_FIRST_MESSAGE,
    }
}

/// Marker that leaves exactly the newest message unread.
pub fn unread_marker(previous_message: Option<i64>) -> i64 {
    normalize(previous_message)
}

/// Lower bound for "messages after the marker" queries.
pub fn count_floor(marker: i64) -> i64 {
    marker.max(0)
}
