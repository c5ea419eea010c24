//! Permission bitfield shared by rooms (default and call-scoped) and attendees.
//!
//! The numeric values are interpreted by the external signaling backend, so
//! they must never be renumbered.

use std::fmt;
use std::ops::{BitAnd, BitOr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bit values outside the defined enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown permission bits: {0:#x}")]
pub struct UnknownPermissionBits(pub u32);

/// A validated permission bitmask. `DEFAULT` (0) means "inherit".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Permissions(u32);

impl Permissions {
    pub const DEFAULT: Self = Self(0);
    pub const CUSTOM: Self = Self(1);
    pub const CALL_START: Self = Self(2);
    pub const CALL_JOIN: Self = Self(4);
    pub const LOBBY_IGNORE: Self = Self(8);
    pub const PUBLISH_AUDIO: Self = Self(16);
    pub const PUBLISH_VIDEO: Self = Self(32);
    pub const PUBLISH_SCREEN: Self = Self(64);
    pub const CHAT: Self = Self(128);
    pub const REACT: Self = Self(256);

    /// Every capability bit, without the CUSTOM marker.
    pub const MAX_DEFAULT: Self = Self(510);
    /// Every defined bit.
    pub const MAX_CUSTOM: Self = Self(511);

    /// Validate a raw bitmask. Unknown bits are rejected, never masked away.
    pub fn from_bits(bits: u32) -> Result<Self, UnknownPermissionBits> {
        let unknown = bits & !Self::MAX_CUSTOM.0;
        if unknown != 0 {
            return Err(UnknownPermissionBits(unknown));
        }
        Ok(Self(bits))
    }

    /// Same as [`from_bits`](Self::from_bits) for values read from storage.
    pub fn from_i64(bits: i64) -> Result<Self, UnknownPermissionBits> {
        let raw = u32::try_from(bits).map_err(|_| UnknownPermissionBits(u32::MAX))?;
        Self::from_bits(raw)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_default(self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `other` is set.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Effective permissions of a non-moderator.
    ///
    /// The first non-default layer wins: attendee override, then the
    /// call-scoped room value, then the room default. An explicit override is
    /// never merged with the room layers. With nothing configured anywhere,
    /// every capability is granted.
    pub fn resolve(room_default: Self, call_scoped: Self, attendee_override: Self) -> Self {
        [attendee_override, call_scoped, room_default]
            .into_iter()
            .find(|p| !p.is_default())
            .unwrap_or(Self::MAX_DEFAULT)
    }

    /// Apply a modification to `current`.
    ///
    /// Any non-default result carries CUSTOM so that it stays an explicit
    /// override, even when every capability bit was removed.
    pub fn apply(method: PermissionMethod, current: Self, delta: Self) -> Self {
        match method {
            PermissionMethod::Set if delta.is_default() => Self::DEFAULT,
            PermissionMethod::Set => delta.union(Self::CUSTOM),
            PermissionMethod::Add => current.union(delta).union(Self::CUSTOM),
            PermissionMethod::Remove => current.difference(delta).union(Self::CUSTOM),
        }
    }

    /// Backfill step for splitting a combined capability into two bits:
    /// holders of `old` gain `new`. Re-applying is a no-op.
    pub fn split_bit(self, old: Self, new: Self) -> Self {
        if self.contains(old) && !self.contains(new) {
            self.union(new)
        } else {
            self
        }
    }
}

impl TryFrom<u32> for Permissions {
    type Error = UnknownPermissionBits;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        Self::from_bits(bits)
    }
}

impl From<Permissions> for u32 {
    fn from(p: Permissions) -> Self {
        p.0
    }
}

impl From<Permissions> for i64 {
    fn from(p: Permissions) -> Self {
        i64::from(p.0)
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitAnd for Permissions {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a permission change is combined with the existing value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionMethod {
    Set,
    Add,
    Remove,
}
