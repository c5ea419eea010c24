use serde::{Deserialize, Serialize};

use crate::UnknownValue;

/// Call membership of a single session. 0 means not in the call.
///
/// Media flags are what the client asked for; they are not a guarantee that
/// the device actually publishes that media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct InCallFlags(u8);

impl InCallFlags {
    pub const DISCONNECTED: Self = Self(0);
    pub const IN_CALL: Self = Self(1);
    pub const WITH_AUDIO: Self = Self(2);
    pub const WITH_VIDEO: Self = Self(4);
    pub const WITH_PHONE: Self = Self(8);

    const ALL: u8 = 15;

    /// Validate requested flags. Any media flag implies `IN_CALL`.
    pub fn from_bits(bits: i64) -> Result<Self, UnknownValue> {
        if !(0..=i64::from(Self::ALL)).contains(&bits) {
            return Err(UnknownValue {
                kind: "InCallFlags",
                value: bits,
            });
        }
        let bits = bits as u8;
        if bits == 0 {
            return Ok(Self::DISCONNECTED);
        }
        Ok(Self(bits | Self::IN_CALL.0))
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn is_in_call(self) -> bool {
        self.0 != 0
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl TryFrom<i64> for InCallFlags {
    type Error = UnknownValue;

    fn try_from(bits: i64) -> Result<Self, Self::Error> {
        Self::from_bits(bits)
    }
}

impl From<InCallFlags> for i64 {
    fn from(f: InCallFlags) -> Self {
        i64::from(f.0)
    }
}
