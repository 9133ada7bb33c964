use std::fmt;
use std::num::TryFromIntError;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use serde::{Deserialize, Serialize};
use sync_proto::{SerializationReader, SerializationWriter, StreamError};

/// Identifier of an addressable simulation object or civilization.
///
/// Any negative input collapses to [`ObjectId::INVALID`]; construction never
/// fails. Ordering follows the underlying integer, so `INVALID` sorts first.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub struct ObjectId(i32);

impl ObjectId {
    pub const INVALID_VALUE: i32 = -1;
    pub const INVALID: ObjectId = ObjectId(Self::INVALID_VALUE);

    pub const fn new(value: i32) -> Self {
        if value < 0 {
            Self::INVALID
        } else {
            Self(value)
        }
    }

    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID_VALUE
    }

    pub const fn value(self) -> i32 {
        self.0
    }

    pub fn to_f32(self) -> f32 {
        self.0 as f32
    }

    pub fn to_bool(self) -> bool {
        self.0 != 0
    }

    /// `None` when the value is not a Unicode scalar (including `INVALID`).
    pub fn to_char(self) -> Option<char> {
        u32::try_from(self.0).ok().and_then(char::from_u32)
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl From<i32> for ObjectId {
    fn from(value: i32) -> Self {
        Self::new(value)
    }
}

impl From<ObjectId> for i32 {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl From<ObjectId> for i64 {
    fn from(id: ObjectId) -> Self {
        i64::from(id.0)
    }
}

impl From<ObjectId> for i128 {
    fn from(id: ObjectId) -> Self {
        i128::from(id.0)
    }
}

impl From<ObjectId> for f64 {
    fn from(id: ObjectId) -> Self {
        f64::from(id.0)
    }
}

macro_rules! narrowing_conversion {
    ($($target:ty),*) => {
        $(
            impl TryFrom<ObjectId> for $target {
                type Error = TryFromIntError;

                fn try_from(id: ObjectId) -> Result<Self, Self::Error> {
                    <$target>::try_from(id.0)
                }
            }
        )*
    };
}

narrowing_conversion!(i8, i16, u8, u16, u32, u64, u128, usize);

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "ObjectId({})", self.0)
        } else {
            write!(f, "ObjectId(INVALID)")
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Turn counter saturating into `0..=65535`, where `0` means undefined.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnNumber(u16);

impl TurnNumber {
    pub const UNDEFINED: TurnNumber = TurnNumber(0);
    pub const MAX: TurnNumber = TurnNumber(u16::MAX);

    pub const fn new(value: i64) -> Self {
        if value <= 0 {
            Self::UNDEFINED
        } else if value > u16::MAX as i64 {
            Self::MAX
        } else {
            Self(value as u16)
        }
    }

    pub const fn is_undefined(self) -> bool {
        self.0 == 0
    }

    pub const fn value(self) -> u16 {
        self.0
    }

    pub fn next(self) -> Self {
        self + TurnNumber(1)
    }
}

impl From<i32> for TurnNumber {
    fn from(value: i32) -> Self {
        Self::new(i64::from(value))
    }
}

impl From<i64> for TurnNumber {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl From<u16> for TurnNumber {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<TurnNumber> for i32 {
    fn from(turn: TurnNumber) -> Self {
        i32::from(turn.0)
    }
}

impl From<TurnNumber> for u16 {
    fn from(turn: TurnNumber) -> Self {
        turn.0
    }
}

impl Add for TurnNumber {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(i64::from(self.0) + i64::from(rhs.0))
    }
}

impl AddAssign for TurnNumber {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for TurnNumber {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(i64::from(self.0) - i64::from(rhs.0))
    }
}

impl SubAssign for TurnNumber {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl fmt::Debug for TurnNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TurnNumber({})", self.0)
    }
}

impl fmt::Display for TurnNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An object paired with the civilization that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectOwnerPair {
    pub object_id: ObjectId,
    pub owner_id: ObjectId,
}

impl ObjectOwnerPair {
    pub fn new(object_id: ObjectId, owner_id: ObjectId) -> Self {
        Self {
            object_id,
            owner_id,
        }
    }

    /// Written as two raw 32-bit integers, object first.
    pub fn write_to<W: SerializationWriter>(&self, writer: &mut W) -> Result<(), StreamError> {
        writer.write_raw_i32(self.object_id.value())?;
        writer.write_raw_i32(self.owner_id.value())
    }

    pub fn read_from<R: SerializationReader>(reader: &mut R) -> Result<Self, StreamError> {
        let object_id = ObjectId::new(reader.read_raw_i32()?);
        let owner_id = ObjectId::new(reader.read_raw_i32()?);
        Ok(Self::new(object_id, owner_id))
    }
}
