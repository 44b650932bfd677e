use num_traits::{One, PrimInt};
use serde::{Deserialize, Serialize};

/// Implemented by object-type enums whose discriminant is a bit index.
pub trait FlagBitmask {
    type Storage: PrimInt;

    fn bit_index(&self) -> u8;

    fn mask(&self) -> Self::Storage {
        // NOTE: `bit_index()` must be < number of bits in `Storage`.
        Self::Storage::one() << (self.bit_index() as usize)
    }
}

/// A set of object types, used to choose what a trace or sweep collides with.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BitmaskFlags<T: PrimInt> {
    pub bits: T,
}

impl<T: PrimInt> BitmaskFlags<T> {
    pub fn new(bits: T) -> Self {
        Self { bits }
    }

    pub fn of<U: FlagBitmask<Storage = T> + Copy>(tags: &[U]) -> Self {
        let mut flags = Self::new(T::zero());
        for &tag in tags {
            flags.bits = flags.bits | tag.mask();
        }
        flags
    }

    pub fn all() -> Self {
        Self::new(!T::zero())
    }

    pub fn has<U: FlagBitmask<Storage = T>>(&self, tag: U) -> bool {
        (self.bits & tag.mask()) != T::zero()
    }

    /// True when the raw mask of a single object type is part of this set.
    pub fn has_bits(&self, bits: T) -> bool {
        (self.bits & bits) != T::zero()
    }

    pub fn is_empty(&self) -> bool {
        self.bits == T::zero()
    }
}

/// Declare an object-type enum and implement `FlagBitmask` for it.
#[macro_export]
macro_rules! define_object_types {
    ($name:ident, $storage:ty, { $($variant:ident),* $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[repr(u8)]
        pub enum $name {
            $($variant),*
        }

        impl $crate::world::channels::FlagBitmask for $name {
            type Storage = $storage;

            fn bit_index(&self) -> u8 {
                *self as u8
            }
        }
    };
}

define_object_types!(ObjectType, u32, {
    WorldStatic,
    WorldDynamic,
    Pawn,
    PhysicsBody,
    Vehicle,
    Destructible,
});

pub type ObjectTypes = BitmaskFlags<u32>;

impl ObjectTypes {
    /// What ground, ledge and free-space queries collide with by default.
    pub fn world() -> Self {
        Self::of(&[ObjectType::WorldStatic, ObjectType::WorldDynamic])
    }
}
