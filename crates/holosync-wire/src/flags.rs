//! Change flags for component delta messages
//!
//! Each component kind owns one flag type. A bit names a group of fields
//! that is encoded together; the group layout is fixed per bit.

use std::fmt::Debug;
use std::ops::BitOr;

/// Bit-field naming which field groups a message carries (1 byte on the wire)
pub trait ChangeFlags: Copy + Eq + Debug + BitOr<Output = Self> + Send + Sync + 'static {
    /// No group changed
    const NONE: Self;
    /// Every group this kind knows about
    const ALL: Self;

    fn bits(self) -> u8;

    /// Build from a wire byte, discarding bits this kind does not define
    fn from_bits_truncate(bits: u8) -> Self;

    #[inline]
    fn is_none(self) -> bool {
        self.bits() == 0
    }

    #[inline]
    fn contains(self, other: Self) -> bool {
        self.bits() & other.bits() == other.bits()
    }
}

/// Define a change-flag newtype over `u8`
///
/// ```
/// holosync_wire::change_flags! {
///     /// Flags for a light component
///     pub struct LightChangeFlags {
///         const COLOR = 0b0000_0001;
///         const RANGE = 0b0000_0010;
///     }
/// }
/// use holosync_wire::ChangeFlags;
/// assert_eq!(LightChangeFlags::ALL.bits(), 0b11);
/// ```
#[macro_export]
macro_rules! change_flags {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(const $flag:ident = $value:expr;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        $vis struct $name(u8);

        impl $name {
            $(pub const $flag: $name = $name($value);)+
        }

        impl ::std::ops::BitOr for $name {
            type Output = $name;

            #[inline]
            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }

        impl ::std::ops::BitOrAssign for $name {
            #[inline]
            fn bitor_assign(&mut self, rhs: $name) {
                self.0 |= rhs.0;
            }
        }

        impl $crate::ChangeFlags for $name {
            const NONE: $name = $name(0);
            const ALL: $name = $name(0 $(| $value)+);

            #[inline]
            fn bits(self) -> u8 {
                self.0
            }

            #[inline]
            fn from_bits_truncate(bits: u8) -> $name {
                $name(bits & (0 $(| $value)+))
            }
        }
    };
}
