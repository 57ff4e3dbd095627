// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Integer-tagged enums for on-flash formats.
//!
//! Manifest and recovery records carry small integer discriminants (hash
//! types, failure policies, signature types). [`WireEnum`] represents such a
//! field as a Rust enum, and [`wire_enum!`] generates one.

/// A C-like enum with a fixed integer encoding.
///
/// Every variant has a wire value, but not every wire value names a
/// variant. The following identity must hold for all types T:
/// ```
/// # use pfr::wire::WireEnum;
/// # fn test<T: WireEnum + Copy + PartialEq + std::fmt::Debug>(x: T) {
/// assert_eq!(T::from_wire_value(T::to_wire_value(x)), Some(x));
/// # }
/// ```
pub trait WireEnum: Sized + Copy {
    /// The underlying "wire type"; an unsigned integer.
    type Wire;

    /// Converts `self` into its wire value.
    fn to_wire_value(self) -> Self::Wire;

    /// Looks up the variant with wire value `wire`, if there is one.
    fn from_wire_value(wire: Self::Wire) -> Option<Self>;

    /// The variant's name, as written in source.
    fn name(self) -> &'static str;
}

/// Generates a [`WireEnum`]-implementing enum.
///
/// Syntax is as follows:
/// ```text
/// wire_enum! {
///     /// This is my enum.
///     pub enum MyEnum : u8 {
///         /// Variant `A`.
///         A = 0x00,
///         /// Variant `B`.
///         B = 0x01,
///     }
/// }
/// ```
/// The enum also implements `Display` in terms of [`WireEnum::name()`].
macro_rules! wire_enum {
    ($(#[$meta:meta])* $vis:vis enum $name:ident : $wire:ident {
        $($(#[$meta_variant:meta])* $variant:ident = $value:tt,)*
    }) => {
        $(#[$meta])*
        #[repr($wire)]
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        $vis enum $name {
           $(
               $(#[$meta_variant])*
               $variant = $value,
           )*
        }

        impl $crate::wire::WireEnum for $name {
            type Wire = $wire;
            fn to_wire_value(self) -> Self::Wire {
                match self {
                    $(Self::$variant => $value,)*
                }
            }

            fn from_wire_value(wire: Self::Wire) -> Option<Self> {
                match wire {
                    $($value => Some(Self::$variant),)*
                    _ => None,
                }
            }

            fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant),)*
                }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                use $crate::wire::WireEnum;
                f.write_str(self.name())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    wire_enum! {
        /// A policy-like enum.
        pub enum Policy: u8 {
            /// Do nothing.
            Nothing = 0x00,
            /// Restore from backup.
            Restore = 0x01,
            /// Erase.
            Erase = 0x03,
        }
    }

    #[test]
    fn sparse_values() {
        assert_eq!(Policy::from_wire_value(0x03), Some(Policy::Erase));
        assert_eq!(Policy::from_wire_value(0x02), None);
        assert_eq!(Policy::Restore.to_wire_value(), 0x01);
    }

    #[test]
    fn display() {
        assert_eq!(Policy::Erase.name(), "Erase");
        assert_eq!(format!("{}", Policy::Nothing), "Nothing");
    }
}
