// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Internal `serde` helpers.
//!
//! Manifest descriptions and session options are written by hand, so
//! addresses may be given as `"0x..."` strings and digests as hex.

// Without `std`, only the integer helpers have users.
#![allow(unused)]

use core::fmt;
use core::fmt::LowerHex;
use core::fmt::Write as _;
use core::marker::PhantomData;
use core::num::ParseIntError;

use serde::de;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serializer;

/// A fixed-capacity `write!()` target.
struct ArrayBuf<const N: usize>([u8; N], usize);

impl<const N: usize> ArrayBuf<N> {
    fn new() -> Self {
        Self([0; N], 0)
    }

    fn as_str(&self) -> &str {
        core::str::from_utf8(&self.0[..self.1]).unwrap_or_default()
    }
}

impl<const N: usize> fmt::Write for ArrayBuf<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.1 + s.len();
        let dest = self.0.get_mut(self.1..end).ok_or(fmt::Error)?;
        dest.copy_from_slice(s.as_bytes());
        self.1 = end;
        Ok(())
    }
}

/// An unsigned integer that can be parsed in any radix.
pub trait FromRadix: Sized + Copy {
    /// The largest value of this type.
    const MAX: u64;

    /// Parses `s` in radix `radix`.
    fn parse(s: &str, radix: u32) -> Result<Self, ParseIntError>;

    /// Truncates `n`, which must be no larger than `MAX`.
    fn truncate(n: u64) -> Self;
}

macro_rules! from_radix {
    ($($ty:ident)*) => {$(
        impl FromRadix for $ty {
            const MAX: u64 = $ty::MAX as u64;

            fn parse(s: &str, radix: u32) -> Result<Self, ParseIntError> {
                $ty::from_str_radix(s, radix)
            }

            fn truncate(n: u64) -> Self {
                n as $ty
            }
        }
    )*}
}
from_radix!(u8 u16 u32 u64 usize);

/// Visitor for [`de_radix()`].
pub struct Radix<T>(PhantomData<T>);

impl<'de, T: FromRadix> de::Visitor<'de> for Radix<T> {
    type Value = T;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "an integer no larger than {}", T::MAX)
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<T, E> {
        let (digits, radix) = match s.get(..2) {
            Some("0x") | Some("0X") => (&s[2..], 16),
            Some("0o") | Some("0O") => (&s[2..], 8),
            Some("0b") | Some("0B") => (&s[2..], 2),
            _ => (s, 10),
        };
        T::parse(digits, radix).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, n: u64) -> Result<T, E> {
        if n > T::MAX {
            return Err(E::invalid_value(de::Unexpected::Unsigned(n), &self));
        }
        Ok(T::truncate(n))
    }
}

/// Deserializes an integer from either a number or a string with an
/// optional `0x`, `0o` or `0b` prefix.
///
/// This relies on `deserialize_any`, so it only works with self-describing
/// formats.
pub fn de_radix<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromRadix,
{
    d.deserialize_any(Radix::<T>(PhantomData))
}

/// Serializes an integer as a `0x`-prefixed hex string.
pub fn se_hex<S, X>(x: &X, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    X: LowerHex,
{
    let mut buf = ArrayBuf::<18>::new();
    let _ = write!(buf, "{:#x}", x);
    s.serialize_str(buf.as_str())
}

/// Deserializes a byte string from either a string or a sequence of bytes.
#[cfg(feature = "std")]
pub fn de_bytestring<'de, D>(d: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(std::ffi::CString::deserialize(d)?.into_bytes())
}

/// Serializes a byte string as bytes.
pub fn se_bytestring<S>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_bytes(bytes)
}

/// Deserializes bytes from a hex string, such as a digest.
#[cfg(feature = "std")]
pub fn de_hex_bytes<'de, D>(d: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = <std::borrow::Cow<str>>::deserialize(d)?;
    let s = s.trim_start_matches("0x");
    if s.len() % 2 != 0 {
        return Err(<D::Error as de::Error>::invalid_length(
            s.len(),
            &"an even number of hex digits",
        ));
    }

    (0..s.len())
        .step_by(2)
        .map(|i| {
            s.get(i..i + 2)
                .and_then(|byte| u8::from_str_radix(byte, 16).ok())
                .ok_or_else(|| {
                    <D::Error as de::Error>::invalid_value(
                        de::Unexpected::Str(s),
                        &"a hex string",
                    )
                })
        })
        .collect()
}

/// Serializes bytes as a hex string.
#[cfg(feature = "std")]
pub fn se_hex_bytes<S>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut hex = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(hex, "{:02x}", b);
    }
    s.serialize_str(&hex)
}
