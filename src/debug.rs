// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Error wrapping and redactable logging.
//!
//! Every fallible operation in this crate returns a [`crate::Result`], whose
//! error half is an [`Error`] wrapping a module-specific error enum. Errors
//! are only ever created through [`fail!`] or [`check!`], which log them at
//! the point of creation.
//!
//! Logging goes through the [`trace!`], [`info!`], [`warn!`] and [`error!`]
//! macros defined here, never through the [`log`] crate directly. Without the
//! `log` feature they expand to nothing, so neither the calls nor their
//! format strings end up in a firmware image.

#![allow(unused_macros)]

use core::fmt;

#[cfg(doc)]
use __raw_log as log;

/// A wrapped `pfr` error.
///
/// Refer to this type as `pfr::Error`. Users of the library cannot create
/// one; they can only inspect the error inside it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Error<E> {
    inner: E,
}

impl<E> Error<E> {
    /// Wraps `inner`. Only for use by [`fail!`].
    #[doc(hidden)]
    pub fn __new(inner: E) -> Self {
        Self { inner }
    }

    /// Converts the wrapped error into another error type.
    ///
    /// The `From` impls generated by [`debug_from!`] call this, so `?` is
    /// usually enough.
    pub fn cast<F: From<E>>(self) -> Error<F> {
        Error {
            inner: self.inner.into(),
        }
    }

    /// Unwraps the error.
    pub fn into_inner(self) -> E {
        self.inner
    }
}

impl<E> AsRef<E> for Error<E> {
    fn as_ref(&self) -> &E {
        &self.inner
    }
}

impl<E: crate::status::Status> Error<E> {
    /// The integer status code of the wrapped error.
    pub fn code(&self) -> u16 {
        self.inner.code()
    }
}

impl<E: fmt::Display> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "pfr::Error({})", self.inner)
    }
}

/// Generates `From<pfr::Error<F>> for pfr::Error<E>` for each listed `F`.
///
/// A blanket impl over `E: From<F>` would overlap with `impl<T> From<T> for
/// T` when `E == F`, so every error type lists its sources explicitly:
/// ```text
/// debug_from!(session::Error => manifest::Error, update::Error);
/// ```
macro_rules! debug_from {
    ($e:ty => $($f:ty),+ $(,)?) => {$(
        impl From<$crate::Error<$f>> for $crate::Error<$e> {
            fn from(e: $crate::Error<$f>) -> Self {
                e.cast()
            }
        }
    )*};
}

/// Returns `Err(e)` out of the current function unless `cond` holds.
///
/// The failed condition is logged along with the error.
macro_rules! check {
    ($cond:expr, $error:expr) => {
        if !$cond {
            let error = $error;
            return Err(fail!(
                error,
                "check failed: `{}`; returning {:?}",
                stringify!($cond),
                error,
            )
            .cast());
        }
    };
}

/// Logs a new error and wraps it in an [`Error`].
///
/// Write `x.ok_or_else(|| fail!(MyError))` rather than `x.ok_or(MyError)`.
/// An optional format string replaces the default log message.
macro_rules! fail {
    ($error:expr, $($format:tt)+) => {{
        error!($($format)+);
        $crate::debug::Error::__new($error)
    }};
    ($error:expr) => {{
        let error = $error;
        error!("error: {:?}", error);
        $crate::debug::Error::__new(error)
    }};
}

/// Redactable [`log::trace!()`].
macro_rules! trace {
    ($($args:tt)*) => {
        #[cfg(feature = "log")]
        let _ = __raw_log::trace!($($args)*);
    }
}

/// Redactable [`log::info!()`].
macro_rules! info {
    ($($args:tt)*) => {
        #[cfg(feature = "log")]
        let _ = __raw_log::info!($($args)*);
    }
}

/// Redactable [`log::warn!()`].
macro_rules! warn {
    ($($args:tt)*) => {
        #[cfg(feature = "log")]
        let _ = __raw_log::warn!($($args)*);
    }
}

/// Redactable [`log::error!()`].
macro_rules! error {
    ($($args:tt)*) => {
        #[cfg(feature = "log")]
        let _ = __raw_log::error!($($args)*);
    }
}

/// Installs a logger for the unit test binary before `main()` runs.
///
/// Output goes to stderr so that the test harness only shows it for failing
/// tests.
#[cfg(test)]
#[ctor::ctor]
fn init_test_logger() {
    env_logger::builder()
        .is_test(true)
        .format(|_, record| {
            let thread = std::thread::current();
            for line in record.args().to_string().trim().lines() {
                eprintln!(
                    "[{}({}) {}:{}] {}",
                    record.level(),
                    thread.name().unwrap_or("<unknown>"),
                    record.file().unwrap_or("<unknown>"),
                    record.line().unwrap_or(0),
                    line,
                )
            }
            Ok(())
        })
        .init();
}
