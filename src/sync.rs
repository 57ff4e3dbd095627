// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Single-claim ownership of process-wide singletons.
//!
//! A hash engine, a signature engine or the filter hardware exists once per
//! device, but several tasks may want to drive it. [`Exclusive`] wraps such a
//! resource so that at most one [`Claim`] on it exists at a time; a second
//! claimant gets [`Error::Busy`] instead of interleaving its operations with
//! the first.
//!
//! ```
//! # use pfr::sync::*;
//! let engine = Exclusive::new(0u32);
//! let mut claim = engine.try_claim().unwrap();
//! *claim += 1;
//! assert!(engine.try_claim().is_err());
//! drop(claim);
//! assert_eq!(*engine.try_claim().unwrap(), 1);
//! ```

#![allow(unsafe_code)]

use core::cell::UnsafeCell;
use core::fmt;
use core::ops::Deref;
use core::ops::DerefMut;
use core::sync::atomic::AtomicBool;
use core::sync::atomic::Ordering;

/// An error from claiming an [`Exclusive`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Indicates that another claim on the resource is live.
    Busy,
}

status_codes!(Error: Session {
    Busy => 0x01,
});

/// A resource that can be claimed by one user at a time.
pub struct Exclusive<T> {
    claimed: AtomicBool,
    value: UnsafeCell<T>,
}

// SAFETY: access to `value` is only granted through a `Claim`, and `claimed`
// guarantees at most one `Claim` exists at a time.
unsafe impl<T: Send> Sync for Exclusive<T> {}

impl<T> Exclusive<T> {
    /// Wraps `value`.
    pub const fn new(value: T) -> Self {
        Self {
            claimed: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// Attempts to claim the resource.
    pub fn try_claim(&self) -> crate::Result<Claim<'_, T>, Error> {
        match self.claimed.compare_exchange(
            false,
            true,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(Claim { owner: self }),
            Err(_) => Err(fail!(Error::Busy)),
        }
    }

    /// Returns whether a claim on the resource is live.
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    /// Gets mutable access without claiming; `&mut self` proves there are
    /// no other users.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    /// Unwraps the resource.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

/// A live claim on an [`Exclusive`]; the claim is released on drop.
pub struct Claim<'a, T> {
    owner: &'a Exclusive<T>,
}

impl<T> Deref for Claim<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: this claim is the only one; see `Exclusive`.
        unsafe { &*self.owner.value.get() }
    }
}

impl<T> DerefMut for Claim<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: this claim is the only one; see `Exclusive`.
        unsafe { &mut *self.owner.value.get() }
    }
}

impl<T: fmt::Debug> fmt::Debug for Claim<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Claim").field(&**self).finish()
    }
}

impl<T> Drop for Claim<'_, T> {
    fn drop(&mut self) {
        self.owner.claimed.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::sync::Arc;
    use std::thread;

    #[test]
    fn second_claim_is_busy() {
        let x = Exclusive::new(5);
        let claim = x.try_claim().unwrap();
        assert!(x.is_claimed());
        assert_eq!(x.try_claim().unwrap_err().into_inner(), Error::Busy);
        drop(claim);
        assert!(!x.is_claimed());
        assert_eq!(*x.try_claim().unwrap(), 5);
    }

    #[test]
    fn contention_across_threads() {
        let x = Arc::new(Exclusive::new(0u64));
        let threads = (0..4)
            .map(|_| {
                let x = Arc::clone(&x);
                thread::spawn(move || {
                    let mut wins = 0;
                    for _ in 0..1000 {
                        if let Ok(mut claim) = x.try_claim() {
                            *claim += 1;
                            wins += 1;
                        }
                    }
                    wins
                })
            })
            .collect::<Vec<_>>();
        let wins: u64 = threads.into_iter().map(|t| t.join().unwrap()).sum();
        assert_eq!(*x.try_claim().unwrap(), wins);
    }
}
