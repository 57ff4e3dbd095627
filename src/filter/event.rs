// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Blocked-transaction events.
//!
//! Filter hardware raises an interrupt when it drops a transaction. The
//! interrupt handler must not block, so it records an [`Event`] through an
//! [`EventProducer`] and returns; a single worker later drains the matching
//! [`EventConsumer`] and acts on what it finds.
//!
//! Both halves come from splitting one [`EventQueue`]. The queue is
//! lock-free, so the producer never waits on the consumer, and vice versa.
//!
//! ```
//! # use pfr::filter::event::*;
//! let mut queue = EventQueue::<4>::new();
//! let (mut tx, mut rx) = queue.split();
//! tx.push(Event::I2c { bus: 0, address: 0x50, offset: 3 }).unwrap();
//! assert_eq!(rx.drain().count(), 1);
//! ```

use heapless::spsc;

use crate::filter::Error;
use crate::Result;

/// A transaction dropped by a bus filter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// An SPI transaction was blocked.
    Spi {
        /// The SPI monitor that blocked it.
        device: u8,
        /// The opcode.
        command: u8,
        /// The address, if the opcode carries one.
        address: Option<u32>,
    },
    /// An I2C transaction was blocked.
    I2c {
        /// The bus it was on.
        bus: u8,
        /// The 7-bit device address.
        address: u8,
        /// The register offset.
        offset: u8,
    },
}

/// A bounded FIFO holding up to `N - 1` events.
pub struct EventQueue<const N: usize> {
    queue: spsc::Queue<Event, N>,
}

impl<const N: usize> Default for EventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> EventQueue<N> {
    /// The number of events the queue can hold.
    pub const CAPACITY: usize = N - 1;

    /// Creates an empty queue.
    pub const fn new() -> Self {
        Self {
            queue: spsc::Queue::new(),
        }
    }

    /// Splits the queue into its interrupt-side and worker-side halves.
    pub fn split(&mut self) -> (EventProducer<'_, N>, EventConsumer<'_, N>) {
        let (tx, rx) = self.queue.split();
        (
            EventProducer {
                inner: tx,
                dropped: 0,
            },
            EventConsumer { inner: rx },
        )
    }
}

/// The interrupt-side half of an [`EventQueue`].
pub struct EventProducer<'q, const N: usize> {
    inner: spsc::Producer<'q, Event, N>,
    dropped: u32,
}

impl<const N: usize> EventProducer<'_, N> {
    /// Appends `event`.
    ///
    /// If the queue is full the event is discarded and counted.
    pub fn push(&mut self, event: Event) -> Result<(), Error> {
        if self.inner.enqueue(event).is_err() {
            self.dropped = self.dropped.saturating_add(1);
            return Err(fail!(Error::Full));
        }
        Ok(())
    }

    /// Returns whether the next [`EventProducer::push()`] would fail.
    pub fn is_full(&self) -> bool {
        !self.inner.ready()
    }

    /// The number of events discarded because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

/// The worker-side half of an [`EventQueue`].
pub struct EventConsumer<'q, const N: usize> {
    inner: spsc::Consumer<'q, Event, N>,
}

impl<'q, const N: usize> EventConsumer<'q, N> {
    /// Removes the oldest event.
    pub fn pop(&mut self) -> Option<Event> {
        self.inner.dequeue()
    }

    /// Removes events oldest-first until the queue is empty.
    pub fn drain<'a>(&'a mut self) -> impl Iterator<Item = Event> + use<'a, 'q, N>
    where
        'q: 'a,
    {
        core::iter::from_fn(move || self.pop())
    }

    /// The number of queued events.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        !self.inner.ready()
    }
}
