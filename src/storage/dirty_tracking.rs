// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Dirty flags and change serials.

A pooled device buffer carries a [DirtyFlag] that the owning storage raises on every write
and the buffer lowers once it has been refreshed from staging.

A [Serial] identifies one generation of bindable state.  Renderers remember the serial
they last bound and rebind only when it changes.  Serials are drawn from one process-wide
counter, so two different storages never hand out the same serial.
*/

use std::sync::atomic::{AtomicU64, Ordering};

//0 is never handed out, so renderers can use it as "nothing bound"
static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Serial(u64);

impl Serial {
    /// Issues a serial that has never been issued before.
    pub fn next() -> Self {
        Serial(NEXT_SERIAL.fetch_add(1, Ordering::Relaxed))
    }

    /// A serial that is never issued by [Serial::next].
    pub const fn none() -> Self {
        Serial(0)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Whether a pooled buffer may be stale with respect to staging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DirtyFlag(bool);

impl DirtyFlag {
    pub(crate) fn new(dirty: bool) -> Self {
        DirtyFlag(dirty)
    }
    pub(crate) fn mark_dirty(&mut self, dirty: bool) {
        self.0 = dirty;
    }
    pub(crate) fn is_dirty(&self) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serials_increase() {
        let a = Serial::next();
        let b = Serial::next();
        assert!(b > a);
        assert_ne!(a, Serial::none());
        assert_eq!(Serial::none().value(), 0);
    }

    #[test]
    fn dirty_round_trip() {
        let mut flag = DirtyFlag::new(true);
        assert!(flag.is_dirty());
        flag.mark_dirty(false);
        assert!(!flag.is_dirty());
    }
}
