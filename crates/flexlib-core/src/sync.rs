//! Multiple-reader, single-writer containers for shared radio state.
//!
//! Object state is mutated by the TCP status reader, read by UI callers and
//! updated from the UDP stream reader at the same time. Each collection or
//! field group gets its own [`Barrier`] so that a burst of meter or
//! panadapter statuses never stalls readers of unrelated objects.
//!
//! Guards must be held only for the assignment itself. Parse first, then
//! take the lock.

use std::ops::RangeInclusive;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A value behind a reader/writer lock.
#[derive(Debug, Default)]
pub struct Barrier<T> {
    inner: RwLock<T>,
}

impl<T> Barrier<T> {
    /// Wrap an initial value.
    pub fn new(value: T) -> Self {
        Barrier {
            inner: RwLock::new(value),
        }
    }

    /// Shared access. Any number of readers may hold this at once.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read()
    }

    /// Exclusive access. Excludes all readers and other writers.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write()
    }

    /// Read a projection of the value without cloning the whole thing.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.read())
    }

    /// Mutate the value in place.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.inner.write())
    }

    /// Replace the value.
    pub fn set(&self, value: T) {
        *self.inner.write() = value;
    }
}

impl<T: Clone> Barrier<T> {
    /// Clone the current value out of the lock.
    pub fn get(&self) -> T {
        self.inner.read().clone()
    }
}

impl<T: PartialEq> Barrier<T> {
    /// Store `value` only if it differs from the current one.
    ///
    /// Returns `true` when the stored value changed. Setters use the return
    /// value to decide whether a command must be sent to the radio.
    pub fn try_set(&self, value: T) -> bool {
        let mut guard = self.inner.write();
        if *guard == value {
            false
        } else {
            *guard = value;
            true
        }
    }
}

/// Update one field of a [`Barrier`]-guarded struct only if it changed.
///
/// Returns `true` when the field was written.
pub fn try_set_field<S, T: PartialEq>(
    barrier: &Barrier<S>,
    field: impl FnOnce(&mut S) -> &mut T,
    value: T,
) -> bool {
    let mut guard = barrier.write();
    let slot = field(&mut guard);
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

/// A scalar that is clamped to a closed range on every write.
#[derive(Debug)]
pub struct ClampedBarrier<T> {
    value: RwLock<T>,
    range: RangeInclusive<T>,
}

impl<T: PartialOrd + Copy> ClampedBarrier<T> {
    /// Create a clamped value. The initial value is clamped as well.
    pub fn new(value: T, range: RangeInclusive<T>) -> Self {
        let initial = clamp(value, &range);
        ClampedBarrier {
            value: RwLock::new(initial),
            range,
        }
    }

    /// Current value.
    pub fn get(&self) -> T {
        *self.value.read()
    }

    /// Clamp and store `value`.
    pub fn set(&self, value: T) {
        *self.value.write() = clamp(value, &self.range);
    }

    /// Clamp and store `value` if the result differs from the current value.
    ///
    /// Returns the stored value when it changed.
    pub fn try_set(&self, value: T) -> Option<T> {
        let clamped = clamp(value, &self.range);
        let mut guard = self.value.write();
        if *guard == clamped {
            None
        } else {
            *guard = clamped;
            Some(clamped)
        }
    }

    /// The allowed range.
    pub fn range(&self) -> &RangeInclusive<T> {
        &self.range
    }
}

/// Clamp `value` into `range`.
pub fn clamp<T: PartialOrd + Copy>(value: T, range: &RangeInclusive<T>) -> T {
    if value < *range.start() {
        *range.start()
    } else if value > *range.end() {
        *range.end()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Props {
        gain: u8,
        name: String,
    }

    #[test]
    fn barrier_get_set() {
        let b = Barrier::new(5u32);
        assert_eq!(b.get(), 5);
        b.set(7);
        assert_eq!(b.get(), 7);
    }

    #[test]
    fn barrier_try_set_reports_change() {
        let b = Barrier::new(String::from("a"));
        assert!(!b.try_set("a".to_string()));
        assert!(b.try_set("b".to_string()));
        assert_eq!(b.get(), "b");
    }

    #[test]
    fn field_try_set() {
        let b = Barrier::new(Props::default());
        assert!(try_set_field(&b, |p| &mut p.gain, 10));
        assert!(!try_set_field(&b, |p| &mut p.gain, 10));
        assert_eq!(b.with(|p| p.gain), 10);
        b.update(|p| p.name = "x".into());
        assert_eq!(b.get().name, "x");
    }

    #[test]
    fn clamped_set() {
        let c = ClampedBarrier::new(50i32, 0..=100);
        c.set(150);
        assert_eq!(c.get(), 100);
        c.set(-3);
        assert_eq!(c.get(), 0);
        assert_eq!(c.try_set(-20), None);
        assert_eq!(c.try_set(42), Some(42));
    }

    #[test]
    fn clamped_initial_value() {
        let c = ClampedBarrier::new(500u16, 0..=100);
        assert_eq!(c.get(), 100);
        assert_eq!(c.range(), &(0..=100));
    }

    #[test]
    fn concurrent_writers() {
        let b = Arc::new(Barrier::new(0u64));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let b = Arc::clone(&b);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        b.update(|v| *v += 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(b.get(), 4000);
    }
}
