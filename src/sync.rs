//! Thread-safe value cells and shared containers.
//!
//! [`Atomic`] guards a value of any size behind a spin lock that is held
//! only for the duration of the value's own move or clone — never across
//! caller code. [`AtomicCounter`] is the hot-path specialization for a
//! 32-bit counter on true CPU atomics. [`Shared`] is a reference-counted
//! container with one coarse lock per container; dropping the last handle
//! frees the value.

use std::cell::UnsafeCell;
use std::fmt;
use std::hint;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread;

/// Test-and-test-and-set spin lock. Not reentrant.
pub struct SpinLock {
    locked: AtomicBool,
}

impl SpinLock {
    pub const fn new() -> Self {
        SpinLock {
            locked: AtomicBool::new(false),
        }
    }

    pub fn lock(&self) -> SpinGuard<'_> {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                hint::spin_loop();
            }
        }
        SpinGuard { lock: self }
    }

    pub fn try_lock(&self) -> Option<SpinGuard<'_>> {
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(SpinGuard { lock: self })
        } else {
            None
        }
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        SpinLock::new()
    }
}

pub struct SpinGuard<'a> {
    lock: &'a SpinLock,
}

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

/// A spin-locked cell holding a value of arbitrary size.
///
/// Reads clone the value out, writes move a value in; the lock is held only
/// while the value itself is cloned, moved, or dropped in place.
pub struct Atomic<T> {
    lock: SpinLock,
    value: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for Atomic<T> {}
unsafe impl<T: Send> Sync for Atomic<T> {}

impl<T> Atomic<T> {
    pub const fn new(value: T) -> Self {
        Atomic {
            lock: SpinLock::new(),
            value: UnsafeCell::new(value),
        }
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        let _guard = self.lock.lock();
        unsafe { (*self.value.get()).clone() }
    }

    /// Replaces the held value, dropping the previous one after the lock is
    /// released.
    pub fn set(&self, value: T) {
        drop(self.swap(value));
    }

    pub fn swap(&self, value: T) -> T {
        let _guard = self.lock.lock();
        unsafe { mem::replace(&mut *self.value.get(), value) }
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }

    /// Exclusive access needs no lock.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }
}

impl<T: Clone> Clone for Atomic<T> {
    fn clone(&self) -> Self {
        Atomic::new(self.get())
    }
}

impl<T: Default> Default for Atomic<T> {
    fn default() -> Self {
        Atomic::new(T::default())
    }
}

impl<T> From<T> for Atomic<T> {
    fn from(value: T) -> Self {
        Atomic::new(value)
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Atomic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Atomic").field(&self.get()).finish()
    }
}

impl<T> Atomic<Shared<T>> {
    /// Swaps in `new` only when the cell currently holds the same container
    /// as `expected`, returning the previous handle on success and giving
    /// `new` back on failure.
    pub fn compare_exchange(
        &self,
        expected: &Shared<T>,
        new: Shared<T>,
    ) -> Result<Shared<T>, Shared<T>> {
        let _guard = self.lock.lock();
        let current = unsafe { &mut *self.value.get() };
        if current.ptr_eq(expected) {
            Ok(mem::replace(current, new))
        } else {
            Err(new)
        }
    }
}

/// 32-bit counter on native CPU atomics; the lock-free fast path for the
/// by-far most common [`Atomic`] payload.
pub struct AtomicCounter {
    value: AtomicI32,
}

impl AtomicCounter {
    pub const fn new(value: i32) -> Self {
        AtomicCounter {
            value: AtomicI32::new(value),
        }
    }

    pub fn get(&self) -> i32 {
        self.value.load(Ordering::Acquire)
    }

    /// Adds one and returns the new value.
    pub fn increase(&self) -> i32 {
        self.value.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Subtracts one and returns the new value.
    pub fn decrease(&self) -> i32 {
        self.value.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub fn add(&self, delta: i32) -> i32 {
        self.value.fetch_add(delta, Ordering::AcqRel) + delta
    }

    /// Spins (yielding periodically) until the counter reaches zero.
    pub fn wait_zero(&self) {
        let mut spins = 0u32;
        while self.value.load(Ordering::Acquire) != 0 {
            spins += 1;
            if spins % 64 == 0 {
                thread::yield_now();
            } else {
                hint::spin_loop();
            }
        }
    }
}

impl Default for AtomicCounter {
    fn default() -> Self {
        AtomicCounter::new(0)
    }
}

impl fmt::Debug for AtomicCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicCounter").field(&self.get()).finish()
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A shared, lock-guarded container.
///
/// Cloning a handle shares the same container; the value is freed when the
/// last handle (and every upgraded weak handle) is gone. All access goes
/// through [`with`](Shared::with), which holds the container lock for the
/// whole closure — multi-step read-modify sequences are atomic exactly when
/// they run inside a single `with` call.
pub struct Shared<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Shared {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    /// Runs `f` with exclusive access to the contained value.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = lock_ignoring_poison(&self.inner);
        f(&mut guard)
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(|value| value.clone())
    }

    pub fn set(&self, value: T) {
        drop(self.replace(value));
    }

    pub fn replace(&self, value: T) -> T {
        self.with(|slot| mem::replace(slot, value))
    }

    pub fn downgrade(&self) -> SharedWeak<T> {
        SharedWeak {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// `true` when both handles share one container.
    pub fn ptr_eq(&self, other: &Shared<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Shared {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default> Default for Shared<T> {
    fn default() -> Self {
        Shared::new(T::default())
    }
}

impl<T> From<T> for Shared<T> {
    fn from(value: T) -> Self {
        Shared::new(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = lock_ignoring_poison(&self.inner);
        f.debug_tuple("Shared").field(&*guard).finish()
    }
}

/// Weak counterpart of [`Shared`]; upgrading fails once every strong handle
/// is gone.
pub struct SharedWeak<T> {
    inner: Weak<Mutex<T>>,
}

impl<T> SharedWeak<T> {
    pub fn upgrade(&self) -> Option<Shared<T>> {
        self.inner.upgrade().map(|inner| Shared { inner })
    }

    /// `true` when this weak handle points at `other`'s container.
    pub fn is_handle_of(&self, other: &Shared<T>) -> bool {
        self.inner.as_ptr() == Arc::as_ptr(&other.inner)
    }

    /// `true` when both weak handles point at one container.
    pub fn ptr_eq(&self, other: &SharedWeak<T>) -> bool {
        self.inner.as_ptr() == other.inner.as_ptr()
    }
}

impl<T> Clone for SharedWeak<T> {
    fn clone(&self) -> Self {
        SharedWeak {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for SharedWeak<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedWeak")
    }
}
