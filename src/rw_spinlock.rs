//! RwSpinLock: a word-sized reader/writer spin lock.
//!
//! State layout (one `u32`):
//! - bit 31: exclusive lock held.
//! - bit 30: writer pending. Set by a blocked `lock()` while readers are
//!   present. It is advisory only: new readers still get in, so a writer can
//!   starve under sustained read pressure.
//! - bits 0..30: number of shared holders.
//!
//! The lock is neither fair, recursive, nor poisoned. Prefer the RAII
//! guards of [`RwSpinLock`] over the raw API; they release on every exit
//! path including unwinding.

use crate::backoff::Backoff;
use core::sync::atomic::{AtomicU32, Ordering};

const LOCKED_EXCLUSIVE: u32 = 1 << 31;
const WRITER_PENDING: u32 = 1 << 30;
const READER_COUNT_MASK: u32 = WRITER_PENDING - 1;

/// Reader/writer lock over a value, backed by [`RawRwSpinLock`].
pub type RwSpinLock<T> = lock_api::RwLock<RawRwSpinLock, T>;

/// Shared guard of a [`RwSpinLock`].
pub type RwSpinLockReadGuard<'a, T> = lock_api::RwLockReadGuard<'a, RawRwSpinLock, T>;

/// Exclusive guard of a [`RwSpinLock`].
pub type RwSpinLockWriteGuard<'a, T> = lock_api::RwLockWriteGuard<'a, RawRwSpinLock, T>;

/// The raw lock word. Default state is unlocked; no allocation.
#[derive(Debug, Default)]
pub struct RawRwSpinLock {
    state: AtomicU32,
}

#[inline(always)]
fn can_share(st: u32) -> bool {
    st & LOCKED_EXCLUSIVE == 0 && st & READER_COUNT_MASK != READER_COUNT_MASK
}

impl RawRwSpinLock {
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(0),
        }
    }

    /// Attempt to acquire shared access without blocking.
    ///
    /// Fails when the lock is held exclusively or the reader count is
    /// saturated.
    #[inline]
    pub fn try_lock_shared(&self) -> bool {
        let st = self.state.load(Ordering::Relaxed);
        if !can_share(st) {
            return false;
        }
        self.state
            .compare_exchange(st, st + 1, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Acquire shared access, backing off until it succeeds.
    #[inline]
    pub fn lock_shared(&self) {
        let mut backoff = Backoff::new();
        loop {
            let st = self.state.load(Ordering::Relaxed);
            if can_share(st)
                && self
                    .state
                    .compare_exchange_weak(st, st + 1, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                return;
            }
            backoff.snooze();
        }
    }

    /// Release shared access.
    ///
    /// # Safety
    ///
    /// The caller must currently hold a shared lock acquired from `self`.
    #[inline]
    pub unsafe fn unlock_shared(&self) {
        let prev = self.state.fetch_sub(1, Ordering::Release);
        debug_assert!(
            prev & READER_COUNT_MASK != 0 && prev & LOCKED_EXCLUSIVE == 0,
            "unlock_shared on a lock not held shared (state {prev:#x})"
        );
    }

    /// Attempt to acquire exclusive access without blocking.
    #[inline]
    pub fn try_lock(&self) -> bool {
        let st = self.state.load(Ordering::Relaxed);
        if st & (LOCKED_EXCLUSIVE | READER_COUNT_MASK) != 0 {
            return false;
        }
        self.state
            .compare_exchange(st, LOCKED_EXCLUSIVE, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Acquire exclusive access, backing off until it succeeds.
    #[inline]
    pub fn lock(&self) {
        let mut backoff = Backoff::new();
        loop {
            let st = self.state.load(Ordering::Relaxed);
            if st & LOCKED_EXCLUSIVE != 0 {
                // Another writer holds it.
            } else if st & READER_COUNT_MASK == 0 {
                if self
                    .state
                    .compare_exchange_weak(
                        st,
                        LOCKED_EXCLUSIVE,
                        Ordering::Acquire,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    return;
                }
            } else if st & WRITER_PENDING == 0 {
                let _ = self.state.compare_exchange_weak(
                    st,
                    st | WRITER_PENDING,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                );
            }
            backoff.snooze();
        }
    }

    /// Release exclusive access. Clears the whole state word.
    ///
    /// # Safety
    ///
    /// The caller must currently hold the exclusive lock of `self`.
    #[inline]
    pub unsafe fn unlock(&self) {
        debug_assert!(
            self.state.load(Ordering::Relaxed) & LOCKED_EXCLUSIVE != 0,
            "unlock on a lock not held exclusively"
        );
        self.state.store(0, Ordering::Release);
    }

    /// True if held in either mode. Racy; for diagnostics and assertions.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) & (LOCKED_EXCLUSIVE | READER_COUNT_MASK) != 0
    }

    /// True if held exclusively. Racy; for diagnostics and assertions.
    #[inline]
    pub fn is_locked_exclusive(&self) -> bool {
        self.state.load(Ordering::Relaxed) & LOCKED_EXCLUSIVE != 0
    }

    /// True while a blocked writer has flagged itself.
    #[inline]
    pub fn is_writer_pending(&self) -> bool {
        self.state.load(Ordering::Relaxed) & WRITER_PENDING != 0
    }

    /// Number of shared holders. Racy; for diagnostics and assertions.
    #[inline]
    pub fn reader_count(&self) -> u32 {
        self.state.load(Ordering::Relaxed) & READER_COUNT_MASK
    }

    #[cfg(test)]
    fn with_state(state: u32) -> Self {
        Self {
            state: AtomicU32::new(state),
        }
    }
}

impl Drop for RawRwSpinLock {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        debug_assert!(
            *self.state.get_mut() & (LOCKED_EXCLUSIVE | READER_COUNT_MASK) == 0,
            "RawRwSpinLock dropped while held"
        );
    }
}

unsafe impl lock_api::RawRwLock for RawRwSpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: RawRwSpinLock = RawRwSpinLock::new();

    type GuardMarker = lock_api::GuardSend;

    #[inline]
    fn lock_shared(&self) {
        RawRwSpinLock::lock_shared(self)
    }

    #[inline]
    fn try_lock_shared(&self) -> bool {
        RawRwSpinLock::try_lock_shared(self)
    }

    #[inline]
    unsafe fn unlock_shared(&self) {
        unsafe { RawRwSpinLock::unlock_shared(self) }
    }

    #[inline]
    fn lock_exclusive(&self) {
        self.lock()
    }

    #[inline]
    fn try_lock_exclusive(&self) -> bool {
        self.try_lock()
    }

    #[inline]
    unsafe fn unlock_exclusive(&self) {
        unsafe { self.unlock() }
    }

    #[inline]
    fn is_locked(&self) -> bool {
        RawRwSpinLock::is_locked(self)
    }

    #[inline]
    fn is_locked_exclusive(&self) -> bool {
        RawRwSpinLock::is_locked_exclusive(self)
    }
}
