//! Graduated backoff for spin-wait loops.
//!
//! Short waits burn a few pause hints, longer ones hand the core back to the
//! scheduler, and very long ones sleep briefly before the schedule restarts.

use std::hint;
use std::thread;
use std::time::Duration;

/// Steps below this issue `2^step` pause hints.
const PAUSE_STEPS: u32 = 5;

/// Length of one full backoff cycle; the last step of each cycle sleeps.
const SLEEP_EVERY: u32 = 1024;

const SLEEP_FOR: Duration = Duration::from_millis(1);

/// What a single backoff step does.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Phase {
    /// Issue this many CPU pause hints.
    Spin(u32),
    /// Yield the time slice.
    Yield,
    /// Sleep for a short fixed interval.
    Sleep,
}

impl Phase {
    pub(crate) fn for_step(step: u32) -> Phase {
        let k = step % SLEEP_EVERY;
        if k < PAUSE_STEPS {
            Phase::Spin(1 << k)
        } else if k < SLEEP_EVERY - 1 {
            Phase::Yield
        } else {
            Phase::Sleep
        }
    }
}

/// Per-acquisition backoff state. Create one per blocking acquire.
#[derive(Debug, Default)]
pub(crate) struct Backoff {
    step: u32,
}

impl Backoff {
    pub(crate) const fn new() -> Self {
        Self { step: 0 }
    }

    /// Wait once, then advance the schedule.
    #[inline]
    pub(crate) fn snooze(&mut self) {
        match Phase::for_step(self.step) {
            Phase::Spin(n) => {
                for _ in 0..n {
                    hint::spin_loop();
                }
            }
            Phase::Yield => thread::yield_now(),
            Phase::Sleep => {
                tracing::trace!(step = self.step, "spin lock contended, sleeping");
                thread::sleep(SLEEP_FOR);
            }
        }
        self.step = self.step.wrapping_add(1);
    }

    #[cfg(test)]
    pub(crate) fn step(&self) -> u32 {
        self.step
    }
}
