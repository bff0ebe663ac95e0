//! Elapsed-seconds counter for a session.
//!
//! The counter is written only by the timer (its own thread, or the caller in
//! manual mode) and read by everyone else through [`ElapsedCounter`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::debug;

use crate::runtime::{FixedTicker, Ticker};

/// How the counter advances once started.
#[derive(Debug, Clone, Copy)]
pub enum Clock {
    /// A background thread adds one per ticker interval.
    Realtime(FixedTicker),
    /// The owner calls [`ElapsedTimer::tick`]. Used for replays and tests.
    Manual,
}

impl Clock {
    /// One count per wall-clock second.
    pub fn seconds() -> Self {
        Clock::Realtime(FixedTicker::from_millis(1000))
    }
}

/// Read-only view of the elapsed seconds.
#[derive(Debug, Clone, Default)]
pub struct ElapsedCounter(Arc<AtomicU64>);

impl ElapsedCounter {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

struct TimerHandle {
    cancel: Sender<()>,
    thread: JoinHandle<()>,
}

impl TimerHandle {
    fn spawn(ticker: FixedTicker, secs: Arc<AtomicU64>) -> Self {
        let (cancel, cancel_rx) = mpsc::channel::<()>();
        let interval = ticker.interval();

        let thread = thread::spawn(move || {
            let started = Instant::now();
            let mut ticks: u32 = 0;
            loop {
                // Deadlines are measured from the start so the count does not drift.
                let deadline = started + interval * (ticks + 1);
                let wait = deadline.saturating_duration_since(Instant::now());
                match cancel_rx.recv_timeout(wait) {
                    Err(RecvTimeoutError::Timeout) => {
                        ticks += 1;
                        secs.fetch_add(1, Ordering::SeqCst);
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        Self { cancel, thread }
    }

    fn cancel(self) {
        let _ = self.cancel.send(());
        let _ = self.thread.join();
    }
}

enum TimerMode {
    Idle,
    Threaded(TimerHandle),
    Manual,
    Stopped,
}

/// Owned, cancellable elapsed-time counter.
///
/// Starts at most once and stops at most once; stopping an idle or stopped timer
/// does nothing. Dropping the timer stops it.
pub struct ElapsedTimer {
    clock: Clock,
    secs: Arc<AtomicU64>,
    mode: TimerMode,
}

impl std::fmt::Debug for ElapsedTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.mode {
            TimerMode::Idle => "idle",
            TimerMode::Threaded(_) => "running",
            TimerMode::Manual => "manual",
            TimerMode::Stopped => "stopped",
        };
        f.debug_struct("ElapsedTimer")
            .field("clock", &self.clock)
            .field("secs", &self.elapsed_secs())
            .field("mode", &mode)
            .finish()
    }
}

impl ElapsedTimer {
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            secs: Arc::new(AtomicU64::new(0)),
            mode: TimerMode::Idle,
        }
    }

    /// Returns false if the timer was already started or stopped.
    pub fn start(&mut self) -> bool {
        if !matches!(self.mode, TimerMode::Idle) {
            return false;
        }
        self.mode = match self.clock {
            Clock::Realtime(ticker) => {
                TimerMode::Threaded(TimerHandle::spawn(ticker, Arc::clone(&self.secs)))
            }
            Clock::Manual => TimerMode::Manual,
        };
        debug!(clock = ?self.clock, "elapsed timer started");
        true
    }

    /// Freezes the counter. Returns true only for the call that actually stopped a
    /// running timer.
    pub fn stop(&mut self) -> bool {
        match std::mem::replace(&mut self.mode, TimerMode::Stopped) {
            TimerMode::Threaded(handle) => {
                handle.cancel();
                debug!(secs = self.elapsed_secs(), "elapsed timer stopped");
                true
            }
            TimerMode::Manual => {
                debug!(secs = self.elapsed_secs(), "elapsed timer stopped");
                true
            }
            TimerMode::Idle | TimerMode::Stopped => false,
        }
    }

    /// Advances a manual clock by one second. Ignored in any other mode.
    pub fn tick(&mut self) -> bool {
        if matches!(self.mode, TimerMode::Manual) {
            self.secs.fetch_add(1, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.mode, TimerMode::Threaded(_) | TimerMode::Manual)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.mode, TimerMode::Stopped)
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.secs.load(Ordering::SeqCst)
    }

    pub fn counter(&self) -> ElapsedCounter {
        ElapsedCounter(Arc::clone(&self.secs))
    }
}

impl Drop for ElapsedTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_timer_is_idle_at_zero() {
        let timer = ElapsedTimer::new(Clock::Manual);
        assert_eq!(timer.elapsed_secs(), 0);
        assert!(!timer.is_running());
        assert!(!timer.is_stopped());
    }

    #[test]
    fn test_manual_ticks_count_while_running() {
        let mut timer = ElapsedTimer::new(Clock::Manual);
        assert!(!timer.tick());
        assert!(timer.start());
        timer.tick();
        timer.tick();
        assert_eq!(timer.elapsed_secs(), 2);
    }

    #[test]
    fn test_stop_freezes_and_is_idempotent() {
        let mut timer = ElapsedTimer::new(Clock::Manual);
        timer.start();
        timer.tick();
        assert!(timer.stop());
        assert!(!timer.stop());
        assert!(!timer.tick());
        assert_eq!(timer.elapsed_secs(), 1);
        assert!(!timer.start());
    }

    #[test]
    fn test_stop_before_start_is_noop() {
        let mut timer = ElapsedTimer::new(Clock::Manual);
        assert!(!timer.stop());
        assert!(!timer.start());
        assert_eq!(timer.elapsed_secs(), 0);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut timer = ElapsedTimer::new(Clock::Manual);
        assert!(timer.start());
        assert!(!timer.start());
    }

    #[test]
    fn test_realtime_counts_and_freezes() {
        let ticker = FixedTicker::new(Duration::from_millis(20));
        let mut timer = ElapsedTimer::new(Clock::Realtime(ticker));
        let counter = timer.counter();
        timer.start();

        std::thread::sleep(Duration::from_millis(130));
        assert!(timer.stop());
        let frozen = counter.get();
        assert!(frozen >= 3, "expected a few ticks, got {frozen}");

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(counter.get(), frozen);
    }

    #[test]
    fn test_drop_cancels_thread() {
        let ticker = FixedTicker::new(Duration::from_millis(5));
        let counter = {
            let mut timer = ElapsedTimer::new(Clock::Realtime(ticker));
            timer.start();
            std::thread::sleep(Duration::from_millis(20));
            timer.counter()
        };
        let after_drop = counter.get();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(counter.get(), after_drop);
    }
}
