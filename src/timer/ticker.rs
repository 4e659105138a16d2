//! Tick sources that drive a [`TimingWheel`](crate::timer::TimingWheel).
//!
//! A ticker runs on its own thread: the wheel calls [`Ticker::wait`] in a loop,
//! forwards every tick to its worker, then calls [`Ticker::delivered`] once the
//! worker has accepted it.
//!
//! - [`IntervalTicker`]: wall-clock ticks every `interval`.
//! - [`ManualTicker`]: ticks on demand through a [`ManualTickerHandle`], for
//!   deterministic tests and for callers that own their own clock.

use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::TimingWheelError;

/// Source of wheel ticks.
pub trait Ticker: Send + 'static {
    /// Blocks until the next tick is due. Returning `false` ends ticking.
    fn wait(&mut self) -> bool;

    /// Called after the wheel worker has received the tick produced by the
    /// preceding [`wait`](Ticker::wait).
    fn delivered(&mut self) {}
}

impl<T: Ticker + ?Sized> Ticker for Box<T> {
    fn wait(&mut self) -> bool {
        (**self).wait()
    }

    fn delivered(&mut self) {
        (**self).delivered()
    }
}

/// Ticks every `interval`, compensating for time spent delivering ticks.
#[derive(Debug)]
pub struct IntervalTicker {
    interval: Duration,
    next: Instant,
}

impl IntervalTicker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now() + interval,
        }
    }
}

impl Ticker for IntervalTicker {
    fn wait(&mut self) -> bool {
        let now = Instant::now();
        if self.next > now {
            thread::sleep(self.next - now);
        }
        self.next += self.interval;
        // a stalled worker drops missed ticks instead of replaying them
        let now = Instant::now();
        if self.next <= now {
            self.next = now + self.interval;
        }
        true
    }
}

/// Ticker advanced explicitly through its [`ManualTickerHandle`].
#[derive(Debug)]
pub struct ManualTicker {
    requests: Receiver<SyncSender<()>>,
    pending: Option<SyncSender<()>>,
}

/// Handle used to fire ticks on a [`ManualTicker`].
#[derive(Debug, Clone)]
pub struct ManualTickerHandle {
    requests: SyncSender<SyncSender<()>>,
}

impl ManualTicker {
    /// Creates a ticker and the handle that drives it.
    pub fn new() -> (Self, ManualTickerHandle) {
        let (tx, rx) = mpsc::sync_channel(0);
        (
            Self {
                requests: rx,
                pending: None,
            },
            ManualTickerHandle { requests: tx },
        )
    }
}

impl Ticker for ManualTicker {
    fn wait(&mut self) -> bool {
        match self.requests.recv() {
            Ok(ack) => {
                self.pending = Some(ack);
                true
            },
            Err(_) => false,
        }
    }

    fn delivered(&mut self) {
        if let Some(ack) = self.pending.take() {
            let _ = ack.send(());
        }
    }
}

impl ManualTickerHandle {
    /// Fires one tick and returns once the wheel worker has received it.
    ///
    /// Commands sent to the wheel after this returns are handled after the
    /// tick. Fails with [`TimingWheelError::Closed`] once the wheel stopped.
    pub fn tick(&self) -> Result<(), TimingWheelError> {
        let (ack_tx, ack_rx) = mpsc::sync_channel(1);
        self.requests
            .send(ack_tx)
            .map_err(|_| TimingWheelError::Closed)?;
        ack_rx.recv().map_err(|_| TimingWheelError::Closed)
    }

    /// Fires `n` ticks in sequence.
    pub fn tick_n(&self, n: usize) -> Result<(), TimingWheelError> {
        for _ in 0..n {
            self.tick()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_ticker_waits_roughly_one_interval() {
        let mut ticker = IntervalTicker::new(Duration::from_millis(20));
        let start = Instant::now();
        assert!(ticker.wait());
        assert!(ticker.wait());
        assert!(start.elapsed() >= Duration::from_millis(35));
    }

    #[test]
    fn manual_ticker_acks_after_delivery() {
        let (mut ticker, handle) = ManualTicker::new();
        let driver = thread::spawn(move || {
            let mut seen = 0;
            while ticker.wait() {
                seen += 1;
                ticker.delivered();
            }
            seen
        });

        handle.tick_n(3).unwrap();
        drop(handle);
        assert_eq!(driver.join().unwrap(), 3);
    }

    #[test]
    fn manual_handle_fails_when_ticker_dropped() {
        let (ticker, handle) = ManualTicker::new();
        drop(ticker);
        assert_eq!(handle.tick(), Err(TimingWheelError::Closed));
    }
}
