//! # Hashed Timing Wheel
//!
//! A circular array of `num_slots` slots advanced by one slot every `interval`.
//! A timer due in `steps = delay / interval` ticks is placed `steps` slots ahead
//! of the current position; timers further out than one full sweep carry a
//! `circle` count of extra rotations to wait.
//!
//! ## Architecture
//!
//! ```text
//!   callers                          wheel worker thread (owns all state)
//!   ───────                          ─────────────────────────────────────
//!   set_timer ──┐                    ┌──────────────────────────────────┐
//!   move_timer ─┤   sync_channel(0)  │ slots: Vec<Vec<SlotId>>          │
//!   remove ─────┼──────────────────► │ entries: SlotArena<TimerEntry>   │
//!   drain ──────┤   Command enum     │ timers: LeakSafeMap<K, Position> │
//!   ticker ─────┘   (rendezvous)     │ ticked_pos                       │
//!                                    └───────────────┬──────────────────┘
//!                                                    │ due batch
//!                                                    ▼
//!                                        executor thread (per tick)
//!                                        run_safe(execute(k, v)) each
//! ```
//!
//! Every external operation is a message to the single worker, so the wheel's
//! own structures need no locks. Senders block until the worker accepts their
//! message or the wheel is stopped; there is no timeout.
//!
//! ## Tick
//!
//! ```text
//!   ticked_pos = (ticked_pos + 1) % num_slots
//!   for entry in slots[ticked_pos]:
//!       removed     → drop it (lazy deletion)
//!       circle > 0  → circle -= 1, stay
//!       diff > 0    → move to slot (ticked_pos + diff) % num_slots, diff = 0
//!       otherwise   → due: forget position, hand to the executor
//! ```
//!
//! ## Rescheduling (`move_timer`)
//!
//! ```text
//!   (pos, circle) = position_and_circle(delay)
//!   pos >= current          → circle, diff = pos - current
//!   pos <  current, circle  → circle - 1, diff = num_slots + pos - current
//!   otherwise               → retire old entry, insert a fresh one at pos
//! ```
//!
//! Entries are only freed from the arena when their slot is scanned, so a
//! stale handle left in a slot never aliases a recycled entry.

use std::hash::Hash;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::ds::{LeakSafeMap, SlotArena, SlotId};
use crate::error::TimingWheelError;
use crate::sync::{TaskRunner, run_safe, spawn_safe};
use crate::timer::ticker::{IntervalTicker, Ticker};

/// Concurrent workers used to hand entries to a [`TimingWheel::drain`] callback.
pub const DRAIN_WORKERS: usize = 8;

type Callback<K, V> = Arc<dyn Fn(K, V) + Send + Sync>;

enum Command<K, V> {
    Set { key: K, value: V, delay: Duration },
    Move { key: K, delay: Duration },
    Remove(K),
    Drain(Callback<K, V>),
    Tick,
    Stop,
}

/// Handle to a running timing wheel.
///
/// Dropping the handle stops the wheel.
///
/// # Example
///
/// ```
/// use std::sync::mpsc;
/// use std::time::Duration;
/// use expirykit::timer::{ManualTicker, TimingWheel};
///
/// let (fired_tx, fired_rx) = mpsc::channel();
/// let (ticker, ticks) = ManualTicker::new();
/// let wheel = TimingWheel::with_ticker(
///     Duration::from_secs(1),
///     3,
///     move |k: &'static str, v: i32| fired_tx.send((k, v)).unwrap(),
///     ticker,
/// )
/// .unwrap();
///
/// wheel.set_timer("a", 1, Duration::from_secs(3)).unwrap();
/// ticks.tick_n(3).unwrap();
/// assert_eq!(fired_rx.recv_timeout(Duration::from_secs(5)), Ok(("a", 1)));
/// ```
pub struct TimingWheel<K, V> {
    interval: Duration,
    num_slots: usize,
    commands: SyncSender<Command<K, V>>,
    closed: Arc<AtomicBool>,
}

impl<K, V> TimingWheel<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    /// Creates a wheel ticking every `interval` with `num_slots` slots.
    ///
    /// `execute` is called with the key and value of every due timer.
    pub fn new<F>(interval: Duration, num_slots: usize, execute: F) -> Result<Self, TimingWheelError>
    where
        F: Fn(K, V) + Send + Sync + 'static,
    {
        Self::with_ticker(interval, num_slots, execute, IntervalTicker::new(interval))
    }

    /// Creates a wheel driven by a custom tick source.
    pub fn with_ticker<F, T>(
        interval: Duration,
        num_slots: usize,
        execute: F,
        ticker: T,
    ) -> Result<Self, TimingWheelError>
    where
        F: Fn(K, V) + Send + Sync + 'static,
        T: Ticker,
    {
        if interval.is_zero() || num_slots == 0 {
            return Err(TimingWheelError::Argument);
        }

        let (commands, receiver) = mpsc::sync_channel(0);
        let closed = Arc::new(AtomicBool::new(false));

        let state = WheelState {
            interval,
            num_slots,
            slots: (0..num_slots).map(|_| Vec::new()).collect(),
            entries: SlotArena::new(),
            timers: LeakSafeMap::new(),
            ticked_pos: num_slots - 1,
            execute: Arc::new(execute),
        };
        {
            let closed = Arc::clone(&closed);
            thread::spawn(move || state.run(receiver, closed));
        }
        {
            let ticks = commands.clone();
            let closed = Arc::clone(&closed);
            thread::spawn(move || drive_ticks(ticker, ticks, closed));
        }

        tracing::debug!(?interval, num_slots, "timing wheel started");
        Ok(Self {
            interval,
            num_slots,
            commands,
            closed,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// Returns `true` once [`stop`](Self::stop) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Schedules `execute(key, value)` after `delay`.
    ///
    /// Delays shorter than one interval fire on the next tick. Setting a key
    /// that already has a timer replaces its value and reschedules it.
    pub fn set_timer(&self, key: K, value: V, delay: Duration) -> Result<(), TimingWheelError> {
        if delay.is_zero() {
            return Err(TimingWheelError::Argument);
        }
        self.send(Command::Set { key, value, delay })
    }

    /// Reschedules the timer for `key` to fire after `delay`.
    ///
    /// A delay shorter than one interval fires the callback right away on a
    /// separate thread and retires the timer. Unknown keys are ignored.
    pub fn move_timer(&self, key: K, delay: Duration) -> Result<(), TimingWheelError> {
        if delay.is_zero() {
            return Err(TimingWheelError::Argument);
        }
        self.send(Command::Move { key, delay })
    }

    /// Cancels the timer for `key`, if any.
    pub fn remove_timer(&self, key: K) -> Result<(), TimingWheelError> {
        self.send(Command::Remove(key))
    }

    /// Removes every pending timer and hands each live one to `f`, running up
    /// to [`DRAIN_WORKERS`] callbacks concurrently.
    pub fn drain<F>(&self, f: F) -> Result<(), TimingWheelError>
    where
        F: Fn(K, V) + Send + Sync + 'static,
    {
        self.send(Command::Drain(Arc::new(f)))
    }

    /// Stops the wheel. Idempotent; never blocks.
    ///
    /// Pending timers are discarded and every later operation fails with
    /// [`TimingWheelError::Closed`].
    pub fn stop(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // the worker may be between its flag check and `recv`, so a Stop that
        // cannot be handed over right now is delivered from its own thread
        if let Err(TrySendError::Full(stop)) = self.commands.try_send(Command::Stop) {
            let commands = self.commands.clone();
            spawn_safe(move || {
                let _ = commands.send(stop);
            });
        }
        tracing::debug!("timing wheel stop requested");
    }

    fn send(&self, command: Command<K, V>) -> Result<(), TimingWheelError> {
        if self.is_closed() {
            return Err(TimingWheelError::Closed);
        }
        self.commands
            .send(command)
            .map_err(|_| TimingWheelError::Closed)
    }
}

impl<K, V> Drop for TimingWheel<K, V> {
    /// A Stop that misses the worker here is resent by the tick thread once
    /// it observes the flag.
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.commands.try_send(Command::Stop);
        }
    }
}

impl<K, V> std::fmt::Debug for TimingWheel<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimingWheel")
            .field("interval", &self.interval)
            .field("num_slots", &self.num_slots)
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

fn drive_ticks<K, V, T: Ticker>(
    mut ticker: T,
    ticks: SyncSender<Command<K, V>>,
    closed: Arc<AtomicBool>,
) {
    while !closed.load(Ordering::Acquire) && ticker.wait() {
        if closed.load(Ordering::Acquire) || ticks.send(Command::Tick).is_err() {
            break;
        }
        ticker.delivered();
    }
    if closed.load(Ordering::Acquire) {
        // releases a pending manual tick before blocking on the worker
        drop(ticker);
        // fails at once if the worker already exited
        let _ = ticks.send(Command::Stop);
    }
}

// ---------------------------------------------------------------------------
// Worker-owned state
// ---------------------------------------------------------------------------

struct TimerEntry<K, V> {
    key: K,
    value: Option<V>,
    delay: Duration,
    circle: usize,
    diff: usize,
    removed: bool,
}

/// Slot index plus the live entry for a key.
#[derive(Debug, Clone, Copy)]
struct PositionEntry {
    pos: usize,
    item: SlotId,
}

enum Scan {
    Drop,
    Stay,
    Move(usize),
    Due,
}

struct WheelState<K, V> {
    interval: Duration,
    num_slots: usize,
    slots: Vec<Vec<SlotId>>,
    entries: SlotArena<TimerEntry<K, V>>,
    timers: LeakSafeMap<K, PositionEntry>,
    ticked_pos: usize,
    execute: Callback<K, V>,
}

impl<K, V> WheelState<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    fn run(mut self, commands: Receiver<Command<K, V>>, closed: Arc<AtomicBool>) {
        while !closed.load(Ordering::Acquire) {
            let command = match commands.recv() {
                Ok(command) => command,
                Err(_) => break,
            };
            if closed.load(Ordering::Acquire) {
                break;
            }
            match command {
                Command::Tick => self.on_tick(),
                Command::Set { key, value, delay } => self.set_task(key, value, delay),
                Command::Move { key, delay } => self.move_task(key, delay),
                Command::Remove(key) => self.remove_task(&key),
                Command::Drain(f) => self.drain_all(f),
                Command::Stop => break,
            }
        }
        tracing::debug!(pending = self.timers.len(), "timing wheel stopped");
    }

    /// Returns the slot `delay` lands in and the full rotations to wait there.
    fn position_and_circle(&self, delay: Duration) -> (usize, usize) {
        let steps = delay.as_nanos() / self.interval.as_nanos();
        let steps = usize::try_from(steps).unwrap_or(usize::MAX);
        let pos = (self.ticked_pos + steps % self.num_slots) % self.num_slots;
        let circle = steps.saturating_sub(1) / self.num_slots;
        (pos, circle)
    }

    fn set_task(&mut self, key: K, value: V, delay: Duration) {
        let delay = delay.max(self.interval);

        if let Some(position) = self.timers.get(&key).copied() {
            if let Some(entry) = self.entries.get_mut(position.item) {
                entry.value = Some(value);
            }
            self.move_task(key, delay);
            return;
        }

        let (pos, circle) = self.position_and_circle(delay);
        let item = self.entries.insert(TimerEntry {
            key: key.clone(),
            value: Some(value),
            delay,
            circle,
            diff: 0,
            removed: false,
        });
        self.slots[pos].push(item);
        self.timers.put(key, PositionEntry { pos, item });
    }

    fn move_task(&mut self, key: K, delay: Duration) {
        let Some(PositionEntry { pos: current, item }) = self.timers.get(&key).copied() else {
            return;
        };

        if delay < self.interval {
            self.timers.remove(&key);
            if let Some(entry) = self.entries.get_mut(item) {
                entry.removed = true;
                if let Some(value) = entry.value.take() {
                    let execute = Arc::clone(&self.execute);
                    spawn_safe(move || execute(key, value));
                }
            }
            return;
        }

        let (pos, circle) = self.position_and_circle(delay);
        let num_slots = self.num_slots;
        let Some(entry) = self.entries.get_mut(item) else {
            return;
        };
        entry.delay = delay;

        if pos >= current {
            entry.circle = circle;
            entry.diff = pos - current;
        } else if circle > 0 {
            entry.circle = circle - 1;
            entry.diff = num_slots + pos - current;
        } else {
            entry.removed = true;
            let value = entry.value.take();
            let fresh = self.entries.insert(TimerEntry {
                key: key.clone(),
                value,
                delay,
                circle: 0,
                diff: 0,
                removed: false,
            });
            self.slots[pos].push(fresh);
            self.timers.put(key, PositionEntry { pos, item: fresh });
        }
    }

    fn remove_task(&mut self, key: &K) {
        if let Some(position) = self.timers.remove(key) {
            if let Some(entry) = self.entries.get_mut(position.item) {
                entry.removed = true;
            }
        }
    }

    fn on_tick(&mut self) {
        self.ticked_pos = (self.ticked_pos + 1) % self.num_slots;
        let ticked = self.ticked_pos;
        let scanned = mem::take(&mut self.slots[ticked]);
        let mut remaining = Vec::with_capacity(scanned.len());
        let mut due = Vec::new();

        for id in scanned {
            let Some(entry) = self.entries.get_mut(id) else {
                continue;
            };
            let action = if entry.removed {
                Scan::Drop
            } else if entry.circle > 0 {
                entry.circle -= 1;
                Scan::Stay
            } else if entry.diff > 0 {
                let pos = (ticked + entry.diff) % self.num_slots;
                entry.diff = 0;
                Scan::Move(pos)
            } else {
                Scan::Due
            };

            match action {
                Scan::Drop => {
                    self.entries.remove(id);
                },
                Scan::Stay => remaining.push(id),
                Scan::Move(pos) => {
                    // diff < num_slots, so pos never equals the scanned slot
                    self.slots[pos].push(id);
                    if let Some(entry) = self.entries.get(id) {
                        if let Some(position) = self.timers.get_mut(&entry.key) {
                            position.pos = pos;
                            position.item = id;
                        }
                    }
                },
                Scan::Due => {
                    if let Some(entry) = self.entries.remove(id) {
                        self.timers.remove(&entry.key);
                        if let Some(value) = entry.value {
                            due.push((entry.key, value));
                        }
                    }
                },
            }
        }

        self.slots[ticked] = remaining;
        self.run_tasks(due);
    }

    fn run_tasks(&self, due: Vec<(K, V)>) {
        if due.is_empty() {
            return;
        }
        tracing::trace!(count = due.len(), "firing due timers");
        let execute = Arc::clone(&self.execute);
        spawn_safe(move || {
            for (key, value) in due {
                run_safe(|| execute(key, value));
            }
        });
    }

    fn drain_all(&mut self, f: Callback<K, V>) {
        let runner = TaskRunner::new(DRAIN_WORKERS);
        let mut drained = 0usize;

        for slot in self.slots.iter_mut() {
            for id in mem::take(slot) {
                let Some(entry) = self.entries.remove(id) else {
                    continue;
                };
                if entry.removed {
                    continue;
                }
                if let Some(value) = entry.value {
                    let f = Arc::clone(&f);
                    let key = entry.key;
                    runner.schedule(move || f(key, value));
                    drained += 1;
                }
            }
        }

        self.timers.clear();
        self.entries.clear();
        tracing::debug!(drained, "timing wheel drained");
    }
}
