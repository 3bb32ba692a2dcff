// Control-thread timing - shared clock and deadline-ordered task queue
//
// Every time-based transition of the core (envelope tails, mono fades,
// recorded playback) is a task in this queue. Nothing sleeps: the driver
// advances the clock and the scheduler fires whatever became due.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

/// Shared monotonic control time, measured from session start.
///
/// Cloning a `Clock` yields another handle on the same time value, so the
/// scheduler and the device graph always agree on "now".
#[derive(Clone, Default)]
pub struct Clock {
    now: Rc<Cell<Duration>>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now.get()
    }

    /// Current time in seconds (the unit device automation works in)
    pub fn seconds(&self) -> f64 {
        self.now.get().as_secs_f64()
    }

    /// Move the clock forward to `time`. Never moves backwards.
    pub fn advance_to(&self, time: Duration) {
        if time > self.now.get() {
            self.now.set(time);
        }
    }

    pub fn advance_by(&self, delta: Duration) {
        self.now.set(self.now.get() + delta);
    }
}

/// Handle returned by [`Scheduler::schedule_after`], used to cancel a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    deadline: Duration,
    seq: u64,
}

impl TimerHandle {
    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

type Task = Box<dyn FnOnce()>;

/// Deadline-ordered task queue driven by one tick.
///
/// Tasks with equal deadlines fire in insertion order. The queue is never
/// borrowed while a task runs, so tasks may schedule or cancel others.
pub struct Scheduler {
    clock: Clock,
    queue: RefCell<BTreeMap<(Duration, u64), Task>>,
    next_seq: Cell<u64>,
}

impl Scheduler {
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            queue: RefCell::new(BTreeMap::new()),
            next_seq: Cell::new(0),
        }
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Schedule `task` to run `delay` after the current clock time
    pub fn schedule_after<F>(&self, delay: Duration, task: F) -> TimerHandle
    where
        F: FnOnce() + 'static,
    {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);

        let deadline = self.clock.now() + delay;
        self.queue
            .borrow_mut()
            .insert((deadline, seq), Box::new(task));

        TimerHandle { deadline, seq }
    }

    /// Cancel a pending task. Returns false if it already fired or was cancelled.
    pub fn cancel(&self, handle: TimerHandle) -> bool {
        self.queue
            .borrow_mut()
            .remove(&(handle.deadline, handle.seq))
            .is_some()
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.borrow().keys().next().map(|(deadline, _)| *deadline)
    }

    /// Fire every task whose deadline is at or before the current time.
    /// Returns the number of tasks run.
    pub fn run_due(&self) -> usize {
        let mut fired = 0;
        loop {
            let now = self.clock.now();
            let next = {
                let mut queue = self.queue.borrow_mut();
                match queue.keys().next() {
                    Some((deadline, _)) if *deadline <= now => queue.pop_first(),
                    _ => None,
                }
            };

            match next {
                Some((_, task)) => {
                    task();
                    fired += 1;
                }
                None => break,
            }
        }
        fired
    }

    /// Advance the clock by `delta`, stopping at each intermediate deadline
    /// so tasks observe the time they were scheduled for.
    pub fn advance_by(&self, delta: Duration) -> usize {
        self.advance_to(self.clock.now() + delta)
    }

    /// Advance the clock to `target` in deadline steps
    pub fn advance_to(&self, target: Duration) -> usize {
        let mut fired = 0;
        while let Some(deadline) = self.next_deadline() {
            if deadline > target {
                break;
            }
            self.clock.advance_to(deadline);
            fired += self.run_due();
        }
        self.clock.advance_to(target);
        fired + self.run_due()
    }
}
