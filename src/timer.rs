//! The timeline the MAC runs on
//!
//! The MAC never waits. Everything that has to happen later is a [`Timer`] handed to the
//! [`Scheduler`], which gives it back through [`crate::Mac::handle_timer`] once it's due.

use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::{Channel, TryReceiveError, TrySendError},
};

use crate::time::{Duration, Instant};

/// Identifies a scheduled timer so it can be cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct TimerHandle(pub u64);

/// Everything the MAC can schedule for later
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Timer {
    /// A state change that must not run in the context that decided on it
    ChangeState(StateChange),
    /// No acknowledgment arrived in time
    AckWait,
    /// The interframe space after a transmission has passed
    Ifs,
    /// No data arrived after the coordinator announced it had some
    PollWait,
    /// Time to transmit our beacon
    Beacon,
    /// The beacon of the coordinator didn't arrive
    BeaconSearchTimeout,
    Csma(CsmaTimer),
    Superframe(SuperframeTimer),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum StateChange {
    Idle,
    Csma,
    /// Interrupt whatever we're doing to acknowledge a received frame
    SendAck { seq: u8, frame_pending: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum CsmaTimer {
    RandomBackoff,
    RequestCca,
    CanProceed,
    EndOfCap,
}

/// One of the two superframes a node can take part in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum SuperframeKind {
    /// The superframe of our own beacons
    Outgoing,
    /// The superframe of the coordinator we're synchronized with
    Incoming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum SuperframeTimer {
    StartCap(SuperframeKind),
    StartCfp(SuperframeKind),
    StartInactive(SuperframeKind),
    EndInactive(SuperframeKind),
}

/// The timeline of the host
pub trait Scheduler {
    fn now(&self) -> Instant;

    /// Schedule the timer to fire after the delay. Negative delays count as zero.
    ///
    /// Timers that are due at the same time fire in the order they were scheduled.
    fn schedule_after(&mut self, delay: Duration, timer: Timer) -> TimerHandle;

    /// Schedule the timer to fire after everything that's already due now
    fn schedule_now(&mut self, timer: Timer) -> TimerHandle {
        self.schedule_after(Duration::ZERO, timer)
    }

    /// Make sure the timer never fires.
    ///
    /// Cancelling a timer that already fired or was already cancelled does nothing.
    fn cancel(&mut self, handle: TimerHandle);
}

/// Holds the handle of at most one running timer
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TimerSlot(Option<TimerHandle>);

impl TimerSlot {
    pub const fn new() -> Self {
        Self(None)
    }

    /// Schedule the timer, cancelling the one that was in the slot
    pub fn arm(&mut self, scheduler: &mut impl Scheduler, delay: Duration, timer: Timer) {
        self.cancel(scheduler);
        self.0 = Some(scheduler.schedule_after(delay, timer));
    }

    pub fn cancel(&mut self, scheduler: &mut impl Scheduler) {
        if let Some(handle) = self.0.take() {
            scheduler.cancel(handle);
        }
    }

    /// Forget the handle of a timer that fired
    pub fn fired(&mut self) {
        self.0 = None;
    }

    pub fn is_armed(&self) -> bool {
        self.0.is_some()
    }
}

/// A queue that other execution contexts can push delayed work into.
///
/// The owner of the timeline drains it at the start of every event it processes and applies
/// each delay relative to its own current time. Items come out in the order they were pushed.
pub struct ContextInbox<T, const N: usize> {
    channel: Channel<CriticalSectionRawMutex, (Duration, T), N>,
}

impl<T, const N: usize> ContextInbox<T, N> {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Push an item that should be handled `delay` after the moment it's drained.
    /// Gives the item back if the inbox is full.
    pub fn push(&self, delay: Duration, item: T) -> Result<(), T> {
        self.channel
            .try_send((delay, item))
            .map_err(|TrySendError::Full((_, item))| item)
    }

    /// Hand everything that was pushed before the call to `f`, in push order.
    ///
    /// Items pushed while draining wait for the next call.
    pub fn drain(&self, mut f: impl FnMut(Duration, T)) {
        for _ in 0..self.channel.len() {
            match self.channel.try_receive() {
                Ok((delay, item)) => f(delay, item),
                Err(TryReceiveError::Empty) => break,
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

impl<T, const N: usize> Default for ContextInbox<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
