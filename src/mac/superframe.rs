//! Superframe timing, 5.1.1.1
//!
//! A node takes part in at most two superframes: the one started by its own beacons and the
//! one of the coordinator it's synchronized with. Each runs through
//! beacon → CAP → CFP → inactive → beacon, driven by [`SuperframeTimer`]s.

use crate::{
    consts::{BASE_SUPERFRAME_DURATION, NUM_SUPERFRAME_SLOTS, UNIT_BACKOFF_PERIOD},
    time::{Duration, Instant},
    timer::{Scheduler, SuperframeKind, SuperframeTimer, Timer, TimerSlot},
    wire::beacon::{active_orders, SuperframeSpecification},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum SuperframePeriod {
    /// Not taking part in this superframe
    Off,
    /// Sending or waiting for the beacon that starts the superframe
    Beacon,
    Cap,
    Cfp,
    Inactive,
}

/// Something the owner of the tracker has to act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuperframeEvent {
    CapStarted(SuperframeKind),
    /// Our own beacon has to go out
    BeaconDue,
}

#[derive(Debug)]
struct Superframe {
    period: SuperframePeriod,
    beacon_time: Instant,
    beacon_order: u8,
    superframe_order: u8,
    final_cap_slot: u8,
    battery_life_extension: bool,
    timer: TimerSlot,
}

impl Superframe {
    const fn new() -> Self {
        Self {
            period: SuperframePeriod::Off,
            beacon_time: Instant::ZERO,
            beacon_order: 15,
            superframe_order: 15,
            final_cap_slot: 15,
            battery_life_extension: false,
            timer: TimerSlot::new(),
        }
    }

    fn beacon_interval(&self) -> u64 {
        (BASE_SUPERFRAME_DURATION as u64) << self.beacon_order
    }

    fn active_duration(&self) -> u64 {
        (BASE_SUPERFRAME_DURATION as u64) << self.superframe_order
    }

    fn slot_duration(&self) -> u64 {
        self.active_duration() / NUM_SUPERFRAME_SLOTS as u64
    }

    fn cap_duration(&self) -> u64 {
        self.slot_duration() * (self.final_cap_slot as u64 + 1)
    }

    fn cfp_duration(&self) -> u64 {
        self.active_duration() - self.cap_duration()
    }

    fn inactive_duration(&self) -> u64 {
        self.beacon_interval() - self.active_duration()
    }

    /// Arm the timer for `symbols` after the beacon
    fn schedule_at(
        &mut self,
        scheduler: &mut impl Scheduler,
        symbols: u64,
        symbol_period: Duration,
        timer: SuperframeTimer,
    ) {
        let at = self.beacon_time + Duration::from_symbols(symbols, symbol_period);
        let delay = at - scheduler.now();
        self.timer
            .arm(scheduler, delay.max_zero(), Timer::Superframe(timer));
    }
}

#[derive(Debug)]
pub struct SuperframeTracker {
    outgoing: Superframe,
    incoming: Superframe,
}

impl SuperframeTracker {
    pub const fn new() -> Self {
        Self {
            outgoing: Superframe::new(),
            incoming: Superframe::new(),
        }
    }

    fn get(&self, kind: SuperframeKind) -> &Superframe {
        match kind {
            SuperframeKind::Outgoing => &self.outgoing,
            SuperframeKind::Incoming => &self.incoming,
        }
    }

    fn get_mut(&mut self, kind: SuperframeKind) -> &mut Superframe {
        match kind {
            SuperframeKind::Outgoing => &mut self.outgoing,
            SuperframeKind::Incoming => &mut self.incoming,
        }
    }

    /// Take over the timing parameters of a superframe specification.
    ///
    /// The durations are updated right away, a running period keeps its timer.
    /// Returns false if the specification doesn't describe a beacon-enabled superframe.
    pub fn configure(&mut self, kind: SuperframeKind, spec: &SuperframeSpecification) -> bool {
        let Some((bo, so)) = active_orders(spec) else {
            return false;
        };

        let superframe = self.get_mut(kind);
        superframe.beacon_order = bo;
        superframe.superframe_order = so;
        superframe.final_cap_slot = spec.final_cap_slot.min(NUM_SUPERFRAME_SLOTS as u8 - 1);
        superframe.battery_life_extension = spec.battery_life_extension;

        if superframe.period == SuperframePeriod::Off {
            superframe.period = SuperframePeriod::Beacon;
        }

        true
    }

    /// Stop taking part in the superframe
    pub fn stop(&mut self, kind: SuperframeKind, scheduler: &mut impl Scheduler) {
        let superframe = self.get_mut(kind);
        superframe.timer.cancel(scheduler);
        superframe.period = SuperframePeriod::Off;
    }

    /// A beacon was sent or received at `beacon_time`, the superframe starts over from there
    pub fn restart(
        &mut self,
        kind: SuperframeKind,
        beacon_time: Instant,
        scheduler: &mut impl Scheduler,
    ) {
        let superframe = self.get_mut(kind);
        superframe.beacon_time = beacon_time;
        superframe.period = SuperframePeriod::Beacon;
        superframe.timer.arm(
            scheduler,
            Duration::ZERO,
            Timer::Superframe(SuperframeTimer::StartCap(kind)),
        );
    }

    /// Move to the next period
    pub fn handle_timer(
        &mut self,
        timer: SuperframeTimer,
        scheduler: &mut impl Scheduler,
        symbol_period: Duration,
    ) -> Option<SuperframeEvent> {
        let (kind, next_period) = match timer {
            SuperframeTimer::StartCap(kind) => (kind, SuperframePeriod::Cap),
            SuperframeTimer::StartCfp(kind) => (kind, SuperframePeriod::Cfp),
            SuperframeTimer::StartInactive(kind) => (kind, SuperframePeriod::Inactive),
            SuperframeTimer::EndInactive(kind) => (kind, SuperframePeriod::Beacon),
        };

        let superframe = self.get_mut(kind);
        superframe.timer.fired();

        if superframe.period == SuperframePeriod::Off {
            trace!("Superframe {:?} is off, ignoring {:?}", kind, timer);
            return None;
        }

        trace!("Superframe {:?}: {:?}", kind, next_period);
        superframe.period = next_period;

        let cap = superframe.cap_duration();
        let active = superframe.active_duration();
        let interval = superframe.beacon_interval();

        let (at, next) = match next_period {
            SuperframePeriod::Cap if superframe.cfp_duration() > 0 => {
                (cap, SuperframeTimer::StartCfp(kind))
            }
            SuperframePeriod::Cap | SuperframePeriod::Cfp
                if superframe.inactive_duration() > 0 =>
            {
                (active, SuperframeTimer::StartInactive(kind))
            }
            SuperframePeriod::Cap | SuperframePeriod::Cfp | SuperframePeriod::Inactive => {
                (interval, SuperframeTimer::EndInactive(kind))
            }
            SuperframePeriod::Beacon | SuperframePeriod::Off => {
                return match kind {
                    SuperframeKind::Outgoing => Some(SuperframeEvent::BeaconDue),
                    // Wait for the beacon of the coordinator to restart the superframe
                    SuperframeKind::Incoming => None,
                };
            }
        };

        superframe.schedule_at(scheduler, at, symbol_period, next);

        match next_period {
            SuperframePeriod::Cap => Some(SuperframeEvent::CapStarted(kind)),
            _ => None,
        }
    }

    pub fn period(&self, kind: SuperframeKind) -> SuperframePeriod {
        self.get(kind).period
    }

    pub fn is_active(&self, kind: SuperframeKind) -> bool {
        self.get(kind).period != SuperframePeriod::Off
    }

    pub fn beacon_time(&self, kind: SuperframeKind) -> Instant {
        self.get(kind).beacon_time
    }

    pub fn battery_life_extension(&self, kind: SuperframeKind) -> bool {
        self.get(kind).battery_life_extension
    }

    /// The moment the CAP of the current superframe ends
    pub fn cap_end(&self, kind: SuperframeKind, symbol_period: Duration) -> Instant {
        let superframe = self.get(kind);
        superframe.beacon_time + Duration::from_symbols(superframe.cap_duration(), symbol_period)
    }

    /// True if the superframe is in its CAP and the CAP hasn't run out yet
    pub fn in_cap(&self, kind: SuperframeKind, now: Instant, symbol_period: Duration) -> bool {
        self.get(kind).period == SuperframePeriod::Cap && now < self.cap_end(kind, symbol_period)
    }

    /// The amount of whole backoff periods left in the CAP
    pub fn backoff_periods_left_in_cap(
        &self,
        kind: SuperframeKind,
        now: Instant,
        symbol_period: Duration,
    ) -> u64 {
        (self.cap_end(kind, symbol_period) - now).as_symbols(symbol_period)
            / UNIT_BACKOFF_PERIOD as u64
    }

    /// The time until the next backoff period boundary, counted from the beacon
    pub fn until_backoff_boundary(
        &self,
        kind: SuperframeKind,
        now: Instant,
        symbol_period: Duration,
    ) -> Duration {
        let unit = Duration::from_symbols(UNIT_BACKOFF_PERIOD as u64, symbol_period);
        let elapsed = (now - self.beacon_time(kind)).max_zero();

        match elapsed.ticks() % unit.ticks() {
            0 => Duration::ZERO,
            remainder => unit - Duration::from_ticks(remainder),
        }
    }
}

impl Default for SuperframeTracker {
    fn default() -> Self {
        Self::new()
    }
}
