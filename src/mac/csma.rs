//! The CSMA-CA algorithm of 5.1.1.4
//!
//! Runs in unslotted mode in non beacon-enabled PANs and slotted mode, aligned to the backoff
//! period boundaries of a superframe, in beacon-enabled PANs. A run ends with a [`CsmaOutcome`].

use rand_core::RngCore;

use super::superframe::SuperframeTracker;
use crate::{
    consts::{CCA_TIME, UNIT_BACKOFF_PERIOD},
    phy::{Phy, PhyStatus},
    pib::MacPib,
    time::Duration,
    timer::{CsmaTimer, Scheduler, SuperframeKind, Timer, TimerSlot},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum CsmaOutcome {
    /// The channel is ours, the frame can be sent right away
    ChannelIdle,
    /// Too many busy channel assessments
    ChannelAccessFailure,
    /// The backoff doesn't fit in the current CAP and continues in the next one
    Deferred,
}

/// What CSMA-CA needs to know of the MAC while it runs
pub struct CsmaContext<'a, Rng: RngCore> {
    pub mac_pib: &'a MacPib,
    pub superframes: &'a SuperframeTracker,
    pub rng: &'a mut Rng,
}

#[derive(Debug, Default)]
pub struct CsmaCa {
    slotted: bool,
    battery_life_extension: bool,
    superframe: Option<SuperframeKind>,
    /// NB, the amount of backoffs in this run
    nb: u8,
    /// CW, the amount of idle CCAs still needed
    cw: u8,
    /// BE, the backoff exponent
    be: u8,
    cw0: u8,
    /// The symbols the CCAs, the frame and its acknowledgment take, for the end of CAP check
    transaction_symbols: u64,
    /// Backoff periods that didn't fit in the previous CAP
    random_backoff_periods_left: Option<u64>,
    cca_running: bool,
    random_backoff_timer: TimerSlot,
    request_cca_timer: TimerSlot,
    can_proceed_timer: TimerSlot,
    end_of_cap_timer: TimerSlot,
}

impl CsmaCa {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use unslotted CSMA-CA
    pub fn configure_unslotted(&mut self) {
        self.slotted = false;
        self.battery_life_extension = false;
        self.superframe = None;
        self.random_backoff_periods_left = None;
    }

    /// Use slotted CSMA-CA, each run contends in the CAP of the superframe it's started for
    pub fn configure_slotted(&mut self) {
        self.slotted = true;
    }

    /// Start a run for a transaction of `transaction_symbols` symbols.
    ///
    /// In slotted mode the run is aligned to `superframe` and has to fit in its CAP.
    /// A backoff that was deferred to this CAP keeps its NB and BE and continues
    /// with the periods it had left.
    pub fn start<Rng: RngCore>(
        &mut self,
        env: &mut (impl Phy + Scheduler),
        context: CsmaContext<'_, Rng>,
        superframe: SuperframeKind,
        transaction_symbols: u64,
    ) {
        self.cancel(env);

        self.superframe = self.slotted.then_some(superframe);
        self.battery_life_extension =
            self.slotted && context.superframes.battery_life_extension(superframe);

        let min_be = context.mac_pib.min_be;
        self.cw0 = env.get_phy_pib().current_page.cw0();
        self.cw = self.cw0;
        self.transaction_symbols = transaction_symbols;

        if self.random_backoff_periods_left.is_none() {
            self.nb = 0;
            self.be = if self.battery_life_extension {
                min_be.min(2)
            } else {
                min_be
            };
        }

        let delay = self.until_boundary(&*env, context.superframes);

        trace!(
            "CSMA-CA start, slotted: {}, BE: {}, transaction of {} symbols",
            self.slotted,
            self.be,
            transaction_symbols
        );

        self.random_backoff_timer
            .arm(env, delay, Timer::Csma(CsmaTimer::RandomBackoff));
    }

    pub fn handle_timer<Rng: RngCore>(
        &mut self,
        timer: CsmaTimer,
        env: &mut (impl Phy + Scheduler),
        context: CsmaContext<'_, Rng>,
    ) -> Option<CsmaOutcome> {
        match timer {
            CsmaTimer::RandomBackoff => {
                self.random_backoff_timer.fired();
                self.random_backoff(env, context);
                None
            }
            CsmaTimer::CanProceed => {
                self.can_proceed_timer.fired();
                self.can_proceed(env, context);
                None
            }
            CsmaTimer::RequestCca => {
                self.request_cca_timer.fired();
                self.cca_running = true;
                env.plme_cca_request();
                None
            }
            CsmaTimer::EndOfCap => {
                self.end_of_cap_timer.fired();
                debug!(
                    "CSMA-CA deferred to the next CAP with {:?} backoff periods left",
                    self.random_backoff_periods_left
                );
                Some(CsmaOutcome::Deferred)
            }
        }
    }

    pub fn cca_confirm<Rng: RngCore>(
        &mut self,
        status: PhyStatus,
        env: &mut (impl Phy + Scheduler),
        context: CsmaContext<'_, Rng>,
    ) -> Option<CsmaOutcome> {
        if !self.cca_running {
            trace!("Ignoring CCA confirm {:?}, no CCA was requested", status);
            return None;
        }
        self.cca_running = false;

        match status {
            PhyStatus::Idle if self.slotted => {
                self.cw = self.cw.saturating_sub(1);
                if self.cw == 0 {
                    return Some(CsmaOutcome::ChannelIdle);
                }

                let delay = self.until_boundary(&*env, context.superframes);
                self.request_cca_timer
                    .arm(env, delay, Timer::Csma(CsmaTimer::RequestCca));
                None
            }
            PhyStatus::Idle => Some(CsmaOutcome::ChannelIdle),
            status => {
                trace!("CCA reported {:?}, NB: {}", status, self.nb);

                self.cw = self.cw0;
                self.be = (self.be + 1).min(context.mac_pib.max_be);

                if self.nb >= context.mac_pib.max_csma_backoffs {
                    return Some(CsmaOutcome::ChannelAccessFailure);
                }
                self.nb += 1;

                let delay = self.until_boundary(&*env, context.superframes);
                self.random_backoff_timer
                    .arm(env, delay, Timer::Csma(CsmaTimer::RandomBackoff));
                None
            }
        }
    }

    /// Stop the run. Safe to call when nothing runs.
    pub fn cancel(&mut self, scheduler: &mut impl Scheduler) {
        self.random_backoff_timer.cancel(scheduler);
        self.request_cca_timer.cancel(scheduler);
        self.can_proceed_timer.cancel(scheduler);
        self.end_of_cap_timer.cancel(scheduler);
        self.cca_running = false;
    }

    /// Forget a deferred backoff, the next run starts fresh
    pub fn clear_residual(&mut self) {
        self.random_backoff_periods_left = None;
    }

    pub fn is_slotted(&self) -> bool {
        self.slotted
    }

    pub fn nb(&self) -> u8 {
        self.nb
    }

    pub fn cw(&self) -> u8 {
        self.cw
    }

    pub fn be(&self) -> u8 {
        self.be
    }

    pub fn random_backoff_periods_left(&self) -> Option<u64> {
        self.random_backoff_periods_left
    }

    fn until_boundary(
        &self,
        env: &(impl Phy + Scheduler),
        superframes: &SuperframeTracker,
    ) -> Duration {
        match self.superframe {
            Some(kind) => superframes.until_backoff_boundary(kind, env.now(), env.symbol_period()),
            None => Duration::ZERO,
        }
    }

    fn random_backoff<Rng: RngCore>(
        &mut self,
        env: &mut (impl Phy + Scheduler),
        context: CsmaContext<'_, Rng>,
    ) {
        let symbol_period = env.symbol_period();
        let backoff = match self.random_backoff_periods_left.take() {
            Some(periods) => periods,
            None => (context.rng.next_u32() & ((1u32 << self.be) - 1)) as u64,
        };

        trace!("CSMA-CA backoff of {} periods, BE: {}", backoff, self.be);

        let backoff_duration =
            Duration::from_symbols(backoff * UNIT_BACKOFF_PERIOD as u64, symbol_period);

        let Some(kind) = self.superframe else {
            self.request_cca_timer.arm(
                env,
                backoff_duration,
                Timer::Csma(CsmaTimer::RequestCca),
            );
            return;
        };

        let now = env.now();
        let periods_left = if context.superframes.in_cap(kind, now, symbol_period) {
            context
                .superframes
                .backoff_periods_left_in_cap(kind, now, symbol_period)
        } else {
            0
        };

        if backoff > periods_left {
            self.random_backoff_periods_left = Some(backoff - periods_left);
            let cap_end = context.superframes.cap_end(kind, symbol_period);
            self.end_of_cap_timer.arm(
                env,
                (cap_end - now).max_zero(),
                Timer::Csma(CsmaTimer::EndOfCap),
            );
        } else {
            self.can_proceed_timer.arm(
                env,
                backoff_duration,
                Timer::Csma(CsmaTimer::CanProceed),
            );
        }
    }

    /// The CCAs and the whole transaction must fit in what's left of the CAP
    fn can_proceed<Rng: RngCore>(
        &mut self,
        env: &mut (impl Phy + Scheduler),
        context: CsmaContext<'_, Rng>,
    ) {
        let Some(kind) = self.superframe else {
            self.request_cca_timer
                .arm(env, Duration::ZERO, Timer::Csma(CsmaTimer::RequestCca));
            return;
        };

        let symbol_period = env.symbol_period();
        let now = env.now();
        let cap_end = context.superframes.cap_end(kind, symbol_period);
        let remaining = (cap_end - now).as_symbols(symbol_period);
        let needed = CCA_TIME as u64 * self.cw as u64 + self.transaction_symbols;

        if needed > remaining || !context.superframes.in_cap(kind, now, symbol_period) {
            debug!(
                "Transaction of {} symbols doesn't fit in the {} symbols left of the CAP",
                needed,
                remaining
            );
            self.end_of_cap_timer.arm(
                env,
                (cap_end - now).max_zero(),
                Timer::Csma(CsmaTimer::EndOfCap),
            );
        } else {
            self.request_cca_timer
                .arm(env, Duration::ZERO, Timer::Csma(CsmaTimer::RequestCca));
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec::Vec;

    use super::*;
    use crate::{
        phy::TrxState,
        pib::{PhyPib, PhyPibWrite},
        time::Instant,
        timer::{SuperframeTimer, TimerHandle},
        wire::{
            beacon::{BeaconOrder, SuperframeOrder, SuperframeSpecification},
            ExtendedAddress,
        },
    };

    const SYMBOL: Duration = Duration::from_micros(16);

    /// Returns the same value for every draw
    struct FixedRng(u32);

    impl RngCore for FixedRng {
        fn next_u32(&mut self) -> u32 {
            self.0
        }

        fn next_u64(&mut self) -> u64 {
            self.0 as u64
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(self.0 as u8);
        }
    }

    struct TestEnv {
        now: Instant,
        next: u64,
        phy_pib: PhyPib,
        scheduled: Vec<(TimerHandle, Instant, Timer)>,
        cca_requests: usize,
    }

    impl TestEnv {
        fn new() -> Self {
            Self {
                now: Instant::ZERO,
                next: 0,
                phy_pib: PhyPib::o_qpsk_2450(),
                scheduled: Vec::new(),
                cca_requests: 0,
            }
        }

        /// Jump to the first pending timer and hand it out
        fn next_timer(&mut self) -> Timer {
            let index = (0..self.scheduled.len())
                .min_by_key(|&i| (self.scheduled[i].1, self.scheduled[i].0))
                .expect("a timer is pending");
            let (_, at, timer) = self.scheduled.remove(index);
            self.now = at;
            timer
        }
    }

    impl Scheduler for TestEnv {
        fn now(&self) -> Instant {
            self.now
        }

        fn schedule_after(&mut self, delay: Duration, timer: Timer) -> TimerHandle {
            self.next += 1;
            let handle = TimerHandle(self.next);
            self.scheduled
                .push((handle, self.now + delay.max_zero(), timer));
            handle
        }

        fn cancel(&mut self, handle: TimerHandle) {
            self.scheduled.retain(|(h, _, _)| *h != handle);
        }
    }

    impl Phy for TestEnv {
        fn pd_data_request(&mut self, _psdu: &[u8]) {}

        fn plme_set_trx_state_request(&mut self, _state: TrxState) {}

        fn plme_cca_request(&mut self) {
            self.cca_requests += 1;
        }

        fn get_phy_pib(&self) -> &PhyPib {
            &self.phy_pib
        }

        fn update_phy_pib<U>(&mut self, f: impl FnOnce(&mut PhyPibWrite) -> U) -> U {
            f(&mut self.phy_pib.pib_write)
        }

        fn symbol_period(&self) -> Duration {
            SYMBOL
        }
    }

    fn mac_pib() -> MacPib {
        MacPib::new(ExtendedAddress(1), 0, 0)
    }

    fn context<'a>(
        mac_pib: &'a MacPib,
        superframes: &'a SuperframeTracker,
        rng: &'a mut FixedRng,
    ) -> CsmaContext<'a, FixedRng> {
        CsmaContext {
            mac_pib,
            superframes,
            rng,
        }
    }

    /// Fire timers until the next CCA is requested
    fn run_to_cca(
        csma: &mut CsmaCa,
        env: &mut TestEnv,
        mac_pib: &MacPib,
        superframes: &SuperframeTracker,
        rng: &mut FixedRng,
    ) -> Option<CsmaOutcome> {
        let requests = env.cca_requests;
        while env.cca_requests == requests {
            let Timer::Csma(timer) = env.next_timer() else {
                continue;
            };
            if let Some(outcome) = csma.handle_timer(timer, env, context(mac_pib, superframes, rng))
            {
                return Some(outcome);
            }
        }
        None
    }

    #[test_log::test]
    fn busy_channel_ends_in_access_failure() {
        let mut env = TestEnv::new();
        let mac_pib = mac_pib();
        let superframes = SuperframeTracker::new();
        let mut rng = FixedRng(0xffff_ffff);
        let mut csma = CsmaCa::new();

        csma.start(
            &mut env,
            context(&mac_pib, &superframes, &mut rng),
            SuperframeKind::Incoming,
            100,
        );

        let mut outcome = None;
        let mut backoffs = Vec::new();
        while outcome.is_none() {
            let before = env.now;
            assert_eq!(
                run_to_cca(&mut csma, &mut env, &mac_pib, &superframes, &mut rng),
                None
            );
            backoffs.push((env.now - before).as_symbols(SYMBOL) / UNIT_BACKOFF_PERIOD as u64);
            outcome = csma.cca_confirm(
                PhyStatus::Busy,
                &mut env,
                context(&mac_pib, &superframes, &mut rng),
            );
        }

        // BE goes 3, 4, 5 and then stays at macMaxBE
        pretty_assertions::assert_eq!(backoffs, [7, 15, 31, 31, 31]);
        assert_eq!(outcome, Some(CsmaOutcome::ChannelAccessFailure));
        assert_eq!(csma.nb(), mac_pib.max_csma_backoffs);
        assert_eq!(env.cca_requests, 5);
    }

    #[test_log::test]
    fn unslotted_idle_channel() {
        let mut env = TestEnv::new();
        let mac_pib = mac_pib();
        let superframes = SuperframeTracker::new();
        let mut rng = FixedRng(2);
        let mut csma = CsmaCa::new();

        csma.start(
            &mut env,
            context(&mac_pib, &superframes, &mut rng),
            SuperframeKind::Incoming,
            100,
        );
        run_to_cca(&mut csma, &mut env, &mac_pib, &superframes, &mut rng);

        assert_eq!(env.now, Instant::ZERO + Duration::from_symbols(40, SYMBOL));
        assert_eq!(
            csma.cca_confirm(
                PhyStatus::Idle,
                &mut env,
                context(&mac_pib, &superframes, &mut rng)
            ),
            Some(CsmaOutcome::ChannelIdle)
        );

        // A late confirm is not ours
        assert_eq!(
            csma.cca_confirm(
                PhyStatus::Busy,
                &mut env,
                context(&mac_pib, &superframes, &mut rng)
            ),
            None
        );
    }

    fn slotted_setup(env: &mut TestEnv, superframes: &mut SuperframeTracker) {
        // BO = SO = 0: the CAP covers the whole 960 symbol superframe
        superframes.configure(
            SuperframeKind::Incoming,
            &SuperframeSpecification {
                beacon_order: BeaconOrder::from(0),
                superframe_order: SuperframeOrder::from(0),
                final_cap_slot: 15,
                battery_life_extension: false,
                pan_coordinator: true,
                association_permit: false,
            },
        );
        superframes.restart(SuperframeKind::Incoming, Instant::ZERO, env);
        let Timer::Superframe(timer @ SuperframeTimer::StartCap(_)) = env.next_timer() else {
            panic!("CAP must start first");
        };
        superframes.handle_timer(timer, env, SYMBOL);
    }

    #[test_log::test]
    fn slotted_needs_two_idle_ccas() {
        let mut env = TestEnv::new();
        let mac_pib = mac_pib();
        let mut superframes = SuperframeTracker::new();
        let mut rng = FixedRng(1);
        let mut csma = CsmaCa::new();

        slotted_setup(&mut env, &mut superframes);
        csma.configure_slotted();

        env.now = Instant::ZERO + Duration::from_symbols(5, SYMBOL);
        csma.start(
            &mut env,
            context(&mac_pib, &superframes, &mut rng),
            SuperframeKind::Incoming,
            100,
        );

        run_to_cca(&mut csma, &mut env, &mac_pib, &superframes, &mut rng);
        // Aligned to 20, then one backoff period
        assert_eq!(env.now, Instant::ZERO + Duration::from_symbols(40, SYMBOL));
        assert_eq!(csma.cw(), 2);

        env.now += Duration::from_symbols(CCA_TIME as u64, SYMBOL);
        assert_eq!(
            csma.cca_confirm(
                PhyStatus::Idle,
                &mut env,
                context(&mac_pib, &superframes, &mut rng)
            ),
            None
        );
        assert_eq!(csma.cw(), 1);

        // A busy second CCA resets the contention window
        run_to_cca(&mut csma, &mut env, &mac_pib, &superframes, &mut rng);
        assert_eq!(env.now, Instant::ZERO + Duration::from_symbols(60, SYMBOL));
        assert_eq!(
            csma.cca_confirm(
                PhyStatus::Busy,
                &mut env,
                context(&mac_pib, &superframes, &mut rng)
            ),
            None
        );
        assert_eq!(csma.cw(), 2);
        assert_eq!(csma.nb(), 1);
        assert_eq!(csma.be(), 4);

        run_to_cca(&mut csma, &mut env, &mac_pib, &superframes, &mut rng);
        csma.cca_confirm(
            PhyStatus::Idle,
            &mut env,
            context(&mac_pib, &superframes, &mut rng),
        );
        run_to_cca(&mut csma, &mut env, &mac_pib, &superframes, &mut rng);
        assert_eq!(
            csma.cca_confirm(
                PhyStatus::Idle,
                &mut env,
                context(&mac_pib, &superframes, &mut rng)
            ),
            Some(CsmaOutcome::ChannelIdle)
        );
    }

    #[test_log::test]
    fn backoff_past_the_cap_is_deferred() {
        let mut env = TestEnv::new();
        let mac_pib = mac_pib();
        let mut superframes = SuperframeTracker::new();
        let mut rng = FixedRng(5);
        let mut csma = CsmaCa::new();

        slotted_setup(&mut env, &mut superframes);
        csma.configure_slotted();

        // Two backoff periods before the end of the CAP
        env.now = Instant::ZERO + Duration::from_symbols(920, SYMBOL);
        csma.start(
            &mut env,
            context(&mac_pib, &superframes, &mut rng),
            SuperframeKind::Incoming,
            10,
        );

        assert_eq!(
            run_to_cca(&mut csma, &mut env, &mac_pib, &superframes, &mut rng),
            Some(CsmaOutcome::Deferred)
        );
        assert_eq!(env.now, Instant::ZERO + Duration::from_symbols(960, SYMBOL));
        assert_eq!(csma.random_backoff_periods_left(), Some(3));
        assert_eq!(env.cca_requests, 0);

        csma.clear_residual();
        assert_eq!(csma.random_backoff_periods_left(), None);
    }

    #[test_log::test]
    fn battery_life_extension_follows_the_chosen_superframe() {
        let mut env = TestEnv::new();
        let mac_pib = mac_pib();
        let mut superframes = SuperframeTracker::new();
        let mut rng = FixedRng(0);
        let mut csma = CsmaCa::new();

        superframes.configure(
            SuperframeKind::Incoming,
            &SuperframeSpecification {
                beacon_order: BeaconOrder::from(0),
                superframe_order: SuperframeOrder::from(0),
                final_cap_slot: 15,
                battery_life_extension: true,
                pan_coordinator: true,
                association_permit: false,
            },
        );
        csma.configure_slotted();

        csma.start(
            &mut env,
            context(&mac_pib, &superframes, &mut rng),
            SuperframeKind::Incoming,
            100,
        );
        assert_eq!(csma.be(), 2);

        csma.start(
            &mut env,
            context(&mac_pib, &superframes, &mut rng),
            SuperframeKind::Outgoing,
            100,
        );
        assert_eq!(csma.be(), mac_pib.min_be);
    }

    #[test_log::test]
    fn cancel_twice() {
        let mut env = TestEnv::new();
        let mac_pib = mac_pib();
        let superframes = SuperframeTracker::new();
        let mut rng = FixedRng(3);
        let mut csma = CsmaCa::new();

        csma.start(
            &mut env,
            context(&mac_pib, &superframes, &mut rng),
            SuperframeKind::Incoming,
            100,
        );
        assert_eq!(env.scheduled.len(), 1);

        csma.cancel(&mut env);
        csma.cancel(&mut env);
        assert!(env.scheduled.is_empty());
        assert_eq!(
            csma.cca_confirm(
                PhyStatus::Idle,
                &mut env,
                context(&mac_pib, &superframes, &mut rng)
            ),
            None
        );
    }
}
