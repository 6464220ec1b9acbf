use core::fmt::Display;

use rand_core::RngCore;

use crate::{
    phy::{Phy, PhyStatus, TrxState},
    pib::MacPib,
    sap::{data::DataConfirm, poll::PollConfirm, SentFrameReport, Status, UpperLayer},
    time::{Duration, Instant},
    timer::{Scheduler, StateChange, SuperframeKind, Timer, TimerSlot},
    wire::{self, Address, ExtendedAddress, Frame, FrameContent, FrameType, ShortAddress},
    DeviceType,
};

pub mod csma;
mod mcps_data;
mod mlme_get;
mod mlme_poll;
mod mlme_reset;
mod mlme_set;
mod mlme_start;
mod mlme_sync;
pub mod pending;
mod rx;
pub mod state;
pub mod superframe;

use csma::{CsmaCa, CsmaContext, CsmaOutcome};
use pending::PendingQueue;
use state::{OutgoingFrame, TxOrigin, TxQueue, TxSlot};
pub use state::{MacCounters, MacState};
use superframe::{SuperframeEvent, SuperframeTracker};

/// Everything the MAC talks to: the PHY below it, the timeline it runs on and the higher layer
pub trait Environment: Phy + Scheduler + UpperLayer {}

impl<T: Phy + Scheduler + UpperLayer> Environment for T {}

/// Configuration for the MAC layer
#[derive(Debug, Clone)]
pub struct MacConfig<Rng: RngCore> {
    /// The unique EUI-64 address used by the mac layer
    pub extended_address: ExtendedAddress,
    pub rng: Rng,
    pub device_type: DeviceType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum MacError {
    /// The PHY confirmed a transceiver state that doesn't fit what the MAC is doing
    InconsistentTransceiverState { state: MacState, status: PhyStatus },
}

impl Display for MacError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl core::error::Error for MacError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SyncState {
    track: bool,
    lost_beacons: u32,
}

/// The MAC sublayer of one node.
///
/// The MAC never blocks. Every method handles one event and returns, anything that has to happen
/// later is scheduled on the [`Scheduler`] of the environment and comes back in through
/// [`Mac::handle_timer`].
pub struct Mac<Rng: RngCore> {
    mac_pib: MacPib,
    device_type: DeviceType,
    rng: Rng,
    state: MacState,
    tx_queue: TxQueue,
    tx_slot: TxSlot,
    pending: PendingQueue,
    csma: CsmaCa,
    superframes: SuperframeTracker,

    /// Retransmissions of the head of the queue
    retries: u8,
    /// CSMA-CA backoffs of the head of the queue over all its attempts
    csma_attempts: u32,
    /// When the head of the queue started on air, for its confirm
    head_tx_time: Option<Instant>,

    is_pan_coordinator: bool,
    /// We send beacons and run the outgoing superframe
    beaconing: bool,
    sync: Option<SyncState>,
    /// The device whose data request we're acknowledging with the frame pending bit set
    pending_data_request: Option<Address>,

    change_state_timer: TimerSlot,
    ack_wait_timer: TimerSlot,
    ifs_timer: TimerSlot,
    poll_wait_timer: TimerSlot,
    beacon_timer: TimerSlot,
    beacon_search_timer: TimerSlot,

    counters: MacCounters,
}

impl<Rng: RngCore> Mac<Rng> {
    pub fn new(config: MacConfig<Rng>) -> Self {
        let MacConfig {
            extended_address,
            mut rng,
            device_type,
        } = config;

        let dsn = rng.next_u32() as u8;
        let bsn = rng.next_u32() as u8;

        Self {
            mac_pib: MacPib::new(extended_address, dsn, bsn),
            device_type,
            rng,
            state: MacState::Idle,
            tx_queue: TxQueue::new(),
            tx_slot: TxSlot::Empty,
            pending: PendingQueue::new(),
            csma: CsmaCa::new(),
            superframes: SuperframeTracker::new(),
            retries: 0,
            csma_attempts: 0,
            head_tx_time: None,
            is_pan_coordinator: false,
            beaconing: false,
            sync: None,
            pending_data_request: None,
            change_state_timer: TimerSlot::new(),
            ack_wait_timer: TimerSlot::new(),
            ifs_timer: TimerSlot::new(),
            poll_wait_timer: TimerSlot::new(),
            beacon_timer: TimerSlot::new(),
            beacon_search_timer: TimerSlot::new(),
            counters: MacCounters::default(),
        }
    }

    pub fn mac_pib(&self) -> &MacPib {
        &self.mac_pib
    }

    pub fn state(&self) -> MacState {
        self.state
    }

    pub fn counters(&self) -> &MacCounters {
        &self.counters
    }

    /// The amount of frames waiting for direct transmission, the one in flight included
    pub fn tx_queue_len(&self) -> usize {
        self.tx_queue.len()
    }

    /// The amount of indirect transactions waiting to be picked up
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn csma(&self) -> &CsmaCa {
        &self.csma
    }

    pub fn superframes(&self) -> &SuperframeTracker {
        &self.superframes
    }

    pub fn is_pan_coordinator(&self) -> bool {
        self.is_pan_coordinator
    }

    /// Hand back a timer that was scheduled by this MAC and is now due
    pub fn handle_timer(&mut self, env: &mut impl Environment, timer: Timer) {
        trace!("Timer {:?} fired", timer);

        match timer {
            Timer::ChangeState(change) => {
                self.change_state_timer.fired();
                self.change_state(env, change);
            }
            Timer::AckWait => {
                self.ack_wait_timer.fired();
                self.ack_wait_expired(env);
            }
            Timer::Ifs => {
                self.ifs_timer.fired();
                self.check_queue(env);
            }
            Timer::PollWait => {
                self.poll_wait_timer.fired();
                self.poll_wait_expired(env);
            }
            Timer::Beacon => {
                self.beacon_timer.fired();
                self.send_beacon(env);
            }
            Timer::Csma(timer) => {
                let outcome = self.csma.handle_timer(
                    timer,
                    env,
                    CsmaContext {
                        mac_pib: &self.mac_pib,
                        superframes: &self.superframes,
                        rng: &mut self.rng,
                    },
                );

                if let Some(outcome) = outcome {
                    self.csma_outcome(env, outcome);
                }
            }
            Timer::BeaconSearchTimeout => {
                self.beacon_search_timer.fired();
                self.beacon_search_timeout(env);
            }
            Timer::Superframe(timer) => {
                let symbol_period = env.symbol_period();
                match self.superframes.handle_timer(timer, env, symbol_period) {
                    Some(SuperframeEvent::CapStarted(_)) => self.check_queue(env),
                    Some(SuperframeEvent::BeaconDue) => self.send_beacon(env),
                    None => {}
                }
            }
        }
    }

    /// The outcome of [`Phy::plme_set_trx_state_request`]
    pub fn plme_set_trx_state_confirm(
        &mut self,
        env: &mut impl Environment,
        status: PhyStatus,
    ) -> Result<(), MacError> {
        match (self.state, status) {
            (MacState::Sending, PhyStatus::TxOn | PhyStatus::Success) => self.transmit(env),
            (MacState::Csma, PhyStatus::RxOn | PhyStatus::Success) => self.start_csma(env),
            (MacState::Idle, PhyStatus::RxOn | PhyStatus::TrxOff | PhyStatus::Success) => {}
            (MacState::AckPending, PhyStatus::RxOn | PhyStatus::Success) => {}
            (state, status) => {
                error!(
                    "Transceiver state {:?} confirmed while the MAC is {:?}",
                    status,
                    state
                );
                return Err(MacError::InconsistentTransceiverState { state, status });
            }
        }

        Ok(())
    }

    /// The outcome of [`Phy::plme_cca_request`]
    pub fn plme_cca_confirm(&mut self, env: &mut impl Environment, status: PhyStatus) {
        let outcome = self.csma.cca_confirm(
            status,
            env,
            CsmaContext {
                mac_pib: &self.mac_pib,
                superframes: &self.superframes,
                rng: &mut self.rng,
            },
        );

        if let Some(outcome) = outcome {
            self.csma_outcome(env, outcome);
        }
    }

    /// The outcome of [`Phy::pd_data_request`]
    pub fn pd_data_confirm(&mut self, env: &mut impl Environment, status: PhyStatus) {
        if self.state != MacState::Sending {
            warn!("Ignoring data confirm {:?} in state {:?}", status, self.state);
            return;
        }

        let symbol_period = env.symbol_period();
        let slot = core::mem::take(&mut self.tx_slot);

        match (status, slot) {
            (PhyStatus::Success, TxSlot::Beacon(frame)) => {
                let tx_time = self.on_air_since(&*env, frame.psdu.len());
                debug!("Beacon {} sent at {}", frame.seq, tx_time);

                self.mac_pib.beacon_tx_time = tx_time;
                self.counters.beacons_sent += 1;
                self.superframes
                    .restart(SuperframeKind::Outgoing, tx_time, env);
                self.after_successful_send(env, frame.psdu.len());
            }
            (PhyStatus::Success, TxSlot::Ack(frame)) => {
                self.counters.acks_sent += 1;
                if let Some(device) = self.pending_data_request.take() {
                    self.serve_data_request(env, device);
                }
                self.after_successful_send(env, frame.psdu.len());
            }
            (PhyStatus::Success, TxSlot::QueueHead) => {
                let Some(head) = self.tx_queue.front() else {
                    warn!("Data confirm without a frame in the queue");
                    self.defer_state_change(env, StateChange::Idle);
                    return;
                };
                let len = head.frame.psdu.len();
                let ack_request = head.frame.ack_request;
                let tx_time = self.on_air_since(&*env, len);

                if ack_request {
                    let ack_wait = self.mac_pib.ack_wait_duration(env.get_phy_pib());
                    self.head_tx_time = Some(tx_time);
                    self.tx_slot = TxSlot::QueueHead;
                    self.ack_wait_timer.arm(
                        env,
                        Duration::from_symbols(ack_wait as u64, symbol_period),
                        Timer::AckWait,
                    );
                    self.set_state(MacState::AckPending);
                    env.plme_set_trx_state_request(TrxState::RxOn);
                } else {
                    self.finish_head(env, Status::Success, Some(tx_time));
                    self.after_successful_send(env, len);
                }
            }
            (PhyStatus::FrameTooLong, TxSlot::QueueHead) => {
                warn!("The PHY rejected the frame as too long");
                self.finish_head(env, Status::FrameTooLong, None);
                self.defer_state_change(env, StateChange::Idle);
            }
            (status, TxSlot::QueueHead) => {
                warn!("Sending failed with {:?}", status);
                self.tx_slot = TxSlot::QueueHead;
                self.prepare_retransmission(env);
            }
            (status, _) => {
                warn!("Sending a beacon or acknowledgment failed with {:?}", status);
                self.defer_state_change(env, StateChange::Idle);
            }
        }
    }

    /// Start the head of the queue if nothing stands in the way
    fn check_queue(&mut self, env: &mut impl Environment) {
        if self.state != MacState::Idle
            || self.tx_queue.is_empty()
            || self.change_state_timer.is_armed()
            || self.ifs_timer.is_armed()
        {
            return;
        }

        if let Some(head) = self.tx_queue.front().filter(|_| self.csma.is_slotted()) {
            let kind = self.csma_superframe(head.frame.destination);
            if !self
                .superframes
                .in_cap(kind, env.now(), env.symbol_period())
            {
                trace!("Waiting for the CAP of the {:?} superframe", kind);
                return;
            }
        }

        self.tx_slot = TxSlot::QueueHead;
        self.defer_state_change(env, StateChange::Csma);
    }

    fn change_state(&mut self, env: &mut impl Environment, change: StateChange) {
        match change {
            StateChange::Idle => {
                self.set_state(MacState::Idle);
                self.tx_slot = TxSlot::Empty;
                env.plme_set_trx_state_request(self.idle_trx_state());
                self.check_queue(env);
            }
            StateChange::Csma => {
                self.set_state(MacState::Csma);
                env.plme_set_trx_state_request(TrxState::RxOn);
            }
            StateChange::SendAck { seq, frame_pending } => {
                let mut header = wire::header(FrameType::Acknowledgement, seq, None, None);
                header.frame_pending = frame_pending;

                let ack = Frame {
                    header,
                    content: FrameContent::Acknowledgement,
                    payload: heapless::Vec::new(),
                };

                match OutgoingFrame::new(&ack) {
                    Ok(ack) => {
                        self.tx_slot = TxSlot::Ack(ack);
                        self.set_state(MacState::Sending);
                        env.plme_set_trx_state_request(TrxState::TxOn);
                    }
                    Err(e) => {
                        error!("Could not build the acknowledgment: {:?}", e);
                        self.change_state(env, StateChange::Idle);
                    }
                }
            }
        }
    }

    fn defer_state_change(&mut self, env: &mut impl Environment, change: StateChange) {
        self.change_state_timer
            .arm(env, Duration::ZERO, Timer::ChangeState(change));
    }

    fn set_state(&mut self, state: MacState) {
        if self.state != state {
            trace!("MAC state {:?} -> {:?}", self.state, state);
        }
        self.state = state;
    }

    /// The receiver stays on when idle if the PIB asks for it or when we expect frames
    fn idle_trx_state(&self) -> TrxState {
        if self.mac_pib.rx_on_when_idle
            || self.poll_wait_timer.is_armed()
            || self.sync.is_some()
            || self.is_pan_coordinator
        {
            TrxState::RxOn
        } else {
            TrxState::TrxOff
        }
    }

    /// Apply a changed receiver policy right away if nothing else is going on
    fn refresh_receiver(&mut self, env: &mut impl Environment) {
        if self.state == MacState::Idle && !self.change_state_timer.is_armed() {
            env.plme_set_trx_state_request(self.idle_trx_state());
        }
    }

    /// The superframe whose CAP slotted CSMA-CA runs in for a frame to `destination`
    ///
    /// A beaconing node that also tracks its coordinator sends to that coordinator in the CAP of
    /// the incoming superframe and everything else in its own.
    fn csma_superframe(&self, destination: Option<Address>) -> SuperframeKind {
        if !self.beaconing {
            return SuperframeKind::Incoming;
        }

        let to_coordinator = match destination {
            Some(Address::Short(_, short)) => {
                short == self.mac_pib.coord_short_address && short != ShortAddress::BROADCAST
            }
            Some(Address::Extended(_, extended)) => {
                extended == self.mac_pib.coord_extended_address
                    && extended != ExtendedAddress::BROADCAST
            }
            None => false,
        };

        if to_coordinator && self.superframes.is_active(SuperframeKind::Incoming) {
            SuperframeKind::Incoming
        } else {
            SuperframeKind::Outgoing
        }
    }

    /// The moment a frame that just finished started on air
    fn on_air_since(&self, env: &impl Environment, psdu_len: usize) -> Instant {
        let symbols = env.get_phy_pib().frame_symbols(psdu_len);
        env.now()
            .saturating_sub_duration(Duration::from_symbols(symbols as u64, env.symbol_period()))
    }

    fn transmit(&mut self, env: &mut impl Environment) {
        let psdu = match &self.tx_slot {
            TxSlot::Beacon(frame) | TxSlot::Ack(frame) => &frame.psdu,
            TxSlot::QueueHead => match self.tx_queue.front() {
                Some(head) => &head.frame.psdu,
                None => {
                    warn!("Transmitter enabled without a frame in the queue");
                    return;
                }
            },
            TxSlot::Empty => {
                warn!("Transmitter enabled without a frame to send");
                return;
            }
        };

        trace!("Sending {:?}", crate::fmt::Bytes(psdu));
        env.pd_data_request(psdu);
    }

    fn start_csma(&mut self, env: &mut impl Environment) {
        let Some(head) = self.tx_queue.front() else {
            self.defer_state_change(env, StateChange::Idle);
            return;
        };

        let phy_pib = env.get_phy_pib();
        let len = head.frame.psdu.len();
        let response = if head.frame.ack_request {
            self.mac_pib.ack_wait_duration(phy_pib)
        } else {
            env.turnaround_time()
        };
        let transaction_symbols = phy_pib.frame_symbols(len) as u64
            + response as u64
            + self.mac_pib.ifs_period(len) as u64;
        let superframe = self.csma_superframe(head.frame.destination);

        self.csma.start(
            env,
            CsmaContext {
                mac_pib: &self.mac_pib,
                superframes: &self.superframes,
                rng: &mut self.rng,
            },
            superframe,
            transaction_symbols,
        );
    }

    fn csma_outcome(&mut self, env: &mut impl Environment, outcome: CsmaOutcome) {
        debug!("CSMA-CA outcome: {:?}", outcome);

        match outcome {
            CsmaOutcome::ChannelIdle => {
                self.csma_attempts += self.csma.nb() as u32 + 1;
                self.set_state(MacState::Sending);
                env.plme_set_trx_state_request(TrxState::TxOn);
            }
            CsmaOutcome::ChannelAccessFailure => {
                self.csma_attempts += self.csma.nb() as u32 + 1;
                self.finish_head(env, Status::ChannelAccessFailure, None);
                self.defer_state_change(env, StateChange::Idle);
            }
            CsmaOutcome::Deferred => {
                self.counters.csma_deferrals += 1;
                self.defer_state_change(env, StateChange::Idle);
            }
        }
    }

    /// Take the head out of the queue and report its outcome
    fn finish_head(&mut self, env: &mut impl Environment, status: Status, timestamp: Option<Instant>) {
        if let Some(head) = self.tx_queue.pop_front() {
            self.count_outcome(status);

            env.sent_frame(SentFrameReport {
                msdu_handle: head.msdu_handle(),
                seq: head.frame.seq,
                status,
                retries: self.retries,
                csma_attempts: self.csma_attempts,
            });

            match head.origin {
                TxOrigin::Data { msdu_handle } => env.mcps_data_confirm(DataConfirm {
                    msdu_handle,
                    status,
                    timestamp,
                    num_of_retries: self.retries,
                }),
                TxOrigin::Poll if status != Status::Success => {
                    env.mlme_poll_confirm(PollConfirm { status })
                }
                TxOrigin::Poll => {}
            }
        }

        self.retries = 0;
        self.csma_attempts = 0;
        self.head_tx_time = None;
        self.csma.clear_residual();
        self.tx_slot = TxSlot::Empty;
    }

    fn count_outcome(&mut self, status: Status) {
        let counter = match status {
            Status::Success => &mut self.counters.tx_success,
            Status::NoAck => &mut self.counters.tx_no_ack,
            Status::ChannelAccessFailure => &mut self.counters.tx_channel_access_failure,
            Status::FrameTooLong => &mut self.counters.tx_frame_too_long,
            _ => return,
        };
        *counter += 1;
    }

    /// Wait the interframe space belonging to the frame we just sent
    fn after_successful_send(&mut self, env: &mut impl Environment, psdu_len: usize) {
        let ifs = Duration::from_symbols(
            self.mac_pib.ifs_period(psdu_len) as u64,
            env.symbol_period(),
        );
        self.ifs_timer.arm(env, ifs, Timer::Ifs);
        self.defer_state_change(env, StateChange::Idle);
    }

    /// Try the head of the queue again, or give up on it
    fn prepare_retransmission(&mut self, env: &mut impl Environment) {
        if self.retries >= self.mac_pib.max_frame_retries {
            debug!("No acknowledgment after {} retries", self.retries);
            self.finish_head(env, Status::NoAck, None);
            self.defer_state_change(env, StateChange::Idle);
            return;
        }

        self.retries += 1;
        self.counters.retransmissions += 1;
        self.head_tx_time = None;
        self.tx_slot = TxSlot::QueueHead;
        self.defer_state_change(env, StateChange::Csma);
    }

    fn ack_wait_expired(&mut self, env: &mut impl Environment) {
        self.counters.ack_timeouts += 1;

        if self.state == MacState::AckPending {
            trace!("No acknowledgment in time");
            self.prepare_retransmission(env);
        }
    }
}
