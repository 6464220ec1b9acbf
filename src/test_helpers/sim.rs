//! A discrete-event simulation of a group of nodes that share one [`Aether`]
//!
//! Every node is a [`Mac`] with its own seeded random generator and a [`Recorder`] as its higher
//! layer. All events of all nodes live on one timeline and run in `(time, scheduling order)`.
//!
//! ```
//! use lr_wpan_mac::test_helpers::sim::{Request, Simulation};
//! use lr_wpan_mac::time::Duration;
//! use lr_wpan_mac::DeviceType;
//!
//! let mut sim = Simulation::new();
//! let node = sim.add_node(DeviceType::Ffd);
//!
//! sim.request(node, Request::PurgeExpired).unwrap();
//! sim.run_for(Duration::from_millis(10)).unwrap();
//! ```

use std::{
    cmp::{Ordering, Reverse},
    collections::{BinaryHeap, HashSet},
    sync::Arc,
    vec::Vec,
};

use rand::{rngs::StdRng, SeedableRng};

use super::{
    aether::{Aether, NodeId, TransmissionId},
    recorder::{Recorder, Upcall},
};
use crate::{
    consts::{CCA_TIME, MAX_PHY_PACKET_SIZE},
    phy::{Phy, PhyStatus, TrxState},
    pib::{PhyPib, PhyPibWrite},
    sap::{
        beacon_notify::BeaconNotifyIndication,
        data::{DataConfirm, DataIndication, DataRequest},
        get::GetRequest,
        poll::{PollConfirm, PollRequest},
        purge::PurgeRequest,
        reset::ResetRequest,
        set::SetRequest,
        start::StartRequest,
        sync::{SyncLossIndication, SyncRequest},
        SentFrameReport, UpperLayer,
    },
    time::{Duration, Instant},
    timer::{ContextInbox, Scheduler, Timer, TimerHandle},
    wire::ExtendedAddress,
    DeviceType, Mac, MacConfig, MacError,
};

/// How many requests other threads can have in flight between two events
pub const INBOX_SIZE: usize = 32;

/// The link quality the simulated PHY reports for every frame
const LINK_QUALITY: u8 = 255;

/// A request of the higher layer for one of the nodes
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Data(DataRequest),
    Purge(PurgeRequest),
    Poll(PollRequest),
    Start(StartRequest),
    Sync(SyncRequest),
    Get(GetRequest),
    Set(SetRequest),
    Reset(ResetRequest),
    /// Drop the indirect transactions that weren't picked up in time
    PurgeExpired,
}

pub type Inbox = ContextInbox<(NodeId, Request), INBOX_SIZE>;

#[derive(Debug)]
enum SimEvent {
    Mac(Timer),
    TrxSettled(TrxState),
    CcaDone { since: Instant },
    TxDone(TransmissionId),
    DataConfirm(PhyStatus),
    Request(Request),
}

#[derive(Debug)]
struct Scheduled {
    at: Instant,
    seq: u64,
    node: NodeId,
    event: SimEvent,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

/// The timeline shared by all nodes
#[derive(Default)]
struct EventQueue {
    heap: BinaryHeap<Reverse<Scheduled>>,
    /// Sequence numbers of the events that haven't run or been cancelled
    live: HashSet<u64>,
    next_seq: u64,
}

impl EventQueue {
    fn push(&mut self, at: Instant, node: NodeId, event: SimEvent) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        self.live.insert(seq);
        self.heap.push(Reverse(Scheduled {
            at,
            seq,
            node,
            event,
        }));

        seq
    }

    fn cancel(&mut self, seq: u64) {
        self.live.remove(&seq);
    }

    fn drop_cancelled(&mut self) {
        while let Some(Reverse(next)) = self.heap.peek() {
            if self.live.contains(&next.seq) {
                break;
            }
            self.heap.pop();
        }
    }

    fn next_time(&mut self) -> Option<Instant> {
        self.drop_cancelled();
        self.heap.peek().map(|Reverse(next)| next.at)
    }

    fn pop(&mut self) -> Option<Scheduled> {
        self.drop_cancelled();
        let Reverse(next) = self.heap.pop()?;
        self.live.remove(&next.seq);
        Some(next)
    }
}

struct SimNode {
    mac: Mac<StdRng>,
    recorder: Recorder,
    /// The transceiver state change that's still turning around
    pending_trx: Option<u64>,
}

/// The environment one node sees while it handles an event
struct NodeEnv<'a> {
    node: NodeId,
    now: Instant,
    queue: &'a mut EventQueue,
    aether: &'a mut Aether,
    recorder: &'a mut Recorder,
    pending_trx: &'a mut Option<u64>,
}

impl NodeEnv<'_> {
    fn push_in(&mut self, delay: Duration, event: SimEvent) -> u64 {
        let at = if delay.is_negative() {
            self.now
        } else {
            self.now + delay
        };
        self.queue.push(at, self.node, event)
    }

    fn symbols(&self, symbols: u32) -> Duration {
        Duration::from_symbols(symbols as u64, self.aether.symbol_period())
    }
}

impl Phy for NodeEnv<'_> {
    fn pd_data_request(&mut self, psdu: &[u8]) {
        let radio = self.aether.radio(self.node);

        let refusal = if psdu.len() > MAX_PHY_PACKET_SIZE {
            Some(PhyStatus::FrameTooLong)
        } else if radio.is_transmitting() {
            Some(PhyStatus::BusyTx)
        } else if radio.trx != TrxState::TxOn || self.pending_trx.is_some() {
            Some(match radio.trx {
                TrxState::RxOn => PhyStatus::RxOn,
                _ => PhyStatus::TrxOff,
            })
        } else {
            None
        };

        if let Some(status) = refusal {
            warn!("{:?} refuses to transmit: {:?}", self.node, status);
            self.push_in(Duration::ZERO, SimEvent::DataConfirm(status));
            return;
        }

        let (id, end) = self.aether.start_transmission(self.node, psdu, self.now);
        self.queue.push(end, self.node, SimEvent::TxDone(id));
    }

    fn plme_set_trx_state_request(&mut self, state: TrxState) {
        if let Some(previous) = self.pending_trx.take() {
            self.queue.cancel(previous);
        }

        let current = self.aether.radio(self.node).trx;
        let delay = match (current, state) {
            (current, state) if current == state => Duration::ZERO,
            (_, TrxState::TrxOff | TrxState::ForceTrxOff) => Duration::ZERO,
            _ => self.symbols(self.turnaround_time()),
        };

        if state != TrxState::RxOn {
            self.aether.radio_mut(self.node).disable_receiver();
        }

        let seq = self.push_in(delay, SimEvent::TrxSettled(state));
        *self.pending_trx = Some(seq);
    }

    fn plme_cca_request(&mut self) {
        let delay = if self.aether.radio(self.node).is_receiving() {
            self.symbols(CCA_TIME)
        } else {
            Duration::ZERO
        };

        let since = self.now;
        self.push_in(delay, SimEvent::CcaDone { since });
    }

    fn get_phy_pib(&self) -> &PhyPib {
        &self.aether.radio(self.node).pib
    }

    fn update_phy_pib<U>(&mut self, f: impl FnOnce(&mut PhyPibWrite) -> U) -> U {
        f(&mut self.aether.radio_mut(self.node).pib.pib_write)
    }

    fn symbol_period(&self) -> Duration {
        self.aether.symbol_period()
    }
}

impl Scheduler for NodeEnv<'_> {
    fn now(&self) -> Instant {
        self.now
    }

    fn schedule_after(&mut self, delay: Duration, timer: Timer) -> TimerHandle {
        TimerHandle(self.push_in(delay, SimEvent::Mac(timer)))
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.queue.cancel(handle.0);
    }
}

impl UpperLayer for NodeEnv<'_> {
    fn mcps_data_confirm(&mut self, confirm: DataConfirm) {
        self.recorder.record(self.now, Upcall::DataConfirm(confirm));
    }

    fn mcps_data_indication(&mut self, indication: DataIndication) {
        self.recorder
            .record(self.now, Upcall::DataIndication(indication));
    }

    fn mlme_beacon_notify_indication(&mut self, indication: BeaconNotifyIndication) {
        self.recorder.record(self.now, Upcall::BeaconNotify(indication));
    }

    fn mlme_sync_loss_indication(&mut self, indication: SyncLossIndication) {
        self.recorder.record(self.now, Upcall::SyncLoss(indication));
    }

    fn mlme_poll_confirm(&mut self, confirm: PollConfirm) {
        self.recorder.record(self.now, Upcall::PollConfirm(confirm));
    }

    fn sent_frame(&mut self, report: SentFrameReport) {
        self.recorder.record(self.now, Upcall::SentFrame(report));
    }
}

pub struct Simulation {
    now: Instant,
    queue: EventQueue,
    aether: Aether,
    nodes: Vec<SimNode>,
    inbox: Arc<Inbox>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    /// A simulation of 2.4 GHz O-QPSK radios
    pub fn new() -> Self {
        Self::with_symbol_period(Duration::from_micros(16))
    }

    pub fn with_symbol_period(symbol_period: Duration) -> Self {
        Self {
            now: Instant::ZERO,
            queue: EventQueue::default(),
            aether: Aether::new(symbol_period),
            nodes: Vec::new(),
            inbox: Arc::new(Inbox::new()),
        }
    }

    pub fn add_node(&mut self, device_type: DeviceType) -> NodeId {
        self.add_node_with_pib(device_type, PhyPib::o_qpsk_2450())
    }

    /// Add a node whose extended address and random seed follow from the order it was added in
    pub fn add_node_with_pib(&mut self, device_type: DeviceType, phy_pib: PhyPib) -> NodeId {
        let node = self.aether.add_radio(phy_pib);
        let index = node.0 as u64;

        self.nodes.push(SimNode {
            mac: Mac::new(MacConfig {
                extended_address: ExtendedAddress(0x0011_2233_4455_0000 + index),
                rng: StdRng::seed_from_u64(index),
                device_type,
            }),
            recorder: Recorder::new(),
            pending_trx: None,
        });

        node
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn aether(&mut self) -> &mut Aether {
        &mut self.aether
    }

    pub fn mac(&self, node: NodeId) -> &Mac<StdRng> {
        &self.nodes[node.0].mac
    }

    pub fn recorder(&self, node: NodeId) -> &Recorder {
        &self.nodes[node.0].recorder
    }

    pub fn recorder_mut(&mut self, node: NodeId) -> &mut Recorder {
        &mut self.nodes[node.0].recorder
    }

    /// A handle through which other threads can hand requests to the simulation.
    /// They are picked up before the next event runs.
    pub fn inbox(&self) -> Arc<Inbox> {
        self.inbox.clone()
    }

    /// Hand a request to the MAC of `node` right now.
    ///
    /// Returns the confirm when the request completes immediately. It's recorded as well.
    pub fn request(
        &mut self,
        node: NodeId,
        request: Request,
    ) -> Result<Option<Upcall>, MacError> {
        let upcall = self.with_node(node, |mac, env| match request {
            Request::Data(request) => {
                mac.mcps_data_request(env, request);
                None
            }
            Request::Purge(request) => Some(Upcall::PurgeConfirm(mac.mcps_purge_request(request))),
            Request::Poll(request) => {
                mac.mlme_poll_request(env, request);
                None
            }
            Request::Start(request) => {
                Some(Upcall::StartConfirm(mac.mlme_start_request(env, request)))
            }
            Request::Sync(request) => {
                mac.mlme_sync_request(env, request);
                None
            }
            Request::Get(request) => Some(Upcall::GetConfirm(mac.mlme_get_request(&*env, request))),
            Request::Set(request) => Some(Upcall::SetConfirm(mac.mlme_set_request(env, request))),
            Request::Reset(request) => {
                Some(Upcall::ResetConfirm(mac.mlme_reset_request(env, request)))
            }
            Request::PurgeExpired => {
                mac.purge_expired_transactions(env);
                None
            }
        });

        if let Some(upcall) = &upcall {
            self.nodes[node.0].recorder.record(self.now, upcall.clone());
        }

        Ok(upcall)
    }

    /// Hand a request to the MAC of `node` after `delay`
    pub fn schedule_request(&mut self, delay: Duration, node: NodeId, request: Request) {
        self.queue
            .push(self.now + delay, node, SimEvent::Request(request));
    }

    fn drain_inbox(&mut self) {
        let inbox = self.inbox.clone();
        inbox.drain(|delay, (node, request)| {
            self.queue
                .push(self.now + delay, node, SimEvent::Request(request));
        });
    }

    /// Run the next event. Returns its time, or `None` when nothing is left to do.
    pub fn step(&mut self) -> Result<Option<Instant>, MacError> {
        self.drain_inbox();

        let Some(Scheduled {
            at, node, event, ..
        }) = self.queue.pop()
        else {
            return Ok(None);
        };

        self.now = at;
        self.dispatch(node, event)?;

        Ok(Some(at))
    }

    /// Run every event up to and including `deadline`, then move the clock to it
    pub fn run_until(&mut self, deadline: Instant) -> Result<(), MacError> {
        loop {
            self.drain_inbox();

            match self.queue.next_time() {
                Some(at) if at <= deadline => {
                    self.step()?;
                }
                _ => break,
            }
        }

        self.now = self.now.max(deadline);
        Ok(())
    }

    pub fn run_for(&mut self, duration: Duration) -> Result<(), MacError> {
        self.run_until(self.now + duration)
    }

    fn dispatch(&mut self, node: NodeId, event: SimEvent) -> Result<(), MacError> {
        match event {
            SimEvent::Mac(timer) => self.with_node(node, |mac, env| {
                mac.handle_timer(env, timer);
            }),
            SimEvent::TrxSettled(state) => {
                let now = self.now;
                self.nodes[node.0].pending_trx = None;
                self.aether.radio_mut(node).apply(state, now);

                let status = match state {
                    TrxState::RxOn => PhyStatus::RxOn,
                    TrxState::TxOn => PhyStatus::TxOn,
                    TrxState::TrxOff | TrxState::ForceTrxOff => PhyStatus::TrxOff,
                };
                self.with_node(node, |mac, env| mac.plme_set_trx_state_confirm(env, status))?;
            }
            SimEvent::CcaDone { since } => {
                let status = if !self.aether.radio(node).is_receiving() {
                    PhyStatus::TrxOff
                } else if self.aether.channel_busy(node, since, self.now) {
                    PhyStatus::Busy
                } else {
                    PhyStatus::Idle
                };
                trace!("CCA of {:?}: {:?}", node, status);
                self.with_node(node, |mac, env| mac.plme_cca_confirm(env, status));
            }
            SimEvent::TxDone(id) => {
                let deliveries = self.aether.finish_transmission(id, self.now);
                self.with_node(node, |mac, env| mac.pd_data_confirm(env, PhyStatus::Success));

                for (receiver, psdu, _) in deliveries {
                    self.with_node(receiver, |mac, env| {
                        mac.pd_data_indication(env, &psdu, LINK_QUALITY)
                    });
                }
            }
            SimEvent::DataConfirm(status) => {
                self.with_node(node, |mac, env| mac.pd_data_confirm(env, status));
            }
            SimEvent::Request(request) => {
                self.request(node, request)?;
            }
        }

        Ok(())
    }

    fn with_node<T>(
        &mut self,
        node: NodeId,
        f: impl FnOnce(&mut Mac<StdRng>, &mut NodeEnv<'_>) -> T,
    ) -> T {
        let SimNode {
            mac,
            recorder,
            pending_trx,
        } = &mut self.nodes[node.0];

        let mut env = NodeEnv {
            node,
            now: self.now,
            queue: &mut self.queue,
            aether: &mut self.aether,
            recorder,
            pending_trx,
        };

        f(mac, &mut env)
    }
}
