//! Radio simulation infrastructure
//!
//! This module provides a simulated [Aether](https://en.wikipedia.org/wiki/Luminiferous_aether)
//! that connects the radios of a [`super::sim::Simulation`]. It knows what every radio is doing
//! and what is on air, and decides which frames arrive where.
//!
//! - A frame can only be received by a radio that had its receiver on before the SHR ended.
//! - Frames that overlap on a channel collide. They still arrive, but corrupted, so the FCS check
//!   of the receiver drops them.
//! - Links can be blocked to model radios out of each other's range.
//! - A channel can be jammed for a while, which corrupts frames and makes CCA report busy.
//!
//! # Example
//! ```
//! use lr_wpan_mac::pib::PhyPib;
//! use lr_wpan_mac::test_helpers::aether::Aether;
//! use lr_wpan_mac::time::{Duration, Instant};
//!
//! let mut aether = Aether::new(Duration::from_micros(16));
//! let alice = aether.add_radio(PhyPib::o_qpsk_2450());
//! let bob = aether.add_radio(PhyPib::o_qpsk_2450());
//! aether.radio_mut(bob).enable_receiver(Instant::ZERO);
//!
//! let (id, end) = aether.start_transmission(alice, &[1, 2, 3], Instant::ZERO);
//! let delivered = aether.finish_transmission(id, end);
//!
//! assert_eq!(delivered, [(bob, vec![1, 2, 3], false)]);
//! ```

use std::{borrow::Cow, collections::HashSet, fs::File, vec::Vec};

use pcap_file::{
    pcapng::{
        blocks::{
            enhanced_packet::EnhancedPacketBlock,
            interface_description::{InterfaceDescriptionBlock, InterfaceDescriptionOption},
        },
        Block, PcapNgReader, PcapNgWriter,
    },
    DataLink,
};

use crate::{
    consts::MAX_PHY_PACKET_SIZE,
    phy::TrxState,
    pib::PhyPib,
    time::{Duration, Instant},
    wire::Frame,
};

/// Identifies a radio in the aether
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// The PHY side of one node
#[derive(Debug)]
pub struct Radio {
    pub pib: PhyPib,
    pub trx: TrxState,
    /// The moment the receiver was switched on, if it is on
    rx_on_since: Option<Instant>,
    transmitting: Option<TransmissionId>,
}

impl Radio {
    fn new(pib: PhyPib) -> Self {
        Self {
            pib,
            trx: TrxState::TrxOff,
            rx_on_since: None,
            transmitting: None,
        }
    }

    pub fn enable_receiver(&mut self, now: Instant) {
        self.trx = TrxState::RxOn;
        if self.rx_on_since.is_none() {
            self.rx_on_since = Some(now);
        }
    }

    /// The receiver goes deaf as soon as the radio starts turning around
    pub fn disable_receiver(&mut self) {
        self.rx_on_since = None;
    }

    pub fn apply(&mut self, state: TrxState, now: Instant) {
        match state {
            TrxState::RxOn => self.enable_receiver(now),
            TrxState::TxOn => {
                self.disable_receiver();
                self.trx = TrxState::TxOn;
            }
            TrxState::TrxOff | TrxState::ForceTrxOff => {
                self.disable_receiver();
                self.trx = TrxState::TrxOff;
            }
        }
    }

    pub fn is_receiving(&self) -> bool {
        self.rx_on_since.is_some()
    }

    pub fn is_transmitting(&self) -> bool {
        self.transmitting.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransmissionId(u64);

#[derive(Debug, Clone)]
struct Transmission {
    id: TransmissionId,
    from: NodeId,
    channel: u8,
    start: Instant,
    end: Instant,
    psdu: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
struct Jam {
    channel: u8,
    start: Instant,
    end: Instant,
}

/// A medium to which radios are connected
///
/// This takes care of routing the packets to the right radios.
pub struct Aether {
    symbol_period: Duration,
    radios: Vec<Radio>,
    on_air: Vec<Transmission>,
    next_transmission: u64,
    blocked_links: HashSet<(NodeId, NodeId)>,
    jams: Vec<Jam>,
    pcap_dump: Option<(PcapNgWriter<File>, Vec<Option<u32>>)>,
}

impl Aether {
    /// Create a new empty aether in which every radio uses the given symbol period
    pub fn new(symbol_period: Duration) -> Self {
        Self {
            symbol_period,
            radios: Vec::new(),
            on_air: Vec::new(),
            next_transmission: 0,
            blocked_links: HashSet::new(),
            jams: Vec::new(),
            pcap_dump: None,
        }
    }

    pub fn symbol_period(&self) -> Duration {
        self.symbol_period
    }

    pub fn add_radio(&mut self, pib: PhyPib) -> NodeId {
        self.radios.push(Radio::new(pib));
        NodeId(self.radios.len() - 1)
    }

    pub fn radio(&self, node: NodeId) -> &Radio {
        &self.radios[node.0]
    }

    pub fn radio_mut(&mut self, node: NodeId) -> &mut Radio {
        &mut self.radios[node.0]
    }

    /// Make `a` and `b` unable to hear each other
    pub fn block_link(&mut self, a: NodeId, b: NodeId) {
        self.blocked_links.insert(Self::link(a, b));
    }

    pub fn unblock_link(&mut self, a: NodeId, b: NodeId) {
        self.blocked_links.remove(&Self::link(a, b));
    }

    fn link(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
        (a.min(b), a.max(b))
    }

    fn can_hear(&self, a: NodeId, b: NodeId) -> bool {
        a != b && !self.blocked_links.contains(&Self::link(a, b))
    }

    /// Put noise on the channel from `start` for `duration`
    pub fn jam(&mut self, channel: u8, start: Instant, duration: Duration) {
        self.jams.push(Jam {
            channel,
            start,
            end: start + duration,
        });
    }

    /// Put a frame on air. Returns when it will have left the antenna.
    pub fn start_transmission(
        &mut self,
        from: NodeId,
        psdu: &[u8],
        now: Instant,
    ) -> (TransmissionId, Instant) {
        let radio = &self.radios[from.0];
        let airtime = Duration::from_symbols(
            radio.pib.frame_symbols(psdu.len()) as u64,
            self.symbol_period,
        );

        let id = TransmissionId(self.next_transmission);
        self.next_transmission += 1;

        let transmission = Transmission {
            id,
            from,
            channel: radio.pib.current_channel,
            start: now,
            end: now + airtime,
            psdu: psdu.to_vec(),
        };
        let end = transmission.end;

        self.trace(&transmission);
        self.radios[from.0].transmitting = Some(id);
        self.on_air.push(transmission);

        (id, end)
    }

    /// The frame has left the antenna. Returns every radio that received it, with the
    /// PSDU as received and whether it was corrupted on the way.
    pub fn finish_transmission(
        &mut self,
        id: TransmissionId,
        now: Instant,
    ) -> Vec<(NodeId, Vec<u8>, bool)> {
        let Some(transmission) = self.on_air.iter().find(|t| t.id == id).cloned() else {
            return Vec::new();
        };

        let sender = &mut self.radios[transmission.from.0];
        if sender.transmitting == Some(id) {
            sender.transmitting = None;
        }

        let mut delivered = Vec::new();
        for (index, radio) in self.radios.iter().enumerate() {
            let node = NodeId(index);
            if !self.can_hear(transmission.from, node)
                || radio.pib.current_channel != transmission.channel
                || radio.is_transmitting()
            {
                continue;
            }

            let shr_end = transmission.start
                + Duration::from_symbols(radio.pib.shr_duration as u64, self.symbol_period);
            let caught_start = radio.rx_on_since.is_some_and(|since| since <= shr_end);
            if !caught_start {
                continue;
            }

            let corrupted = self.disturbed(node, &transmission);
            let mut psdu = transmission.psdu.clone();
            if corrupted {
                if let Some(last) = psdu.last_mut() {
                    *last ^= 0xff;
                }
                trace!("Frame {:?} arrives corrupted at {:?}", id, node);
            }

            delivered.push((node, psdu, corrupted));
        }

        self.forget_old(now);
        delivered
    }

    /// Another transmission the receiver could hear or a jam overlapped the frame
    fn disturbed(&self, receiver: NodeId, transmission: &Transmission) -> bool {
        let overlaps =
            |start: Instant, end: Instant| start < transmission.end && end > transmission.start;

        self.on_air.iter().any(|other| {
            other.id != transmission.id
                && other.channel == transmission.channel
                && self.can_hear(other.from, receiver)
                && overlaps(other.start, other.end)
        }) || self
            .jams
            .iter()
            .any(|jam| jam.channel == transmission.channel && overlaps(jam.start, jam.end))
    }

    /// Energy on the channel of `node` between `from` and `to`, as a CCA would see it
    pub fn channel_busy(&self, node: NodeId, from: Instant, to: Instant) -> bool {
        let channel = self.radios[node.0].pib.current_channel;
        let overlaps = |start: Instant, end: Instant| start < to && end > from;

        self.on_air.iter().any(|transmission| {
            transmission.channel == channel
                && self.can_hear(transmission.from, node)
                && overlaps(transmission.start, transmission.end)
        }) || self
            .jams
            .iter()
            .any(|jam| jam.channel == channel && overlaps(jam.start, jam.end))
    }

    /// Drop transmissions that can't overlap with anything that's still to come
    fn forget_old(&mut self, now: Instant) {
        let longest = Duration::from_symbols(
            self.radios
                .iter()
                .map(|radio| radio.pib.frame_symbols(MAX_PHY_PACKET_SIZE))
                .max()
                .unwrap_or(0) as u64,
            self.symbol_period,
        );
        let horizon = now.saturating_sub_duration(longest + longest);

        self.on_air.retain(|transmission| transmission.end > horizon);
        self.jams.retain(|jam| jam.end > horizon);
    }

    /// Write everything that goes on air to a pcap-ng file
    pub fn start_trace(&mut self, file: File) {
        if self.pcap_dump.is_some() {
            panic!("Already capturing pcap");
        }
        self.pcap_dump = Some((PcapNgWriter::new(file).unwrap(), Vec::new()));
    }

    pub fn stop_trace(&mut self) {
        self.pcap_dump = None;
    }

    fn trace(&mut self, transmission: &Transmission) {
        let Some((pcap, interfaces)) = &mut self.pcap_dump else {
            return;
        };

        let node = transmission.from.0;
        if interfaces.len() <= node {
            interfaces.resize(node + 1, None);
        }

        let next_interface = interfaces.iter().flatten().count() as u32;
        let interface_id = *interfaces[node].get_or_insert_with(|| {
            pcap.write_pcapng_block(InterfaceDescriptionBlock {
                linktype: DataLink::IEEE802_15_4,
                snaplen: MAX_PHY_PACKET_SIZE as u32,
                options: vec![InterfaceDescriptionOption::IfName(
                    format!("{:?}", transmission.from).into(),
                )],
            })
            .unwrap();

            next_interface
        });

        let block = EnhancedPacketBlock {
            interface_id,
            timestamp: core::time::Duration::from_nanos(transmission.start.ticks()),
            original_len: transmission.psdu.len() as u32,
            data: Cow::Borrowed(&transmission.psdu),
            options: vec![],
        };
        pcap.write_pcapng_block(block).unwrap();
    }

    /// Read back the frames of a trace written by [`Aether::start_trace`]
    pub fn parse_trace(file: File) -> impl Iterator<Item = Frame> {
        let mut reader = PcapNgReader::new(file).unwrap();

        std::iter::from_fn(move || {
            while let Some(block) = reader.next_block() {
                if let Block::EnhancedPacket(packet) = block.unwrap() {
                    return Some(Frame::from_psdu(&packet.data).unwrap());
                }
            }

            None
        })
    }
}
