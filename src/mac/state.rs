use arraydeque::ArrayDeque;
use heapless::Vec;

use crate::{
    consts::{MAX_FRAME_BUFFER_SIZE, TX_QUEUE_CAPACITY},
    wire::{Address, Frame, FrameError, FrameType},
};

/// The resting states of the MAC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum MacState {
    Idle,
    /// CSMA-CA is trying to get access to the channel
    Csma,
    /// A frame is being put on air
    Sending,
    /// Waiting for the acknowledgment of the frame we just sent
    AckPending,
}

/// A frame that is serialized and ready to be handed to the PHY
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFrame {
    pub psdu: Vec<u8, MAX_FRAME_BUFFER_SIZE>,
    pub seq: u8,
    pub frame_type: FrameType,
    pub ack_request: bool,
    pub destination: Option<Address>,
}

impl OutgoingFrame {
    pub fn new(frame: &Frame) -> Result<Self, FrameError> {
        Ok(Self {
            psdu: frame.to_psdu()?,
            seq: frame.header.seq,
            frame_type: frame.header.frame_type,
            ack_request: frame.header.ack_request,
            destination: frame.header.destination,
        })
    }
}

/// Who gets told about the outcome of a queued frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum TxOrigin {
    /// A data request of the higher layer, directly or through the pending transactions
    Data { msdu_handle: u8 },
    /// The data request command of an MLME-POLL
    Poll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxQueueElement {
    pub origin: TxOrigin,
    pub frame: OutgoingFrame,
}

impl TxQueueElement {
    pub fn msdu_handle(&self) -> Option<u8> {
        match self.origin {
            TxOrigin::Data { msdu_handle } => Some(msdu_handle),
            TxOrigin::Poll => None,
        }
    }
}

pub type TxQueue = ArrayDeque<TxQueueElement, TX_QUEUE_CAPACITY>;

/// The frame that currently owns the transmitter
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TxSlot {
    #[default]
    Empty,
    /// The head of the transmit queue. It stays in the queue until its outcome is known.
    QueueHead,
    Beacon(OutgoingFrame),
    Ack(OutgoingFrame),
}

/// Running totals of what the MAC did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct MacCounters {
    pub tx_enqueued: u32,
    pub tx_success: u32,
    pub tx_no_ack: u32,
    pub tx_channel_access_failure: u32,
    pub tx_frame_too_long: u32,
    pub tx_overflow: u32,
    pub tx_expired: u32,
    pub retransmissions: u32,
    pub ack_timeouts: u32,
    pub csma_deferrals: u32,
    pub beacons_sent: u32,
    pub beacons_received: u32,
    pub acks_sent: u32,
    pub rx_frames: u32,
    pub rx_fcs_errors: u32,
    pub rx_malformed: u32,
    pub rx_filtered: u32,
}
