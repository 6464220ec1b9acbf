//! The constants defined in tables 51 and 70, plus the sizing of the MAC queues

/// The number of symbols forming a superframe slot
/// when the superframe order is equal to zero, as
/// described in 5.1.1.1.
#[doc(alias = "aBaseSlotDuration")]
pub const BASE_SLOT_DURATION: u32 = 60;

/// The number of symbols forming a superframe when
/// the superframe order is equal to zero.
#[doc(alias = "aBaseSuperframeDuration")]
pub const BASE_SUPERFRAME_DURATION: u32 = BASE_SLOT_DURATION * NUM_SUPERFRAME_SLOTS;

/// The maximum number of octets added by the MAC
/// sublayer to the MAC payload of a beacon frame.
#[doc(alias = "aMaxBeaconOverhead")]
pub const MAX_BEACON_OVERHEAD: usize = 75;

/// The maximum size, in octets, of a beacon payload.
#[doc(alias = "aMaxBeaconPayloadLength")]
pub const MAX_BEACON_PAYLOAD_LENGTH: usize = MAX_PHY_PACKET_SIZE - MAX_BEACON_OVERHEAD;

/// The number of consecutive lost beacons that will
/// cause the MAC sublayer of a receiving device to
/// declare a loss of synchronization.
#[doc(alias = "aMaxLostBeacons")]
pub const MAX_LOST_BEACONS: u32 = 4;

/// The maximum number of octets that can be transmitted in the MAC Payload field.
#[doc(alias = "aMaxMACPayloadSize")]
pub const MAX_MAC_PAYLOAD_SIZE: usize = MAX_PHY_PACKET_SIZE - MIN_MPDU_OVERHEAD;

/// The maximum number of octets added by the MAC
/// sublayer to the PSDU without security.
#[doc(alias = "aMaxMPDUUnsecuredOverhead")]
pub const MAX_MPDU_UNSECURED_OVERHEAD: usize = 25;

/// The maximum size of an MPDU, in octets, that can be
/// followed by a SIFS period.
#[doc(alias = "aMaxSIFSFrameSize")]
pub const MAX_SIFS_FRAME_SIZE: usize = 18;

/// The minimum number of octets added by the MAC
/// sublayer to the PSDU.
#[doc(alias = "aMinMPDUOverhead")]
pub const MIN_MPDU_OVERHEAD: usize = 9;

/// The number of slots contained in any superframe.
#[doc(alias = "aNumSuperframeSlots")]
pub const NUM_SUPERFRAME_SLOTS: u32 = 16;

/// The number of symbols forming the basic time period
/// used by the CSMA-CA algorithm.
#[doc(alias = "aUnitBackoffPeriod")]
pub const UNIT_BACKOFF_PERIOD: u32 = 20;

/// The maximum PSDU size (in octets) the PHY shall be able to receive.
#[doc(alias = "aMaxPHYPacketSize")]
pub const MAX_PHY_PACKET_SIZE: usize = 127;

/// RX-to-TX or TX-to-RX turnaround time (in symbol periods), as
/// defined in 8.2.1 and 8.2.2.
#[doc(alias = "aTurnaroundTime")]
pub const TURNAROUND_TIME: u32 = 12;

/// The duration of a single clear channel assessment in symbol periods, as defined in 8.2.7.
#[doc(alias = "aCCATime")]
pub const CCA_TIME: u32 = 8;

/// The minimum number of symbols forming a SIFS period.
#[doc(alias = "macSIFSPeriod")]
pub const SIFS_PERIOD: u32 = 12;

/// The minimum number of symbols forming a LIFS period.
#[doc(alias = "macLIFSPeriod")]
pub const LIFS_PERIOD: u32 = 40;

/// The size of an acknowledgment frame in octets: frame control, sequence number and FCS.
pub const ACK_FRAME_SIZE: usize = 5;

/// The number of octets we reserve for a serialized frame.
///
/// A data request may carry a full [`MAX_MAC_PAYLOAD_SIZE`] payload with long addressing,
/// which ends up larger than the PHY accepts. The frame is still built so that the PHY
/// can reject it with `FrameTooLong`.
pub const MAX_FRAME_BUFFER_SIZE: usize = MAX_PHY_PACKET_SIZE + MAX_MPDU_UNSECURED_OVERHEAD;

/// The amount of frames that can wait for direct transmission.
pub const TX_QUEUE_CAPACITY: usize = 16;

/// The amount of indirect transactions a coordinator can hold.
pub const PENDING_QUEUE_CAPACITY: usize = 7;
