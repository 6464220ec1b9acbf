use heapless::Vec;

use crate::{
    consts::{MAX_MAC_PAYLOAD_SIZE, MAX_PHY_PACKET_SIZE},
    time::Instant,
    wire::{Address, AddressMode},
};

use super::Status;

/// The MCPS-DATA.request primitive requests the transfer of data to another device.
///
/// On receipt of the MCPS-DATA.request primitive, the MAC sublayer entity begins the transmission of the
/// supplied MSDU.
///
/// If the msdu is longer than [`MAX_MAC_PAYLOAD_SIZE`], the MAC sublayer will discard the request
/// and issue the MCPS-DATA.confirm primitive with a status of FRAME_TOO_LONG. If both the
/// source and destination addressing modes are none, the confirm carries INVALID_ADDRESS.
///
/// If `indirect_tx` is set and the device is a coordinator, the frame is stored as a pending
/// transaction until the destination asks for it with a data request command. The transaction
/// expires after `macTransactionPersistenceTime` unit periods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest {
    /// The source addressing mode for this MPDU.
    pub src_addr_mode: AddressMode,
    /// The destination with the PAN it lives in, or `None` to address nobody in particular.
    pub dst_address: Option<Address>,
    /// The set of octets forming the MSDU to be transmitted by the MAC sublayer entity.
    pub msdu: Vec<u8, MAX_PHY_PACKET_SIZE>,
    /// The handle associated with the MSDU to be transmitted by the MAC sublayer entity.
    pub msdu_handle: u8,
    /// Request an acknowledgment from the recipient. Ignored for group addresses.
    pub ack_tx: bool,
    /// Send indirectly through the pending transaction queue.
    pub indirect_tx: bool,
}

/// The MCPS-DATA.confirm primitive reports the results of a request to transfer data to another device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct DataConfirm {
    /// The handle associated with the MSDU being confirmed.
    pub msdu_handle: u8,
    pub status: Status,
    /// The time the frame was put on air. `None` if the frame was never transmitted.
    pub timestamp: Option<Instant>,
    /// The amount of retransmissions that were needed.
    pub num_of_retries: u8,
}

/// The MCPS-DATA.indication primitive indicates the reception of data from another device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataIndication {
    pub source: Option<Address>,
    pub destination: Option<Address>,
    pub msdu: Vec<u8, MAX_MAC_PAYLOAD_SIZE>,
    /// LQI value measured during reception of the MPDU. Lower values represent lower LQI, as described in
    /// 8.2.6.
    pub mpdu_link_quality: u8,
    /// The DSN of the received data frame.
    pub dsn: u8,
    /// The time, in symbols, at which the data were received.
    pub timestamp: Instant,
}
