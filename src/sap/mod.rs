//! The primitives the MAC sublayer offers to the next higher layer
//!
//! Requests are passed to the methods of [`crate::Mac`]. Confirms of requests that complete
//! immediately are returned directly, all other confirms and the indications are delivered
//! through the [`UpperLayer`] trait.

use beacon_notify::BeaconNotifyIndication;
use data::{DataConfirm, DataIndication};
use poll::PollConfirm;
use sync::SyncLossIndication;

use crate::{
    time::Instant,
    wire::{beacon::SuperframeSpecification, Address},
    ChannelPage,
};

pub mod beacon_notify;
pub mod data;
pub mod get;
pub mod poll;
pub mod purge;
pub mod reset;
pub mod set;
pub mod start;
pub mod sync;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Status {
    #[default]
    Success,
    NoAck,
    TransactionOverflow,
    TransactionExpired,
    ChannelAccessFailure,
    FrameTooLong,
    InvalidParameter,
    NoData,
    UnsupportedAttribute,
    NoShortAddress,
    InvalidAddress,
    InvalidHandle,
    ReadOnly,
}

/// The consumer of the confirms and indications the MAC generates on its own timeline
pub trait UpperLayer {
    /// Reports the results of a request to transfer a data SPDU (MSDU) from a local SSCS entity to a single
    /// peer SSCS entity.
    fn mcps_data_confirm(&mut self, confirm: DataConfirm);

    /// Indicates the reception of a data frame that made it through the receive filter.
    fn mcps_data_indication(&mut self, indication: DataIndication);

    fn mlme_beacon_notify_indication(&mut self, indication: BeaconNotifyIndication);

    /// Indicates the loss of synchronization with a coordinator.
    fn mlme_sync_loss_indication(&mut self, indication: SyncLossIndication);

    fn mlme_poll_confirm(&mut self, confirm: PollConfirm);

    /// Called for every frame that leaves the transmit queue, successful or not
    fn sent_frame(&mut self, report: SentFrameReport) {
        let _ = report;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanDescriptor {
    /// The address of the coordinator as specified in the received beacon frame.
    pub coord_address: Address,
    /// The current channel number occupied by the network.
    pub channel_number: u8,
    /// The current channel page occupied by the network.
    pub channel_page: ChannelPage,
    /// The superframe specification as specified in the received beacon frame.
    pub super_frame_spec: SuperframeSpecification,
    /// The LQI at which the network beacon was
    /// received. Lower values represent lower
    /// LQI, as defined in 8.2.6.
    pub link_quality: u8,
    /// The time at which the beacon frame was received, taken at the start of the frame on air
    pub timestamp: Instant,
}

/// A trace of the transmission of one frame from the transmit queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct SentFrameReport {
    /// The handle of the data request, if the frame came from one
    pub msdu_handle: Option<u8>,
    pub seq: u8,
    pub status: Status,
    /// The amount of retransmissions
    pub retries: u8,
    /// The amount of CSMA-CA backoffs over all attempts
    pub csma_attempts: u32,
}
