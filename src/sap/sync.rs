use crate::{wire::PanId, ChannelPage};

/// The MLME-SYNC.request primitive requests to synchronize with the coordinator by acquiring and, if
/// specified, tracking its beacons.
///
/// The MLME enables its receiver and searches for at most
/// `aBaseSuperframeDuration * (2^n + 1)` symbols for a beacon of its own PAN, where n is macBeaconOrder.
/// If a beacon is not found, the search is repeated until `aMaxLostBeacons` consecutive searches have
/// failed. Without tracking a single failed search ends the synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncRequest {
    pub channel_number: u8,
    pub channel_page: ChannelPage,
    /// TRUE if the MLME is to synchronize with the next beacon and attempts to track all future beacons.
    pub track_beacon: bool,
}

/// The MLME-SYNC-LOSS.indication primitive indicates the loss of synchronization with a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncLossIndication {
    pub loss_reason: SyncLossReason,
    /// The PAN identifier with which the device lost synchronization or to which it was realigned.
    pub pan_id: PanId,
    pub channel_number: u8,
    pub channel_page: ChannelPage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum SyncLossReason {
    BeaconLost,
}
