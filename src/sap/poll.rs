use super::Status;
use crate::wire::Address;

/// The MLME-POLL.request primitive prompts the device to request data from the coordinator.
///
/// The MLME generates a data request command and sends it to the coordinator with an
/// acknowledgment requested. If the acknowledgment has its frame pending bit set, the receiver is
/// kept on for `macMaxFrameTotalWaitTime` symbols to receive the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollRequest {
    /// The address of the coordinator to which the poll is intended.
    pub coord_address: Address,
}

/// The MLME-POLL.confirm primitive reports the results of a request to poll the coordinator for data.
///
/// - SUCCESS: data was received
/// - NO_DATA: the coordinator had nothing for us or the data did not arrive in time
/// - CHANNEL_ACCESS_FAILURE or NO_ACK: the data request command could not be delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct PollConfirm {
    pub status: Status,
}
