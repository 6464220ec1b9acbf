use super::Status;

/// The MCPS-PURGE.request primitive allows the next higher layer to purge an MSDU from the transaction
/// queue.
///
/// On receipt of the MCPS-PURGE.request primitive, the MAC sublayer attempts to find in its transaction
/// queue the MSDU indicated by the msduHandle parameter. If an MSDU has left the transaction queue, the
/// handle will not be found, and the MSDU can no longer be purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeRequest {
    pub msdu_handle: u8,
}

/// The MCPS-PURGE.confirm primitive allows the MAC sublayer to notify the next higher layer of the success
/// of its request to purge an MSDU from the transaction queue.
///
/// Status is SUCCESS if the MSDU was purged and INVALID_HANDLE if no transaction with the handle exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct PurgeConfirm {
    pub msdu_handle: u8,
    pub status: Status,
}
