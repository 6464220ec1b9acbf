use super::Status;

/// The MLME-RESET.request primitive is used by the next higher layer to request that the MLME performs a
/// reset operation.
///
/// All timers are stopped, the transmit queue and the pending transactions are dropped without
/// confirms and the transceiver is switched off.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResetRequest {
    /// If TRUE, the MAC sublayer is reset, and all MAC
    /// PIB attributes are set to their default values. If
    /// FALSE, the MAC sublayer is reset, but all MAC PIB
    /// attributes retain their values prior to the generation of
    /// the MLME-RESET.request primitive.
    pub set_default_pib: bool,
}

/// The MLME-RESET.confirm primitive reports the results of the reset operation.
///
/// The status parameter is set to SUCCESS on completion of the reset procedure.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResetConfirm {
    pub status: Status,
}
