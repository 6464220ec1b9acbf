use crate::{
    consts::TURNAROUND_TIME,
    pib::{PhyPib, PhyPibWrite},
    time::Duration,
};

/// The PD-SAP and PLME-SAP of the physical layer as seen from the MAC.
///
/// All requests return immediately. The outcome is delivered later by the host through
/// [`crate::Mac::pd_data_confirm`], [`crate::Mac::plme_set_trx_state_confirm`] and
/// [`crate::Mac::plme_cca_confirm`]. A confirm must never be delivered from within the request.
/// Received frames are delivered through [`crate::Mac::pd_data_indication`].
pub trait Phy {
    /// Transmit a PSDU, FCS included.
    ///
    /// Must be confirmed with [`PhyStatus::Success`] after the frame has been put on air,
    /// [`PhyStatus::FrameTooLong`] if the PSDU is longer than `aMaxPHYPacketSize`,
    /// or with the current transceiver state if the transmitter is not enabled.
    fn pd_data_request(&mut self, psdu: &[u8]);

    /// Change the transceiver state.
    ///
    /// A request that arrives while an earlier one is still in progress replaces it,
    /// only the last request is confirmed.
    fn plme_set_trx_state_request(&mut self, state: TrxState);

    /// Perform a clear channel assessment of `aCCATime` symbols.
    ///
    /// Confirmed with [`PhyStatus::Idle`] or [`PhyStatus::Busy`], or [`PhyStatus::TrxOff`] when the
    /// receiver is not enabled.
    fn plme_cca_request(&mut self);

    /// Get all the PIB values available for reading
    fn get_phy_pib(&self) -> &PhyPib;

    /// Update the PIB values that are updatable accessible from the outside
    fn update_phy_pib<U>(&mut self, f: impl FnOnce(&mut PhyPibWrite) -> U) -> U;

    /// Get the amount of time each symbol takes.
    fn symbol_period(&self) -> Duration;

    /// RX-to-TX or TX-to-RX turnaround time in symbols
    fn turnaround_time(&self) -> u32 {
        TURNAROUND_TIME
    }
}

/// The states the MAC can put the transceiver in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum TrxState {
    RxOn,
    TxOn,
    TrxOff,
    /// Switch the transceiver off, aborting any transmission or reception
    ForceTrxOff,
}

/// The status values of the PHY primitives, table 18
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum PhyStatus {
    Busy,
    BusyRx,
    BusyTx,
    ForceTrxOff,
    Idle,
    InvalidParameter,
    RxOn,
    Success,
    TrxOff,
    TxOn,
    UnsupportedAttribute,
    ReadOnly,
    FrameTooLong,
}
