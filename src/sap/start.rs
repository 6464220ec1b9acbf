use super::Status;
use crate::{
    wire::{
        beacon::{BeaconOrder, SuperframeOrder},
        PanId,
    },
    ChannelPage,
};

/// Makes the device the coordinator of a PAN, or changes the superframe of the PAN it coordinates.
///
/// With a beacon order below 15 the coordinator starts beaconing right away, on the channel
/// and page given here. With beacon order 15 no beacons are sent and the battery life
/// extension flag has no effect.
///
/// Beacons carry `macShortAddress` as their source, so it must be set beforehand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub pan_id: PanId,
    pub channel_number: u8,
    pub channel_page: ChannelPage,
    /// The beacon interval is `aBaseSuperframeDuration * 2^BO` symbols
    pub beacon_order: BeaconOrder,
    /// Sets the length of the active period, must not exceed the beacon order
    pub superframe_order: SuperframeOrder,
    /// Start a new PAN instead of changing the superframe of the current one
    pub pan_coordinator: bool,
    /// Turn the receiver off `macBattLifeExtPeriods` backoff periods into the CAP
    pub battery_life_extension: bool,
}

/// The outcome of a [`StartRequest`]
///
/// - `NoShortAddress` when `macShortAddress` is still 0xffff
/// - `InvalidParameter` when the device cannot coordinate or the superframe order is too high
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartConfirm {
    pub status: Status,
}
