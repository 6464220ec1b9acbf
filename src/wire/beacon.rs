//! Beacon
//!
//! The beacons we send only announce the superframe. Their GTS and pending address lists are
//! always empty, and those lists are ignored in beacons we receive.

use ieee802154::mac::beacon::{GuaranteedTimeSlotInformation, PendingAddress};
pub use ieee802154::mac::beacon::{
    Beacon, BeaconOrder, SuperframeOrder, SuperframeSpecification,
};

/// A beacon that carries `superframe_spec` and nothing else
pub fn superframe_beacon(superframe_spec: SuperframeSpecification) -> Beacon {
    Beacon {
        superframe_spec,
        guaranteed_time_slot_info: GuaranteedTimeSlotInformation::new(),
        pending_address: PendingAddress::new(),
    }
}

/// The exponent of an active superframe, `None` when the orders don't describe one
///
/// Both orders must be below 15 and the superframe can't be longer than the beacon interval.
pub fn active_orders(spec: &SuperframeSpecification) -> Option<(u8, u8)> {
    match (spec.beacon_order, spec.superframe_order) {
        (BeaconOrder::BeaconOrder(bo), SuperframeOrder::SuperframeOrder(so)) if so <= bo => {
            Some((bo, so))
        }
        _ => None,
    }
}
