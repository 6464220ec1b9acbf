use heapless::Vec;

use crate::consts::MAX_BEACON_PAYLOAD_LENGTH;

use super::PanDescriptor;

/// The MLME-BEACON-NOTIFY.indication primitive is used to send parameters contained within a beacon
/// frame received by the MAC sublayer to the next higher layer. The primitive also sends a measure of the
/// LQI and the time the beacon frame was received.
#[derive(Debug, Clone, PartialEq)]
pub struct BeaconNotifyIndication {
    pub beacon_sequence_number: u8,
    pub pan_descriptor: PanDescriptor,
    /// The set of octets comprising the beacon
    /// payload to be transferred from the MAC
    /// sublayer entity to the next higher layer.
    pub sdu: Vec<u8, MAX_BEACON_PAYLOAD_LENGTH>,
}
