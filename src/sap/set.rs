use super::Status;
use crate::pib::PibValue;

/// The MLME-SET.request primitive attempts to write the given value to the indicated PIB attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct SetRequest {
    pub pib_attribute: &'static str,
    pub pib_attribute_value: PibValue,
}

/// The MLME-SET.confirm primitive reports the results of an attempt to write a value to a PIB attribute.
///
/// - READ_ONLY: the attribute can't be written
/// - INVALID_PARAMETER: the value is out of range or of the wrong kind
/// - UNSUPPORTED_ATTRIBUTE: the attribute doesn't exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetConfirm {
    pub status: Status,
    pub pib_attribute: &'static str,
}
