use rand_core::RngCore;

use super::Mac;
use crate::{
    phy::Phy,
    pib::{MacPib, PibValue},
    sap::{
        get::{GetConfirm, GetRequest},
        Status,
    },
};

impl<Rng: RngCore> Mac<Rng> {
    /// Read a MAC or PHY PIB attribute
    pub fn mlme_get_request(&self, phy: &impl Phy, request: GetRequest) -> GetConfirm {
        let pib_attribute = request.pib_attribute;

        match get_pib_value(phy, &self.mac_pib, pib_attribute) {
            Ok(value) => GetConfirm {
                pib_attribute,
                status: Status::Success,
                value,
            },
            Err(status) => GetConfirm {
                pib_attribute,
                status,
                value: PibValue::None,
            },
        }
    }
}

fn get_pib_value(
    phy: &impl Phy,
    mac_pib: &MacPib,
    pib_attribute: &str,
) -> Result<PibValue, Status> {
    let phy_pib = phy.get_phy_pib();

    if let Some(val) = phy_pib.get(pib_attribute) {
        return Ok(val);
    }

    if let Some(val) = mac_pib.get(pib_attribute, phy_pib) {
        return Ok(val);
    }

    Err(Status::UnsupportedAttribute)
}
