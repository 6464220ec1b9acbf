use rand_core::RngCore;

use super::{Environment, Mac};
use crate::{
    phy::Phy,
    pib::{MacPibWrite, PibValue},
    sap::{
        set::{SetConfirm, SetRequest},
        Status,
    },
};

impl<Rng: RngCore> Mac<Rng> {
    /// Write a MAC or PHY PIB attribute
    pub fn mlme_set_request(
        &mut self,
        env: &mut impl Environment,
        request: SetRequest,
    ) -> SetConfirm {
        let pib_attribute = request.pib_attribute;
        let status = set_pib_value(
            env,
            &mut self.mac_pib.pib_write,
            pib_attribute,
            &request.pib_attribute_value,
        );

        if status == Status::Success && pib_attribute == PibValue::MAC_RX_ON_WHEN_IDLE {
            self.refresh_receiver(env);
        }

        SetConfirm {
            status,
            pib_attribute,
        }
    }
}

fn set_pib_value(
    phy: &mut impl Phy,
    mac_pib_write: &mut MacPibWrite,
    pib_attribute: &str,
    pib_value: &PibValue,
) -> Status {
    if let Some(status) = phy.update_phy_pib(|phy_pib| phy_pib.try_set(pib_attribute, pib_value)) {
        return status;
    }

    if let Some(status) = mac_pib_write.try_set(pib_attribute, pib_value) {
        return status;
    }

    Status::UnsupportedAttribute
}
