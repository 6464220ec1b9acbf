use rand_core::RngCore;

use super::{state::TxSlot, Environment, Mac, MacState};
use crate::{
    phy::TrxState,
    pib::MacPib,
    sap::{
        reset::{ResetConfirm, ResetRequest},
        Status,
    },
    timer::SuperframeKind,
};

impl<Rng: RngCore> Mac<Rng> {
    /// Bring the MAC back to the state it had after construction.
    ///
    /// Queued frames and pending transactions are dropped without a confirm.
    pub fn mlme_reset_request(
        &mut self,
        env: &mut impl Environment,
        request: ResetRequest,
    ) -> ResetConfirm {
        self.change_state_timer.cancel(env);
        self.ack_wait_timer.cancel(env);
        self.ifs_timer.cancel(env);
        self.poll_wait_timer.cancel(env);
        self.beacon_timer.cancel(env);
        self.beacon_search_timer.cancel(env);
        self.csma.cancel(env);
        self.csma.clear_residual();
        self.csma.configure_unslotted();
        self.superframes.stop(SuperframeKind::Outgoing, env);
        self.superframes.stop(SuperframeKind::Incoming, env);

        debug!(
            "Reset drops {} queued frames and {} pending transactions",
            self.tx_queue.len(),
            self.pending.len()
        );
        self.tx_queue.clear();
        self.pending.clear();
        self.tx_slot = TxSlot::Empty;
        self.retries = 0;
        self.csma_attempts = 0;
        self.head_tx_time = None;
        self.is_pan_coordinator = false;
        self.beaconing = false;
        self.sync = None;
        self.pending_data_request = None;

        if request.set_default_pib {
            let dsn = self.rng.next_u32() as u8;
            let bsn = self.rng.next_u32() as u8;
            self.mac_pib = MacPib::new(self.mac_pib.extended_address, dsn, bsn);
        }

        self.set_state(MacState::Idle);
        env.plme_set_trx_state_request(TrxState::TrxOff);

        ResetConfirm {
            status: Status::Success,
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::{
        mac::tests::{mac, Event, MockEnv},
        sap::data::DataRequest,
        wire::{Address, AddressMode, PanId, ShortAddress},
        DeviceType,
    };

    #[test_log::test]
    fn reset_drops_everything_silently() {
        let mut env = MockEnv::new();
        let mut mac = mac(DeviceType::Ffd);
        mac.mac_pib.short_address = ShortAddress(1);
        mac.mac_pib.rx_on_when_idle = true;
        mac.mac_pib.max_frame_retries = 7;

        mac.mcps_data_request(
            &mut env,
            DataRequest {
                src_addr_mode: AddressMode::Short,
                dst_address: Some(Address::Short(PanId(1), ShortAddress(2))),
                msdu: heapless::Vec::from_slice(b"data").unwrap(),
                msdu_handle: 1,
                ack_tx: true,
                indirect_tx: false,
            },
        );
        env.run_due(&mut mac);
        assert_eq!(mac.state(), MacState::Csma);
        env.take_events();

        let confirm = mac.mlme_reset_request(
            &mut env,
            ResetRequest {
                set_default_pib: false,
            },
        );

        assert_eq!(confirm.status, Status::Success);
        assert_eq!(mac.state(), MacState::Idle);
        assert_eq!(mac.tx_queue_len(), 0);
        assert!(env.scheduled.is_empty());
        pretty_assertions::assert_eq!(env.take_events(), [Event::Trx(TrxState::TrxOff)]);
        assert_eq!(mac.mac_pib().max_frame_retries, 7);

        mac.mlme_reset_request(
            &mut env,
            ResetRequest {
                set_default_pib: true,
            },
        );
        assert_eq!(mac.mac_pib().max_frame_retries, 3);
        assert_eq!(mac.mac_pib().short_address, ShortAddress::BROADCAST);
        assert!(!mac.mac_pib().rx_on_when_idle);
    }
}
