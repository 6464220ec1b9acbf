use heapless::Vec;
use rand_core::RngCore;

use super::{
    state::{OutgoingFrame, TxSlot},
    Environment, Mac, MacState,
};
use crate::{
    consts::{NUM_SUPERFRAME_SLOTS, UNIT_BACKOFF_PERIOD},
    phy::TrxState,
    sap::{
        start::{StartConfirm, StartRequest},
        Status,
    },
    time::Duration,
    timer::{StateChange, SuperframeKind, Timer},
    wire::{
        self,
        beacon::{superframe_beacon, BeaconOrder, SuperframeSpecification},
        Address, Frame, FrameContent, FrameType, ShortAddress,
    },
    DeviceType,
};

impl<Rng: RngCore> Mac<Rng> {
    /// Start a PAN, or start using a new superframe configuration
    pub fn mlme_start_request(
        &mut self,
        env: &mut impl Environment,
        request: StartRequest,
    ) -> StartConfirm {
        // A coordinator needs a short address for its beacons
        if self.mac_pib.short_address == ShortAddress::BROADCAST {
            return StartConfirm {
                status: Status::NoShortAddress,
            };
        }

        if self.device_type == DeviceType::Rfd {
            warn!("A reduced function device can't start a PAN");
            return StartConfirm {
                status: Status::InvalidParameter,
            };
        }

        if u8::from(request.superframe_order) > u8::from(request.beacon_order) {
            return StartConfirm {
                status: Status::InvalidParameter,
            };
        }

        if !env
            .get_phy_pib()
            .supports_channel(request.channel_page, request.channel_number)
        {
            return StartConfirm {
                status: Status::InvalidParameter,
            };
        }

        self.mac_pib.pan_id = request.pan_id;
        env.update_phy_pib(|phy_pib| {
            phy_pib.current_channel = request.channel_number;
            phy_pib.current_page = request.channel_page;
        });
        self.is_pan_coordinator = request.pan_coordinator;
        self.mac_pib.beacon_order = request.beacon_order;

        match request.beacon_order {
            BeaconOrder::BeaconOrder(_) => {
                self.mac_pib.superframe_order = request.superframe_order;
                self.mac_pib.batt_life_ext = request.battery_life_extension;

                let spec = self.own_superframe_spec();
                if !self.superframes.configure(SuperframeKind::Outgoing, &spec) {
                    return StartConfirm {
                        status: Status::InvalidParameter,
                    };
                }

                self.csma.configure_slotted();
                self.beaconing = true;
                self.beacon_timer.arm(env, Duration::ZERO, Timer::Beacon);
            }
            BeaconOrder::OnDemand => {
                self.mac_pib.superframe_order = request.superframe_order;
                self.superframes.stop(SuperframeKind::Outgoing, env);
                self.beacon_timer.cancel(env);
                self.beaconing = false;

                if self.superframes.is_active(SuperframeKind::Incoming) {
                    self.csma.configure_slotted();
                } else {
                    self.csma.configure_unslotted();
                }
            }
        }

        info!(
            "Started PAN {:04x} on channel {}, beacon order {}",
            request.pan_id.0,
            request.channel_number,
            u8::from(request.beacon_order)
        );

        self.refresh_receiver(env);

        StartConfirm {
            status: Status::Success,
        }
    }

    fn own_superframe_spec(&self) -> SuperframeSpecification {
        SuperframeSpecification {
            beacon_order: self.mac_pib.beacon_order,
            superframe_order: self.mac_pib.superframe_order,
            final_cap_slot: NUM_SUPERFRAME_SLOTS as u8 - 1,
            battery_life_extension: self.mac_pib.batt_life_ext,
            pan_coordinator: self.is_pan_coordinator,
            association_permit: self.mac_pib.association_permit,
        }
    }

    /// Put our beacon on air, or try again a backoff period later if the transmitter is taken
    pub(super) fn send_beacon(&mut self, env: &mut impl Environment) {
        if !self.beaconing {
            return;
        }

        let busy = matches!(self.state, MacState::Sending | MacState::AckPending)
            || self.change_state_timer.is_armed()
            || self.ifs_timer.is_armed();

        if busy {
            trace!("Beacon due while busy in state {:?}", self.state);
            let retry = Duration::from_symbols(UNIT_BACKOFF_PERIOD as u64, env.symbol_period());
            self.beacon_timer.arm(env, retry, Timer::Beacon);
            return;
        }

        if self.state == MacState::Csma {
            debug!("Beacon interrupts CSMA-CA");
            self.csma.cancel(env);
        }

        let pan_id = self.mac_pib.pan_id;
        let source = if wire::is_assigned(self.mac_pib.short_address) {
            Address::Short(pan_id, self.mac_pib.short_address)
        } else {
            Address::Extended(pan_id, self.mac_pib.extended_address)
        };

        let frame = Frame {
            header: wire::header(
                FrameType::Beacon,
                self.mac_pib.bsn.increment(),
                None,
                Some(source),
            ),
            content: FrameContent::Beacon(superframe_beacon(self.own_superframe_spec())),
            payload: unwrap!(Vec::from_slice(&self.mac_pib.beacon_payload)),
        };

        match OutgoingFrame::new(&frame) {
            Ok(beacon) => {
                trace!("Sending beacon {}", beacon.seq);
                self.tx_slot = TxSlot::Beacon(beacon);
                self.set_state(MacState::Sending);
                env.plme_set_trx_state_request(TrxState::TxOn);
            }
            Err(e) => {
                error!("Could not build the beacon: {:?}", e);
                self.set_state(MacState::Idle);
                self.defer_state_change(env, StateChange::Idle);
            }
        }
    }
}
