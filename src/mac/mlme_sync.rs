use rand_core::RngCore;

use super::{Environment, Mac, SyncState};
use crate::{
    consts::{BASE_SUPERFRAME_DURATION, MAX_LOST_BEACONS},
    sap::sync::{SyncLossIndication, SyncLossReason, SyncRequest},
    time::Duration,
    timer::{SuperframeKind, Timer},
};

impl<Rng: RngCore> Mac<Rng> {
    /// Start listening for the beacons of our coordinator.
    ///
    /// A lost synchronization is reported through
    /// [`crate::sap::UpperLayer::mlme_sync_loss_indication`].
    pub fn mlme_sync_request(&mut self, env: &mut impl Environment, request: SyncRequest) {
        env.update_phy_pib(|phy_pib| {
            phy_pib.current_channel = request.channel_number;
            phy_pib.current_page = request.channel_page;
        });

        debug!(
            "Searching for the beacon on channel {}, tracking: {}",
            request.channel_number,
            request.track_beacon
        );

        self.sync = Some(SyncState {
            track: request.track_beacon,
            lost_beacons: 0,
        });
        self.arm_beacon_search(env);
        self.refresh_receiver(env);
    }

    /// `aBaseSuperframeDuration * (2^n + 1)` symbols where n is macBeaconOrder
    fn arm_beacon_search(&mut self, env: &mut impl Environment) {
        let beacon_order = u8::from(self.mac_pib.beacon_order) as u32;
        let symbols = ((1u64 << beacon_order) + 1) * BASE_SUPERFRAME_DURATION as u64;
        let timeout = Duration::from_symbols(symbols, env.symbol_period());

        self.beacon_search_timer.arm(
            env,
            timeout,
            Timer::BeaconSearchTimeout,
        );
    }

    /// A beacon of our coordinator arrived
    pub(super) fn beacon_found(&mut self, env: &mut impl Environment) {
        let Some(sync) = self.sync.as_mut() else {
            return;
        };

        sync.lost_beacons = 0;

        if sync.track {
            self.arm_beacon_search(env);
        } else {
            trace!("Synchronized, not tracking");
            self.beacon_search_timer.cancel(env);
            self.sync = None;
            self.refresh_receiver(env);
        }
    }

    pub(super) fn beacon_search_timeout(&mut self, env: &mut impl Environment) {
        let Some(sync) = self.sync.as_mut() else {
            return;
        };

        sync.lost_beacons += 1;
        debug!("Missed beacon number {}", sync.lost_beacons);

        if sync.track && sync.lost_beacons < MAX_LOST_BEACONS {
            self.arm_beacon_search(env);
            return;
        }

        warn!("Lost synchronization with the coordinator");
        self.sync = None;
        self.superframes.stop(SuperframeKind::Incoming, env);
        if !self.beaconing {
            self.csma.configure_unslotted();
        }

        let phy_pib = env.get_phy_pib();
        let indication = SyncLossIndication {
            loss_reason: SyncLossReason::BeaconLost,
            pan_id: self.mac_pib.pan_id,
            channel_number: phy_pib.current_channel,
            channel_page: phy_pib.current_page,
        };
        env.mlme_sync_loss_indication(indication);

        self.refresh_receiver(env);
    }
}
