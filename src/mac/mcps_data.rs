use heapless::Vec;
use rand_core::RngCore;

use super::{
    pending::PendingTransaction,
    state::{OutgoingFrame, TxOrigin, TxQueueElement},
    Environment, Mac,
};
use crate::{
    consts::{MAX_MAC_PAYLOAD_SIZE, MAX_PHY_PACKET_SIZE, MIN_MPDU_OVERHEAD},
    sap::{
        data::{DataConfirm, DataRequest},
        purge::{PurgeConfirm, PurgeRequest},
        Status,
    },
    time::Duration,
    wire::{self, Address, AddressExt, AddressMode, Frame, FrameContent, FrameType},
};

impl<Rng: RngCore> Mac<Rng> {
    /// Queue an MSDU for transmission.
    ///
    /// Every request gets exactly one [`DataConfirm`], either right away when it's rejected or
    /// when the frame leaves the transmit queue or the pending transactions.
    pub fn mcps_data_request(&mut self, env: &mut impl Environment, request: DataRequest) {
        let msdu_handle = request.msdu_handle;

        let frame = match self.data_frame(&request) {
            Ok(frame) => frame,
            Err(status) => {
                debug!("Rejecting data request {}: {:?}", msdu_handle, status);
                env.mcps_data_confirm(DataConfirm {
                    msdu_handle,
                    status,
                    timestamp: None,
                    num_of_retries: 0,
                });
                return;
            }
        };

        // Any coordinator keeps indirect transactions, also one that beacons without being the
        // PAN coordinator
        if request.indirect_tx && (self.beaconing || self.is_pan_coordinator) {
            let persistence = self.mac_pib.transaction_persistence_unit()
                * self.mac_pib.transaction_persistence_time as u64;
            let expiry = env.now() + Duration::from_symbols(persistence, env.symbol_period());

            let transaction = PendingTransaction {
                msdu_handle,
                frame,
                expiry,
            };

            if self.pending.push(transaction).is_err() {
                self.reject_overflow(env, msdu_handle);
            } else {
                trace!("Data request {} is pending until {}", msdu_handle, expiry);
            }
            return;
        }

        let element = TxQueueElement {
            origin: TxOrigin::Data { msdu_handle },
            frame,
        };

        if self.tx_queue.push_back(element).is_err() {
            self.reject_overflow(env, msdu_handle);
            return;
        }

        self.counters.tx_enqueued += 1;
        self.check_queue(env);
    }

    fn data_frame(&mut self, request: &DataRequest) -> Result<OutgoingFrame, Status> {
        if request.msdu.len() + MIN_MPDU_OVERHEAD > MAX_PHY_PACKET_SIZE {
            return Err(Status::FrameTooLong);
        }

        let pan_id = self.mac_pib.pan_id;
        let source = match request.src_addr_mode {
            AddressMode::None => None,
            AddressMode::Short if wire::is_assigned(self.mac_pib.short_address) => {
                Some(Address::Short(pan_id, self.mac_pib.short_address))
            }
            AddressMode::Short | AddressMode::Extended => {
                Some(Address::Extended(pan_id, self.mac_pib.extended_address))
            }
        };

        if source.is_none() && request.dst_address.is_none() {
            return Err(Status::InvalidAddress);
        }

        let seq = self.mac_pib.dsn.peek_next();
        let mut header = wire::header(FrameType::Data, seq, request.dst_address, source);
        header.ack_request = request.ack_tx
            && request
                .dst_address
                .is_some_and(|destination| !destination.is_group());

        let payload: Vec<u8, MAX_MAC_PAYLOAD_SIZE> = unwrap!(Vec::from_slice(&request.msdu));
        let frame = Frame {
            header,
            content: FrameContent::Data,
            payload,
        };

        let frame = OutgoingFrame::new(&frame).map_err(|_| Status::FrameTooLong)?;
        self.mac_pib.dsn.increment();
        Ok(frame)
    }

    fn reject_overflow(&mut self, env: &mut impl Environment, msdu_handle: u8) {
        warn!("No room for data request {}", msdu_handle);
        self.counters.tx_overflow += 1;
        env.mcps_data_confirm(DataConfirm {
            msdu_handle,
            status: Status::TransactionOverflow,
            timestamp: None,
            num_of_retries: 0,
        });
    }

    /// Remove an indirect transaction before it's picked up
    pub fn mcps_purge_request(&mut self, request: PurgeRequest) -> PurgeConfirm {
        let status = if self.pending.purge(request.msdu_handle) {
            Status::Success
        } else {
            Status::InvalidHandle
        };

        PurgeConfirm {
            msdu_handle: request.msdu_handle,
            status,
        }
    }

    /// Drop the pending transactions whose persistence time has passed.
    ///
    /// The host decides how often to call this.
    pub fn purge_expired_transactions(&mut self, env: &mut impl Environment) {
        while let Some(transaction) = self.pending.take_expired(env.now()) {
            debug!("Transaction {} expired", transaction.msdu_handle);
            self.counters.tx_expired += 1;
            env.mcps_data_confirm(DataConfirm {
                msdu_handle: transaction.msdu_handle,
                status: Status::TransactionExpired,
                timestamp: None,
                num_of_retries: 0,
            });
        }
    }

    /// Move the transaction the device asked for to the transmit queue
    pub(super) fn serve_data_request(&mut self, env: &mut impl Environment, device: Address) {
        let Some(transaction) = self.pending.take_for(&device) else {
            return;
        };
        let msdu_handle = transaction.msdu_handle;

        let element = TxQueueElement {
            origin: TxOrigin::Data { msdu_handle },
            frame: transaction.frame,
        };

        if self.tx_queue.push_back(element).is_err() {
            self.reject_overflow(env, msdu_handle);
            return;
        }

        debug!("Serving transaction {}", msdu_handle);
        self.counters.tx_enqueued += 1;
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::{
        consts::PENDING_QUEUE_CAPACITY,
        mac::{
            tests::{mac, Event, MockEnv},
            MacState,
        },
        phy::TrxState,
        time::Instant,
        wire::{ExtendedAddress, PanId, ShortAddress},
        DeviceType,
    };

    const PAN: PanId = PanId(0x1234);

    fn broadcast() -> Address {
        Address::Short(PAN, ShortAddress::BROADCAST)
    }

    fn request(handle: u8, destination: Option<Address>) -> DataRequest {
        DataRequest {
            src_addr_mode: AddressMode::Short,
            dst_address: destination,
            msdu: Vec::from_slice(&[handle; 4]).unwrap(),
            msdu_handle: handle,
            ack_tx: true,
            indirect_tx: false,
        }
    }

    fn sent_frame(events: &[Event]) -> Frame {
        let psdu = events
            .iter()
            .find_map(|event| match event {
                Event::Transmit(psdu) => Some(psdu.clone()),
                _ => None,
            })
            .expect("nothing was transmitted");
        Frame::from_psdu(&psdu).unwrap()
    }

    #[test_log::test]
    fn broadcast_never_asks_for_an_ack() {
        let mut env = MockEnv::new();
        let mut mac = mac(DeviceType::Ffd);
        mac.mac_pib.pan_id = PAN;
        mac.mac_pib.short_address = ShortAddress(1);

        mac.mcps_data_request(&mut env, request(1, Some(broadcast())));
        assert_eq!(mac.tx_queue_len(), 1);

        // Walk the frame through CSMA-CA with an idle channel
        env.run_due(&mut mac);
        assert_eq!(mac.state(), MacState::Csma);
        mac.plme_set_trx_state_confirm(&mut env, crate::phy::PhyStatus::RxOn)
            .unwrap();
        env.now = env.now + Duration::from_millis(10);
        env.run_due(&mut mac);
        mac.plme_cca_confirm(&mut env, crate::phy::PhyStatus::Idle);
        mac.plme_set_trx_state_confirm(&mut env, crate::phy::PhyStatus::TxOn)
            .unwrap();

        let frame = sent_frame(&env.take_events());
        assert!(!frame.header.ack_request);
        assert_eq!(frame.header.destination, Some(broadcast()));
        assert_eq!(frame.header.source, Some(Address::Short(PAN, ShortAddress(1))));
        assert_eq!(frame.payload, [1, 1, 1, 1]);

        mac.pd_data_confirm(&mut env, crate::phy::PhyStatus::Success);
        let events = env.take_events();
        assert!(matches!(
            events.as_slice(),
            [
                Event::Sent(_),
                Event::DataConfirm(DataConfirm {
                    msdu_handle: 1,
                    status: Status::Success,
                    ..
                })
            ]
        ));
        assert_eq!(mac.tx_queue_len(), 0);
    }

    #[test_log::test]
    fn invalid_requests_are_rejected_right_away() {
        let mut env = MockEnv::new();
        let mut mac = mac(DeviceType::Ffd);

        let mut too_long = request(1, Some(broadcast()));
        too_long.msdu = Vec::from_slice(&[0; 119]).unwrap();
        mac.mcps_data_request(&mut env, too_long);

        let mut no_addresses = request(2, None);
        no_addresses.src_addr_mode = AddressMode::None;
        mac.mcps_data_request(&mut env, no_addresses);

        let statuses: std::vec::Vec<_> = env
            .take_events()
            .into_iter()
            .map(|event| match event {
                Event::DataConfirm(confirm) => (confirm.msdu_handle, confirm.status),
                event => panic!("unexpected {event:?}"),
            })
            .collect();
        pretty_assertions::assert_eq!(
            statuses,
            [(1, Status::FrameTooLong), (2, Status::InvalidAddress)]
        );
        assert_eq!(mac.tx_queue_len(), 0);
        assert!(env.scheduled.is_empty());
    }

    #[test_log::test]
    fn unset_short_address_sends_from_extended() {
        let mut mac = mac(DeviceType::Rfd);
        mac.mac_pib.pan_id = PAN;
        mac.mac_pib.short_address = wire::USE_EXTENDED;

        let frame = mac
            .data_frame(&request(1, Some(Address::Short(PAN, ShortAddress(0)))))
            .unwrap();
        let parsed = Frame::from_psdu(&frame.psdu).unwrap();
        assert_eq!(
            parsed.header.source,
            Some(Address::Extended(PAN, ExtendedAddress(0x0102_0304_0506_0708)))
        );
        assert!(parsed.header.ack_request);
    }

    #[test_log::test]
    fn pending_queue_overflow_leaves_it_unchanged() {
        let mut env = MockEnv::new();
        let mut mac = mac(DeviceType::Ffd);
        mac.is_pan_coordinator = true;
        mac.mac_pib.pan_id = PAN;
        mac.mac_pib.short_address = ShortAddress(0);

        for handle in 0..=PENDING_QUEUE_CAPACITY as u8 {
            let mut request = request(handle, Some(Address::Short(PAN, ShortAddress(5))));
            request.indirect_tx = true;
            mac.mcps_data_request(&mut env, request);
        }

        assert_eq!(mac.pending_len(), PENDING_QUEUE_CAPACITY);
        assert_eq!(mac.tx_queue_len(), 0);
        pretty_assertions::assert_eq!(
            env.take_events(),
            [Event::DataConfirm(DataConfirm {
                msdu_handle: PENDING_QUEUE_CAPACITY as u8,
                status: Status::TransactionOverflow,
                timestamp: None,
                num_of_retries: 0,
            })]
        );
        assert_eq!(mac.counters().tx_overflow, 1);
    }

    #[test_log::test]
    fn purge_and_expiry() {
        let mut env = MockEnv::new();
        let mut mac = mac(DeviceType::Ffd);
        mac.is_pan_coordinator = true;
        mac.mac_pib.short_address = ShortAddress(0);
        mac.mac_pib.transaction_persistence_time = 2;

        for handle in 1..=3 {
            let mut request = request(handle, Some(Address::Short(PAN, ShortAddress(5))));
            request.indirect_tx = true;
            mac.mcps_data_request(&mut env, request);
        }

        assert_eq!(
            mac.mcps_purge_request(PurgeRequest { msdu_handle: 2 }),
            PurgeConfirm {
                msdu_handle: 2,
                status: Status::Success
            }
        );
        assert_eq!(
            mac.mcps_purge_request(PurgeRequest { msdu_handle: 2 }).status,
            Status::InvalidHandle
        );

        // 2 units of a base superframe, just before the deadline nothing happens
        let persistence = Duration::from_symbols(2 * 960, crate::mac::tests::SYMBOL);
        env.now = Instant::ZERO + persistence - Duration::from_micros(1);
        mac.purge_expired_transactions(&mut env);
        assert!(env.take_events().is_empty());

        env.now = Instant::ZERO + persistence;
        mac.purge_expired_transactions(&mut env);
        let handles: std::vec::Vec<_> = env
            .take_events()
            .into_iter()
            .filter_map(|event| match event {
                Event::DataConfirm(DataConfirm {
                    msdu_handle,
                    status: Status::TransactionExpired,
                    ..
                }) => Some(msdu_handle),
                _ => None,
            })
            .collect();
        assert_eq!(handles, [1, 3]);
        assert_eq!(mac.pending_len(), 0);
        assert_eq!(mac.counters().tx_expired, 2);
    }

    #[test_log::test]
    fn rejected_requests_leave_the_dsn_alone() {
        let mut env = MockEnv::new();
        let mut mac = mac(DeviceType::Ffd);
        mac.mac_pib.pan_id = PAN;
        mac.mac_pib.short_address = ShortAddress(1);
        let dsn = mac.mac_pib.dsn.value();

        let mut too_long = request(1, Some(broadcast()));
        too_long.msdu = Vec::from_slice(&[0; 119]).unwrap();
        mac.mcps_data_request(&mut env, too_long);
        assert_eq!(mac.mac_pib.dsn.value(), dsn);

        let frame = mac
            .data_frame(&request(2, Some(Address::Short(PAN, ShortAddress(0)))))
            .unwrap();
        assert_eq!(frame.seq, dsn.wrapping_add(1));
        assert_eq!(mac.mac_pib.dsn.value(), frame.seq);
    }

    #[test_log::test]
    fn dsn_wraps_to_zero() {
        let mut mac = mac(DeviceType::Ffd);
        mac.mac_pib.pan_id = PAN;
        mac.mac_pib.short_address = ShortAddress(1);
        mac.mac_pib.dsn = crate::pib::SequenceNumber::new(255);

        let destination = Some(Address::Short(PAN, ShortAddress(0)));
        let first = mac.data_frame(&request(1, destination)).unwrap();
        let second = mac.data_frame(&request(2, destination)).unwrap();

        assert_eq!(Frame::from_psdu(&first.psdu).unwrap().header.seq, 0);
        assert_eq!(second.seq, 1);
    }

    #[test_log::test]
    fn beaconing_coordinator_keeps_indirect_transactions() {
        let mut env = MockEnv::new();
        let mut mac = mac(DeviceType::Ffd);
        mac.mac_pib.short_address = ShortAddress(0x0001);

        let start = crate::sap::start::StartRequest {
            pan_id: PAN,
            channel_number: 15,
            channel_page: crate::ChannelPage::Mhz868_915_2450,
            beacon_order: crate::wire::beacon::BeaconOrder::from(6),
            superframe_order: crate::wire::beacon::SuperframeOrder::from(4),
            pan_coordinator: false,
            battery_life_extension: false,
        };
        assert_eq!(mac.mlme_start_request(&mut env, start).status, Status::Success);
        assert!(!mac.is_pan_coordinator());
        env.take_events();

        let mut indirect = request(7, Some(Address::Short(PAN, ShortAddress(5))));
        indirect.indirect_tx = true;
        mac.mcps_data_request(&mut env, indirect);

        assert_eq!(mac.pending_len(), 1);
        assert_eq!(mac.tx_queue_len(), 0);
        assert!(env.take_events().is_empty());
    }

    #[test_log::test]
    fn served_transaction_moves_to_the_queue() {
        let mut env = MockEnv::new();
        let mut mac = mac(DeviceType::Ffd);
        mac.is_pan_coordinator = true;
        mac.mac_pib.short_address = ShortAddress(0);

        let device = Address::Short(PAN, ShortAddress(5));
        let mut request = request(9, Some(device));
        request.indirect_tx = true;
        mac.mcps_data_request(&mut env, request);

        mac.serve_data_request(&mut env, Address::Short(PAN, ShortAddress(6)));
        assert_eq!(mac.tx_queue_len(), 0);

        mac.serve_data_request(&mut env, device);
        assert_eq!(mac.tx_queue_len(), 1);
        assert_eq!(mac.pending_len(), 0);
        assert_eq!(mac.tx_queue.front().and_then(|e| e.msdu_handle()), Some(9));
        assert!(!env.events.contains(&Event::Trx(TrxState::TxOn)));
    }
}
