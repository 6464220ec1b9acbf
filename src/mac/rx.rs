//! Reception: the three filter levels of 5.1.6.2 and what happens with the frames that pass

use heapless::Vec;
use rand_core::RngCore;

use super::{state::TxOrigin, Environment, Mac, MacState};
use crate::{
    consts::MAX_BEACON_PAYLOAD_LENGTH,
    sap::{
        beacon_notify::BeaconNotifyIndication, data::DataIndication, poll::PollConfirm,
        PanDescriptor, Status,
    },
    time::{Duration, Instant},
    timer::{StateChange, SuperframeKind, Timer},
    wire::{
        command::Command, Address, AddressExt, Frame, FrameContent, FrameError, FrameType,
        FrameVersion, Header, PanId, ShortAddress,
    },
};

impl<Rng: RngCore> Mac<Rng> {
    /// A frame was received by the PHY. `psdu` includes the FCS.
    pub fn pd_data_indication(
        &mut self,
        env: &mut impl Environment,
        psdu: &[u8],
        link_quality: u8,
    ) {
        let frame = match Frame::from_psdu(psdu) {
            Ok(frame) => frame,
            Err(FrameError::Fcs) => {
                self.counters.rx_fcs_errors += 1;
                trace!("Dropping frame with a bad FCS");
                return;
            }
            Err(e) => {
                self.counters.rx_malformed += 1;
                trace!("Dropping frame that can't be parsed: {:?}", e);
                return;
            }
        };
        self.counters.rx_frames += 1;

        let symbols = env.get_phy_pib().frame_symbols(psdu.len());
        let rx_time = env
            .now()
            .saturating_sub_duration(Duration::from_symbols(symbols as u64, env.symbol_period()));

        if self.mac_pib.promiscuous_mode {
            self.indicate_data(env, frame, link_quality, rx_time);
            return;
        }

        if let Err(reason) = self.accepts(&frame.header) {
            self.counters.rx_filtered += 1;
            trace!("Dropping frame: {}", reason);
            return;
        }

        let header = &frame.header;
        let group_destination = header.destination.is_some_and(|dst| dst.is_group());
        if matches!(header.frame_type, FrameType::Data | FrameType::MacCommand)
            && header.ack_request
            && !group_destination
        {
            self.acknowledge(env, &frame);
        }

        match frame.header.frame_type {
            FrameType::Acknowledgement => self.ack_received(env, &frame.header),
            FrameType::Beacon => self.beacon_received(env, &frame, link_quality, rx_time),
            FrameType::Data => self.data_received(env, frame, link_quality, rx_time),
            _ => trace!("Received command {}", frame.header.seq),
        }
    }

    /// Third level filtering. Returns why a frame is rejected.
    fn accepts(&self, header: &Header) -> Result<(), &'static str> {
        if !matches!(
            header.frame_type,
            FrameType::Beacon | FrameType::Data | FrameType::Acknowledgement | FrameType::MacCommand
        ) {
            return Err("unsupported frame type");
        }
        if !matches!(
            header.version,
            FrameVersion::Ieee802154_2003 | FrameVersion::Ieee802154_2006
        ) {
            return Err("unsupported frame version");
        }
        if header.auxiliary_security_header.is_some() {
            return Err("secured frame");
        }
        if header.frame_type == FrameType::Acknowledgement {
            return Ok(());
        }

        let pan_id = self.mac_pib.pan_id;
        let unassociated = pan_id == PanId::broadcast();

        match header.destination {
            Some(destination) => {
                let destination_pan = destination.pan_id();
                let any_pan_allowed = unassociated
                    && matches!(header.frame_type, FrameType::Beacon | FrameType::MacCommand);

                if destination_pan != pan_id
                    && destination_pan != PanId::broadcast()
                    && !any_pan_allowed
                {
                    return Err("destination PAN id");
                }

                match destination {
                    Address::Short(_, short) => {
                        let ours =
                            short == self.mac_pib.short_address && short != ShortAddress::BROADCAST;
                        if !ours && !(destination.is_group() && !header.ack_request) {
                            return Err("destination short address");
                        }
                    }
                    Address::Extended(_, extended) => {
                        if extended != self.mac_pib.extended_address {
                            return Err("destination extended address");
                        }
                    }
                }
            }
            // Only the PAN coordinator takes frames without destination, from its own PAN
            None if matches!(header.frame_type, FrameType::Data | FrameType::MacCommand) => {
                let from_our_pan = header.source.is_some_and(|src| src.pan_id() == pan_id);
                if !(self.is_pan_coordinator && from_our_pan) {
                    return Err("no destination");
                }
            }
            None => {}
        }

        if header.frame_type == FrameType::Beacon
            && !unassociated
            && header.source.is_some_and(|src| src.pan_id() != pan_id)
        {
            return Err("beacon of another PAN");
        }

        Ok(())
    }

    /// Interrupt whatever we do to acknowledge the frame
    fn acknowledge(&mut self, env: &mut impl Environment, frame: &Frame) {
        match self.state {
            MacState::AckPending => {
                debug!("Acknowledging a frame while waiting for our own acknowledgment");
                self.ack_wait_timer.cancel(env);
                self.prepare_retransmission(env);
            }
            MacState::Csma => self.csma.cancel(env),
            MacState::Sending => {
                warn!("Can't acknowledge frame {} while sending", frame.header.seq);
                return;
            }
            MacState::Idle => {}
        }

        let frame_pending = match (&frame.content, frame.header.source) {
            (FrameContent::Command(Command::DataRequest), Some(source)) => {
                let pending = self.pending.has_pending_for(&source);
                if pending {
                    self.pending_data_request = Some(source);
                }
                pending
            }
            _ => false,
        };

        self.change_state_timer.cancel(env);
        self.set_state(MacState::Idle);
        self.defer_state_change(
            env,
            StateChange::SendAck {
                seq: frame.header.seq,
                frame_pending,
            },
        );
    }

    fn ack_received(&mut self, env: &mut impl Environment, header: &Header) {
        if self.state != MacState::AckPending {
            trace!("Ignoring acknowledgment {} in state {:?}", header.seq, self.state);
            return;
        }
        let Some(head) = self.tx_queue.front() else {
            return;
        };

        self.ack_wait_timer.cancel(env);

        if header.seq != head.frame.seq {
            debug!(
                "Acknowledgment {} doesn't match frame {}",
                header.seq,
                head.frame.seq
            );
            self.prepare_retransmission(env);
            return;
        }

        let len = head.frame.psdu.len();
        if head.origin == TxOrigin::Poll {
            if header.frame_pending {
                let wait = self
                    .mac_pib
                    .max_frame_total_wait_time(env.get_phy_pib());
                let wait = Duration::from_symbols(wait as u64, env.symbol_period());
                debug!("Coordinator has data for us, waiting {}", wait);
                self.poll_wait_timer.arm(env, wait, Timer::PollWait);
            } else {
                env.mlme_poll_confirm(PollConfirm {
                    status: Status::NoData,
                });
            }
        }

        let tx_time = self.head_tx_time;
        self.finish_head(env, Status::Success, tx_time);
        self.after_successful_send(env, len);
    }

    fn data_received(
        &mut self,
        env: &mut impl Environment,
        frame: Frame,
        link_quality: u8,
        rx_time: Instant,
    ) {
        self.indicate_data(env, frame, link_quality, rx_time);

        if self.poll_wait_timer.is_armed() {
            self.poll_wait_timer.cancel(env);
            env.mlme_poll_confirm(PollConfirm {
                status: Status::Success,
            });
            self.refresh_receiver(env);
        }
    }

    fn indicate_data(
        &mut self,
        env: &mut impl Environment,
        frame: Frame,
        link_quality: u8,
        rx_time: Instant,
    ) {
        env.mcps_data_indication(DataIndication {
            source: frame.header.source,
            destination: frame.header.destination,
            msdu: frame.payload,
            mpdu_link_quality: link_quality,
            dsn: frame.header.seq,
            timestamp: rx_time,
        });
    }

    pub(super) fn poll_wait_expired(&mut self, env: &mut impl Environment) {
        debug!("No data arrived after the poll");
        env.mlme_poll_confirm(PollConfirm {
            status: Status::NoData,
        });
        self.refresh_receiver(env);
    }

    fn beacon_received(
        &mut self,
        env: &mut impl Environment,
        frame: &Frame,
        link_quality: u8,
        rx_time: Instant,
    ) {
        let FrameContent::Beacon(beacon) = &frame.content else {
            return;
        };
        self.counters.beacons_received += 1;

        let Some(coord_address) = frame.header.source else {
            trace!("Ignoring beacon without source address");
            return;
        };
        let spec = beacon.superframe_spec;

        let payload_len = frame.payload.len().min(MAX_BEACON_PAYLOAD_LENGTH);
        let phy_pib = env.get_phy_pib();
        let indication = BeaconNotifyIndication {
            beacon_sequence_number: frame.header.seq,
            pan_descriptor: PanDescriptor {
                coord_address,
                channel_number: phy_pib.current_channel,
                channel_page: phy_pib.current_page,
                super_frame_spec: spec,
                link_quality,
                timestamp: rx_time,
            },
            sdu: unwrap!(Vec::from_slice(&frame.payload[..payload_len])),
        };
        env.mlme_beacon_notify_indication(indication);

        if coord_address.pan_id() != self.mac_pib.pan_id {
            return;
        }

        match coord_address {
            Address::Short(_, short) => self.mac_pib.coord_short_address = short,
            Address::Extended(_, extended) => self.mac_pib.coord_extended_address = extended,
        }

        if self.superframes.configure(SuperframeKind::Incoming, &spec) {
            self.superframes
                .restart(SuperframeKind::Incoming, rx_time, env);
        } else {
            self.superframes.stop(SuperframeKind::Incoming, env);
        }

        // Our own superframe governs our timing while we send beacons
        if !self.beaconing {
            self.mac_pib.beacon_order = spec.beacon_order;
            self.mac_pib.superframe_order = spec.superframe_order;

            if self.superframes.is_active(SuperframeKind::Incoming) {
                self.csma.configure_slotted();
            } else {
                self.csma.configure_unslotted();
            }
        }

        self.beacon_found(env);
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::{
        mac::tests::{mac, Event, MockEnv},
        phy::{PhyStatus, TrxState},
        mac::tests::FixedRng,
        sap::data::{DataConfirm, DataRequest},
        wire::{
            self,
            beacon::{superframe_beacon, BeaconOrder, SuperframeOrder, SuperframeSpecification},
            AddressMode, ExtendedAddress,
        },
        DeviceType,
    };

    const PAN: PanId = PanId(0x1234);

    fn data_frame(destination: Address, ack_request: bool) -> std::vec::Vec<u8> {
        data_frame_with_seq(9, destination, ack_request)
    }

    fn data_frame_with_seq(seq: u8, destination: Address, ack_request: bool) -> std::vec::Vec<u8> {
        let mut header = wire::header(
            FrameType::Data,
            seq,
            Some(destination),
            Some(Address::Short(PAN, ShortAddress(0x0002))),
        );
        header.ack_request = ack_request;

        Frame {
            header,
            content: FrameContent::Data,
            payload: Vec::from_slice(&[1, 2, 3]).unwrap(),
        }
        .to_psdu()
        .unwrap()
        .to_vec()
    }

    fn associated_mac() -> crate::mac::Mac<crate::mac::tests::FixedRng> {
        let mut mac = mac(DeviceType::Ffd);
        mac.mac_pib.pan_id = PAN;
        mac.mac_pib.short_address = ShortAddress(0x0001);
        mac
    }

    fn ack_frame(seq: u8) -> std::vec::Vec<u8> {
        Frame {
            header: wire::header(FrameType::Acknowledgement, seq, None, None),
            content: FrameContent::Acknowledgement,
            payload: Vec::new(),
        }
        .to_psdu()
        .unwrap()
        .to_vec()
    }

    /// Queue a data frame to 0x0003 that asks for an acknowledgment
    fn request_data(env: &mut MockEnv, mac: &mut Mac<FixedRng>) {
        mac.mcps_data_request(
            env,
            DataRequest {
                src_addr_mode: AddressMode::Short,
                dst_address: Some(Address::Short(PAN, ShortAddress(0x0003))),
                msdu: Vec::from_slice(&[0xaa; 4]).unwrap(),
                msdu_handle: 1,
                ack_tx: true,
                indirect_tx: false,
            },
        );
    }

    /// Let the interframe space pass and take the head of the queue through CSMA-CA onto the air
    fn send_head(env: &mut MockEnv, mac: &mut Mac<FixedRng>) {
        env.now = env.now + Duration::from_millis(1);
        env.run_due(mac);
        assert_eq!(mac.state(), MacState::Csma);
        mac.plme_set_trx_state_confirm(env, PhyStatus::RxOn).unwrap();
        env.run_due(mac);
        mac.plme_cca_confirm(env, PhyStatus::Idle);
        mac.plme_set_trx_state_confirm(env, PhyStatus::TxOn).unwrap();
    }

    /// Send the acknowledgment that is due now
    fn send_ack(env: &mut MockEnv, mac: &mut Mac<FixedRng>) {
        env.run_due(mac);
        assert_eq!(mac.state(), MacState::Sending);
        mac.plme_set_trx_state_confirm(env, PhyStatus::TxOn).unwrap();
        mac.pd_data_confirm(env, PhyStatus::Success);
    }

    fn transmitted(events: &[Event]) -> std::vec::Vec<(FrameType, u8)> {
        events
            .iter()
            .filter_map(|event| match event {
                Event::Transmit(psdu) => Frame::from_psdu(psdu).ok(),
                _ => None,
            })
            .map(|frame| (frame.header.frame_type, frame.header.seq))
            .collect()
    }

    #[test_log::test]
    fn unicast_is_indicated_and_acknowledged() {
        let mut env = MockEnv::new();
        let mut mac = associated_mac();

        mac.pd_data_indication(
            &mut env,
            &data_frame(Address::Short(PAN, ShortAddress(0x0001)), true),
            200,
        );
        env.run_due(&mut mac);

        let events = env.take_events();
        let Event::DataIndication(indication) = &events[0] else {
            panic!("expected an indication, got {events:?}");
        };
        assert_eq!(indication.msdu, [1, 2, 3]);
        assert_eq!(indication.mpdu_link_quality, 200);
        assert_eq!(indication.dsn, 9);
        pretty_assertions::assert_eq!(events[1..], [Event::Trx(TrxState::TxOn)]);
        assert_eq!(mac.state(), MacState::Sending);

        mac.plme_set_trx_state_confirm(&mut env, PhyStatus::TxOn)
            .unwrap();
        let events = env.take_events();
        let Event::Transmit(ack) = &events[0] else {
            panic!("expected the acknowledgment, got {events:?}");
        };
        let ack = Frame::from_psdu(ack).unwrap();
        assert_eq!(ack.header.frame_type, FrameType::Acknowledgement);
        assert_eq!(ack.header.seq, 9);
        assert!(!ack.header.frame_pending);

        mac.pd_data_confirm(&mut env, PhyStatus::Success);
        assert_eq!(mac.counters().acks_sent, 1);
    }

    #[test_log::test]
    fn filtering() {
        let mut env = MockEnv::new();
        let mut mac = associated_mac();

        // Other device
        mac.pd_data_indication(
            &mut env,
            &data_frame(Address::Short(PAN, ShortAddress(0x0003)), false),
            0,
        );
        // Other PAN
        mac.pd_data_indication(
            &mut env,
            &data_frame(Address::Short(PanId(7), ShortAddress(0x0001)), false),
            0,
        );
        // Broadcast with an acknowledgment request
        mac.pd_data_indication(
            &mut env,
            &data_frame(Address::Short(PAN, ShortAddress::BROADCAST), true),
            0,
        );
        // Other extended address
        mac.pd_data_indication(
            &mut env,
            &data_frame(Address::Extended(PAN, ExtendedAddress(5)), false),
            0,
        );
        assert_eq!(mac.counters().rx_filtered, 4);

        // Corrupted
        let mut psdu = data_frame(Address::Short(PAN, ShortAddress(0x0001)), false);
        psdu[4] ^= 0xff;
        mac.pd_data_indication(&mut env, &psdu, 0);
        assert_eq!(mac.counters().rx_fcs_errors, 1);

        assert!(env.take_events().is_empty());

        // Broadcast without acknowledgment request is taken, but not acknowledged
        mac.pd_data_indication(
            &mut env,
            &data_frame(Address::Short(PAN, ShortAddress::BROADCAST), false),
            0,
        );
        env.run_due(&mut mac);
        let events = env.take_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::DataIndication(_)));
    }

    #[test_log::test]
    fn promiscuous_mode_takes_everything() {
        let mut env = MockEnv::new();
        let mut mac = associated_mac();
        mac.mac_pib.promiscuous_mode = true;

        mac.pd_data_indication(
            &mut env,
            &data_frame(Address::Short(PanId(7), ShortAddress(0x0003)), true),
            0,
        );
        env.run_due(&mut mac);

        let events = env.take_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::DataIndication(_)));
        assert_eq!(mac.counters().rx_filtered, 0);
    }

    #[test_log::test]
    fn beacon_from_another_pan_is_only_notified_when_unassociated() {
        let mut env = MockEnv::new();
        let mut mac = mac(DeviceType::Rfd);

        let beacon = Frame {
            header: wire::header(
                FrameType::Beacon,
                77,
                None,
                Some(Address::Short(PanId(7), ShortAddress(0))),
            ),
            content: FrameContent::Beacon(superframe_beacon(SuperframeSpecification {
                beacon_order: BeaconOrder::from(15),
                superframe_order: SuperframeOrder::from(15),
                final_cap_slot: 15,
                battery_life_extension: false,
                pan_coordinator: true,
                association_permit: false,
            })),
            payload: Vec::from_slice(b"hi").unwrap(),
        }
        .to_psdu()
        .unwrap();

        mac.pd_data_indication(&mut env, &beacon, 50);
        let events = env.take_events();
        let Event::BeaconNotify(notify) = &events[0] else {
            panic!("expected a beacon notification, got {events:?}");
        };
        assert_eq!(notify.beacon_sequence_number, 77);
        assert_eq!(notify.sdu, b"hi"[..]);
        assert_eq!(notify.pan_descriptor.link_quality, 50);
        // Not our PAN, so nothing is taken over
        assert_eq!(mac.mac_pib().coord_short_address, ShortAddress::BROADCAST);

        mac.mac_pib.pan_id = PAN;
        mac.pd_data_indication(&mut env, &beacon, 50);
        assert!(env.take_events().is_empty());
        assert_eq!(mac.counters().rx_filtered, 1);
        assert_eq!(mac.counters().beacons_received, 1);
    }

    #[test_log::test]
    fn mismatched_ack_means_a_retransmission() {
        let mut env = MockEnv::new();
        let mut mac = associated_mac();

        request_data(&mut env, &mut mac);
        send_head(&mut env, &mut mac);
        mac.pd_data_confirm(&mut env, PhyStatus::Success);
        assert_eq!(mac.state(), MacState::AckPending);

        mac.pd_data_indication(&mut env, &ack_frame(2), 255);
        assert_eq!(mac.retries, 1);
        assert_eq!(mac.counters().retransmissions, 1);

        send_head(&mut env, &mut mac);
        mac.pd_data_confirm(&mut env, PhyStatus::Success);
        mac.pd_data_indication(&mut env, &ack_frame(1), 255);

        let events = env.take_events();
        pretty_assertions::assert_eq!(
            transmitted(&events),
            [(FrameType::Data, 1), (FrameType::Data, 1)]
        );
        let confirm = events.iter().find_map(|event| match event {
            Event::DataConfirm(confirm) => Some(confirm),
            _ => None,
        });
        assert!(matches!(
            confirm,
            Some(DataConfirm {
                msdu_handle: 1,
                status: Status::Success,
                num_of_retries: 1,
                ..
            })
        ));
    }

    #[test_log::test]
    fn incoming_frame_is_acknowledged_before_our_retransmission() {
        let mut env = MockEnv::new();
        let mut mac = associated_mac();

        request_data(&mut env, &mut mac);
        send_head(&mut env, &mut mac);
        mac.pd_data_confirm(&mut env, PhyStatus::Success);
        assert_eq!(mac.state(), MacState::AckPending);
        env.take_events();

        mac.pd_data_indication(
            &mut env,
            &data_frame_with_seq(42, Address::Short(PAN, ShortAddress(0x0001)), true),
            200,
        );
        assert!(!env.is_scheduled(Timer::AckWait));
        send_ack(&mut env, &mut mac);
        send_head(&mut env, &mut mac);

        pretty_assertions::assert_eq!(
            transmitted(&env.take_events()),
            [(FrameType::Acknowledgement, 42), (FrameType::Data, 1)]
        );
        assert_eq!(mac.counters().retransmissions, 1);
        assert_eq!(mac.counters().acks_sent, 1);
    }

    #[test_log::test]
    fn incoming_frame_interrupts_csma() {
        let mut env = MockEnv::new();
        let mut mac = associated_mac();

        request_data(&mut env, &mut mac);
        env.run_due(&mut mac);
        mac.plme_set_trx_state_confirm(&mut env, PhyStatus::RxOn)
            .unwrap();
        assert_eq!(mac.state(), MacState::Csma);
        env.take_events();

        mac.pd_data_indication(
            &mut env,
            &data_frame_with_seq(42, Address::Short(PAN, ShortAddress(0x0001)), true),
            200,
        );
        assert!(!env
            .scheduled
            .iter()
            .any(|(_, _, timer)| matches!(timer, Timer::Csma(_))));
        send_ack(&mut env, &mut mac);
        send_head(&mut env, &mut mac);

        pretty_assertions::assert_eq!(
            transmitted(&env.take_events()),
            [(FrameType::Acknowledgement, 42), (FrameType::Data, 1)]
        );
        // Picking up CSMA-CA again is not a retransmission
        assert_eq!(mac.counters().retransmissions, 0);
    }
}
