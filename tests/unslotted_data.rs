use lr_wpan_mac::{
    pib::PibValue,
    sap::{data::DataRequest, set::SetRequest, SentFrameReport, Status},
    test_helpers::{
        aether::NodeId,
        recorder::Upcall,
        sim::{Request, Simulation},
    },
    time::Duration,
    wire::{Address, AddressMode, PanId, ShortAddress},
    DeviceType,
};

const PAN: PanId = PanId(0x0abc);

fn set(sim: &mut Simulation, node: NodeId, pib_attribute: &'static str, value: PibValue) {
    let confirm = sim
        .request(
            node,
            Request::Set(SetRequest {
                pib_attribute,
                pib_attribute_value: value,
            }),
        )
        .unwrap();

    assert!(
        matches!(&confirm, Some(Upcall::SetConfirm(confirm)) if confirm.status == Status::Success),
        "Setting {pib_attribute} failed: {confirm:?}"
    );
}

/// Nodes in one PAN with short addresses 1, 2, 3, ...
fn network(nodes: usize) -> (Simulation, Vec<NodeId>) {
    let mut sim = Simulation::new();

    let nodes: Vec<_> = (0..nodes)
        .map(|index| {
            let node = sim.add_node(DeviceType::Ffd);
            set(&mut sim, node, PibValue::MAC_PAN_ID, PibValue::MacPanId(PAN));
            set(
                &mut sim,
                node,
                PibValue::MAC_SHORT_ADDRESS,
                PibValue::MacShortAddress(ShortAddress(index as u16 + 1)),
            );
            node
        })
        .collect();

    (sim, nodes)
}

fn listen(sim: &mut Simulation, node: NodeId) {
    set(
        sim,
        node,
        PibValue::MAC_RX_ON_WHEN_IDLE,
        PibValue::MacRxOnWhenIdle(true),
    );
}

fn send(sim: &mut Simulation, from: NodeId, to: u16, msdu: &[u8], msdu_handle: u8) {
    let request = DataRequest {
        src_addr_mode: AddressMode::Short,
        dst_address: Some(Address::Short(PAN, ShortAddress(to))),
        msdu: heapless::Vec::from_slice(msdu).unwrap(),
        msdu_handle,
        ack_tx: true,
        indirect_tx: false,
    };
    sim.request(from, Request::Data(request)).unwrap();
}

fn statuses(sim: &Simulation, node: NodeId) -> Vec<(u8, Status)> {
    sim.recorder(node)
        .data_confirms()
        .map(|confirm| (confirm.msdu_handle, confirm.status))
        .collect()
}

#[test_log::test]
fn queued_frames_go_out_in_order() {
    let (mut sim, nodes) = network(2);
    listen(&mut sim, nodes[1]);

    for handle in 0..5 {
        send(&mut sim, nodes[0], 2, &[handle; 10], handle);
    }
    assert_eq!(sim.mac(nodes[0]).tx_queue_len(), 5);

    sim.run_for(Duration::from_millis(100)).unwrap();

    pretty_assertions::assert_eq!(
        statuses(&sim, nodes[0]),
        (0..5).map(|handle| (handle, Status::Success)).collect::<Vec<_>>()
    );

    let received: Vec<_> = sim
        .recorder(nodes[1])
        .data_indications()
        .map(|indication| indication.msdu[0])
        .collect();
    pretty_assertions::assert_eq!(received, [0, 1, 2, 3, 4]);

    // Every confirm carries the moment its frame went on air
    let timestamps: Vec<_> = sim
        .recorder(nodes[0])
        .data_confirms()
        .map(|confirm| confirm.timestamp.unwrap())
        .collect();
    assert!(timestamps.windows(2).all(|pair| pair[0] < pair[1]));

    let counters = sim.mac(nodes[0]).counters();
    assert_eq!(counters.tx_success, 5);
    assert_eq!(counters.retransmissions, 0);
    assert_eq!(sim.mac(nodes[1]).counters().acks_sent, 5);
}

#[test_log::test]
fn broadcast_reaches_everyone_without_acknowledgment() {
    let (mut sim, nodes) = network(3);
    listen(&mut sim, nodes[1]);
    listen(&mut sim, nodes[2]);

    send(&mut sim, nodes[0], 0xffff, b"hello all", 1);
    sim.run_for(Duration::from_millis(20)).unwrap();

    pretty_assertions::assert_eq!(statuses(&sim, nodes[0]), [(1, Status::Success)]);
    for node in &nodes[1..] {
        assert_eq!(sim.recorder(*node).data_indications().count(), 1);
        assert_eq!(sim.mac(*node).counters().acks_sent, 0);
    }
}

#[test_log::test]
fn nobody_listening_means_no_ack() {
    let (mut sim, nodes) = network(2);

    send(&mut sim, nodes[0], 2, b"anyone?", 7);
    sim.run_for(Duration::from_millis(100)).unwrap();

    pretty_assertions::assert_eq!(statuses(&sim, nodes[0]), [(7, Status::NoAck)]);
    let confirm = sim.recorder(nodes[0]).data_confirms().next().unwrap();
    assert_eq!(confirm.num_of_retries, 3);
    assert_eq!(confirm.timestamp, None);

    assert!(matches!(
        sim.recorder(nodes[0]).sent_frames().next(),
        Some(SentFrameReport {
            msdu_handle: Some(7),
            status: Status::NoAck,
            retries: 3,
            csma_attempts: 4,
            ..
        })
    ));
    assert_eq!(sim.mac(nodes[0]).counters().ack_timeouts, 4);
    assert_eq!(sim.recorder(nodes[1]).data_indications().count(), 0);
}

#[test_log::test]
fn jammed_channel_fails_channel_access() {
    let (mut sim, nodes) = network(2);
    listen(&mut sim, nodes[1]);

    let now = sim.now();
    sim.aether().jam(11, now, Duration::from_seconds(1));

    send(&mut sim, nodes[0], 2, b"through the noise", 3);
    sim.run_for(Duration::from_millis(200)).unwrap();

    pretty_assertions::assert_eq!(
        statuses(&sim, nodes[0]),
        [(3, Status::ChannelAccessFailure)]
    );
    let report = sim.recorder(nodes[0]).sent_frames().next().unwrap();
    // macMaxCSMABackoffs + 1 assessments, all busy
    assert_eq!(report.csma_attempts, 5);
    assert_eq!(sim.mac(nodes[0]).counters().tx_channel_access_failure, 1);

    // Once the noise is gone the channel can be used again
    sim.run_for(Duration::from_seconds(1)).unwrap();
    send(&mut sim, nodes[0], 2, b"after the noise", 4);
    sim.run_for(Duration::from_millis(50)).unwrap();
    assert_eq!(statuses(&sim, nodes[0])[1], (4, Status::Success));
}

#[test_log::test]
fn hidden_nodes_collide() {
    let (mut sim, nodes) = network(3);
    listen(&mut sim, nodes[1]);
    sim.aether().block_link(nodes[0], nodes[2]);

    // No random backoff, so both senders assess the channel at the same moment every attempt
    for sender in [nodes[0], nodes[2]] {
        set(&mut sim, sender, PibValue::MAC_MIN_BE, PibValue::MacMinBe(0));
    }

    send(&mut sim, nodes[0], 2, b"from the left!", 1);
    send(&mut sim, nodes[2], 2, b"from the right", 2);
    sim.run_for(Duration::from_millis(100)).unwrap();

    pretty_assertions::assert_eq!(statuses(&sim, nodes[0]), [(1, Status::NoAck)]);
    pretty_assertions::assert_eq!(statuses(&sim, nodes[2]), [(2, Status::NoAck)]);

    // Every attempt of both arrived corrupted
    let receiver = sim.mac(nodes[1]).counters();
    assert_eq!(receiver.rx_fcs_errors, 8);
    assert_eq!(receiver.acks_sent, 0);
    assert_eq!(sim.recorder(nodes[1]).data_indications().count(), 0);
}
