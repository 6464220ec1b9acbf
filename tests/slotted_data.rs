use lr_wpan_mac::{
    pib::PibValue,
    sap::{data::DataRequest, set::SetRequest, start::StartRequest, sync::SyncRequest, Status},
    test_helpers::{
        aether::NodeId,
        sim::{Request, Simulation},
    },
    time::Duration,
    timer::SuperframeKind,
    wire::{
        beacon::{BeaconOrder, SuperframeOrder},
        Address, AddressMode, PanId, ShortAddress,
    },
    ChannelPage, DeviceType,
};

const PAN: PanId = PanId(0x0777);
const SYMBOL: Duration = Duration::from_micros(16);

fn set(sim: &mut Simulation, node: NodeId, pib_attribute: &'static str, value: PibValue) {
    sim.request(
        node,
        Request::Set(SetRequest {
            pib_attribute,
            pib_attribute_value: value,
        }),
    )
    .unwrap();
}

/// A coordinator with beacon order 6 and superframe order 4 and a device that tracks its beacons
fn setup() -> (Simulation, NodeId, NodeId) {
    let mut sim = Simulation::new();

    let coordinator = sim.add_node(DeviceType::Ffd);
    set(
        &mut sim,
        coordinator,
        PibValue::MAC_SHORT_ADDRESS,
        PibValue::MacShortAddress(ShortAddress(0)),
    );
    sim.request(
        coordinator,
        Request::Start(StartRequest {
            pan_id: PAN,
            channel_number: 22,
            channel_page: ChannelPage::Mhz868_915_2450,
            beacon_order: BeaconOrder::BeaconOrder(6),
            superframe_order: SuperframeOrder::SuperframeOrder(4),
            pan_coordinator: true,
            battery_life_extension: false,
        }),
    )
    .unwrap();

    let device = sim.add_node(DeviceType::Rfd);
    set(&mut sim, device, PibValue::MAC_PAN_ID, PibValue::MacPanId(PAN));
    set(
        &mut sim,
        device,
        PibValue::MAC_SHORT_ADDRESS,
        PibValue::MacShortAddress(ShortAddress(9)),
    );
    sim.request(
        device,
        Request::Sync(SyncRequest {
            channel_number: 22,
            channel_page: ChannelPage::Mhz868_915_2450,
            track_beacon: true,
        }),
    )
    .unwrap();

    sim.run_for(Duration::from_seconds(2)).unwrap();
    assert!(sim.mac(device).csma().is_slotted());
    assert!(sim.mac(device).superframes().is_active(SuperframeKind::Incoming));

    (sim, coordinator, device)
}

fn data(msdu_handle: u8) -> Request {
    Request::Data(DataRequest {
        src_addr_mode: AddressMode::Short,
        dst_address: Some(Address::Short(PAN, ShortAddress(0))),
        msdu: heapless::Vec::from_slice(&[msdu_handle; 20]).unwrap(),
        msdu_handle,
        ack_tx: true,
        indirect_tx: false,
    })
}

#[test_log::test]
fn frames_only_go_out_in_the_cap() {
    let (mut sim, coordinator, device) = setup();

    // Spread over the active and the inactive part of the superframe
    for (index, delay) in [0, 300, 600, 900].into_iter().enumerate() {
        sim.schedule_request(Duration::from_millis(delay), device, data(index as u8));
    }
    sim.run_for(Duration::from_seconds(3)).unwrap();

    let confirms: Vec<_> = sim
        .recorder(device)
        .data_confirms()
        .map(|confirm| (confirm.msdu_handle, confirm.status))
        .collect();
    pretty_assertions::assert_eq!(
        confirms,
        (0..4).map(|handle| (handle, Status::Success)).collect::<Vec<_>>()
    );

    let beacons: Vec<_> = sim
        .recorder(device)
        .beacon_notifications()
        .map(|(_, notification)| notification.pan_descriptor.timestamp)
        .collect();
    // 16 slots of 60 * 2^4 symbols
    let active = Duration::from_symbols(16 * 60 * 16, SYMBOL);

    for indication in sim.recorder(coordinator).data_indications() {
        let beacon = beacons
            .iter()
            .rev()
            .find(|beacon| **beacon <= indication.timestamp)
            .unwrap();
        assert!(
            indication.timestamp - *beacon < active,
            "frame {} at {} is outside the CAP that started at {}",
            indication.msdu[0],
            indication.timestamp,
            beacon
        );
    }
    assert_eq!(sim.recorder(coordinator).data_indications().count(), 4);
}
