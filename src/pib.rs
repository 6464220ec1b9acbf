use heapless::Vec;

use crate::{
    consts::{
        BASE_SUPERFRAME_DURATION, LIFS_PERIOD, MAX_BEACON_PAYLOAD_LENGTH, MAX_PHY_PACKET_SIZE,
        SIFS_PERIOD, TURNAROUND_TIME, UNIT_BACKOFF_PERIOD,
    },
    sap::Status,
    time::Instant,
    wire::{
        beacon::{BeaconOrder, SuperframeOrder},
        ExtendedAddress, PanId, ShortAddress,
    },
    ChannelPage,
};

#[derive(Debug, Clone)]
pub struct PhyPib {
    pub pib_write: PhyPibWrite,
    /// Read only
    ///
    /// Each entry in the list consists of a channel page
    /// and a list of channel numbers supported for that
    /// channel page.
    #[doc(alias = "phyChannelsSupported")]
    pub channels_supported: &'static [ChannelDescription],
    /// Read only
    ///
    /// The maximum number of symbols in a frame, as defined in 9.4.
    #[doc(alias = "phyMaxFrameDuration")]
    pub max_frame_duration: u32,
    /// Read only
    ///
    /// The duration of the synchronization header (SHR) in symbols for the current PHY.
    #[doc(alias = "phySHRDuration")]
    pub shr_duration: u32,
    /// Read only
    ///
    /// The number of symbols per octet for the current PHY.
    #[doc(alias = "phySymbolsPerOctet")]
    pub symbols_per_octet: f32,
}

impl PhyPib {
    /// The 2450 MHz O-QPSK PHY: 62.5 ksymbol/s, 4 bits per symbol, 10 symbol SHR
    pub fn o_qpsk_2450() -> Self {
        Self::new(
            10,
            2.0,
            &[ChannelDescription {
                page: ChannelPage::Mhz868_915_2450,
                channel_numbers: &[11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26],
            }],
            11,
        )
    }

    /// The 868 MHz BPSK PHY: 20 ksymbol/s, 1 bit per symbol, 40 symbol SHR
    pub fn bpsk_868() -> Self {
        Self::new(
            40,
            8.0,
            &[ChannelDescription {
                page: ChannelPage::Mhz868_915_2450,
                channel_numbers: &[0],
            }],
            0,
        )
    }

    fn new(
        shr_duration: u32,
        symbols_per_octet: f32,
        channels_supported: &'static [ChannelDescription],
        current_channel: u8,
    ) -> Self {
        #[allow(unused_imports)]
        use micromath::F32Ext;

        let max_frame_duration = shr_duration
            + (((MAX_PHY_PACKET_SIZE + 1) as f32 * symbols_per_octet).ceil() as u32);

        Self {
            pib_write: PhyPibWrite {
                current_channel,
                current_page: ChannelPage::Mhz868_915_2450,
                tx_power: 0,
                cca_mode: CcaMode::EnergyAboveThreshold,
            },
            channels_supported,
            max_frame_duration,
            shr_duration,
            symbols_per_octet,
        }
    }

    /// The amount of symbols it takes to put a PSDU of `psdu_len` octets on the air,
    /// including the SHR and the PHR.
    pub fn frame_symbols(&self, psdu_len: usize) -> u32 {
        #[allow(unused_imports)]
        use micromath::F32Ext;

        self.shr_duration + ((1 + psdu_len) as f32 * self.symbols_per_octet).ceil() as u32
    }

    /// Check whether a channel number is supported on the given page
    pub fn supports_channel(&self, page: ChannelPage, channel: u8) -> bool {
        self.channels_supported
            .iter()
            .any(|desc| desc.page == page && desc.channel_numbers.contains(&channel))
    }

    #[rustfmt::skip]
    pub fn get(&self, attribute: &str) -> Option<PibValue> {
        if !attribute.starts_with("phy") {
            return None;
        }

        let value = match attribute {
            PibValue::PHY_CHANNELS_SUPPORTED => PibValue::PhyChannelsSupported(self.channels_supported),
            PibValue::PHY_MAX_FRAME_DURATION => PibValue::PhyMaxFrameDuration(self.max_frame_duration),
            PibValue::PHY_SHR_DURATION => PibValue::PhyShrDuration(self.shr_duration),
            PibValue::PHY_SYMBOLS_PER_OCTET => PibValue::PhySymbolsPerOctet(self.symbols_per_octet),
            PibValue::PHY_CURRENT_CHANNEL => PibValue::PhyCurrentChannel(self.current_channel),
            PibValue::PHY_CURRENT_PAGE => PibValue::PhyCurrentPage(self.current_page),
            PibValue::PHY_TX_POWER => PibValue::PhyTxPower(self.tx_power),
            PibValue::PHY_CCA_MODE => PibValue::PhyCcaMode(self.cca_mode),
            _ => return None,
        };

        Some(value)
    }
}

impl core::ops::DerefMut for PhyPib {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.pib_write
    }
}

impl core::ops::Deref for PhyPib {
    type Target = PhyPibWrite;

    fn deref(&self) -> &Self::Target {
        &self.pib_write
    }
}

#[derive(Debug, Clone)]
pub struct PhyPibWrite {
    /// The RF channel to use for all following transmissions and receptions, 8.1.2.
    #[doc(alias = "phyCurrentChannel")]
    pub current_channel: u8,
    /// The transmit power of the device in dBm.
    #[doc(alias = "phyTXPower")]
    pub tx_power: i16,
    /// The CCA mode, as defined in 8.2.7.
    #[doc(alias = "phyCCAMode")]
    pub cca_mode: CcaMode,
    /// This is the current PHY channel page. This is
    /// used in conjunction with phyCurrentChannel to
    /// uniquely identify the channel currently being
    /// used.
    #[doc(alias = "phyCurrentPage")]
    pub current_page: ChannelPage,
}

impl PhyPibWrite {
    const READ_ONLY: &'static [&'static str] = &[
        PibValue::PHY_CHANNELS_SUPPORTED,
        PibValue::PHY_MAX_FRAME_DURATION,
        PibValue::PHY_SHR_DURATION,
        PibValue::PHY_SYMBOLS_PER_OCTET,
    ];

    /// Returns `None` when the attribute is not a PHY attribute
    pub fn try_set(&mut self, attribute: &str, value: &PibValue) -> Option<Status> {
        if !attribute.starts_with("phy") {
            return None;
        }

        if Self::READ_ONLY.contains(&attribute) {
            return Some(Status::ReadOnly);
        }

        let status = match value {
            _ if value.attribute() != Some(attribute) => match attribute {
                PibValue::PHY_CURRENT_CHANNEL
                | PibValue::PHY_TX_POWER
                | PibValue::PHY_CCA_MODE
                | PibValue::PHY_CURRENT_PAGE => Status::InvalidParameter,
                _ => Status::UnsupportedAttribute,
            },
            PibValue::PhyCurrentChannel(channel) => {
                self.current_channel = *channel;
                Status::Success
            }
            PibValue::PhyTxPower(power) => {
                self.tx_power = *power;
                Status::Success
            }
            PibValue::PhyCcaMode(mode) => {
                self.cca_mode = *mode;
                Status::Success
            }
            PibValue::PhyCurrentPage(page) => {
                self.current_page = *page;
                Status::Success
            }
            _ => Status::UnsupportedAttribute,
        };

        Some(status)
    }
}

#[derive(Debug, Clone)]
pub struct MacPib {
    pub pib_write: MacPibWrite,

    /// The extended address assigned to the device.
    ///
    /// ## Range
    /// Device specific
    #[doc(alias = "macExtendedAddress")]
    pub extended_address: ExtendedAddress,
    /// The time the device transmitted its last beacon frame,
    /// taken at the start of the beacon on air.
    #[doc(alias = "macBeaconTxTime")]
    pub beacon_tx_time: Instant,
    /// The minimum time forming a LIFS
    /// period.
    ///
    /// ## Range
    /// As defined in 8.1.3
    #[doc(alias = "macLIFSPeriod")]
    pub lifs_period: u32,
    /// The minimum time forming a SIFS
    /// period.
    ///
    /// ## Range
    /// As defined in 8.1.3
    #[doc(alias = "macSIFSPeriod")]
    pub sifs_period: u32,
    /// The length of the active portion of the
    /// outgoing superframe, including the beacon frame, as defined in 5.1.1.1
    ///
    /// ## Range
    /// 0–15
    #[doc(alias = "macSuperframeOrder")]
    pub superframe_order: SuperframeOrder,
}

impl MacPib {
    /// The PIB as it is after a reset with default values
    pub fn new(extended_address: ExtendedAddress, dsn: u8, bsn: u8) -> Self {
        Self {
            pib_write: MacPibWrite {
                associated_pan_coord: false,
                association_permit: false,
                auto_request: true,
                batt_life_ext: false,
                beacon_payload: Vec::new(),
                beacon_order: BeaconOrder::OnDemand,
                bsn: SequenceNumber::new(bsn),
                coord_extended_address: ExtendedAddress::BROADCAST,
                coord_short_address: ShortAddress::BROADCAST,
                dsn: SequenceNumber::new(dsn),
                max_be: 5,
                max_csma_backoffs: 4,
                max_frame_retries: 3,
                min_be: 3,
                pan_id: PanId::broadcast(),
                promiscuous_mode: false,
                response_wait_time: 32,
                rx_on_when_idle: false,
                short_address: ShortAddress::BROADCAST,
                transaction_persistence_time: 0x01f4,
            },
            extended_address,
            beacon_tx_time: Instant::ZERO,
            lifs_period: LIFS_PERIOD,
            sifs_period: SIFS_PERIOD,
            superframe_order: SuperframeOrder::Inactive,
        }
    }

    #[rustfmt::skip]
    pub fn get(&self, attribute: &str, phy_pib: &PhyPib) -> Option<PibValue> {
        if !attribute.starts_with("mac") {
            return None;
        }

        let value = match attribute {
            PibValue::MAC_EXTENDED_ADDRESS => PibValue::MacExtendedAddress(self.extended_address),
            PibValue::MAC_ACK_WAIT_DURATION => PibValue::MacAckWaitDuration(self.ack_wait_duration(phy_pib)),
            PibValue::MAC_ASSOCIATED_PAN_COORD => PibValue::MacAssociatedPanCoord(self.associated_pan_coord),
            PibValue::MAC_BEACON_PAYLOAD => PibValue::MacBeaconPayload(self.beacon_payload.clone()),
            PibValue::MAC_BEACON_TX_TIME => PibValue::MacBeaconTxTime(self.beacon_tx_time),
            PibValue::MAC_BSN => PibValue::MacBsn(self.bsn.value),
            PibValue::MAC_COORD_EXTENDED_ADDRESS => PibValue::MacCoordExtendedAddress(self.coord_extended_address),
            PibValue::MAC_COORD_SHORT_ADDRESS => PibValue::MacCoordShortAddress(self.coord_short_address),
            PibValue::MAC_DSN => PibValue::MacDsn(self.dsn.value),
            PibValue::MAC_MAX_FRAME_TOTAL_WAIT_TIME => PibValue::MacMaxFrameTotalWaitTime(self.max_frame_total_wait_time(phy_pib)),
            PibValue::MAC_LIFS_PERIOD => PibValue::MacLifsPeriod(self.lifs_period),
            PibValue::MAC_SIFS_PERIOD => PibValue::MacSifsPeriod(self.sifs_period),
            PibValue::MAC_PAN_ID => PibValue::MacPanId(self.pan_id),
            PibValue::MAC_SHORT_ADDRESS => PibValue::MacShortAddress(self.short_address),
            PibValue::MAC_SUPERFRAME_ORDER => PibValue::MacSuperframeOrder(self.superframe_order),
            PibValue::MAC_TRANSACTION_PERSISTENCE_TIME => PibValue::MacTransactionPersistenceTime(self.transaction_persistence_time),
            PibValue::MAC_ASSOCIATION_PERMIT => PibValue::MacAssociationPermit(self.association_permit),
            PibValue::MAC_AUTO_REQUEST => PibValue::MacAutoRequest(self.auto_request),
            PibValue::MAC_BATT_LIFE_EXT => PibValue::MacBattLifeExt(self.batt_life_ext),
            PibValue::MAC_BATT_LIFE_EXT_PERIODS => PibValue::MacBattLifeExtPeriods(self.batt_life_ext_periods(phy_pib)),
            PibValue::MAC_BEACON_ORDER => PibValue::MacBeaconOrder(self.beacon_order),
            PibValue::MAC_MAX_BE => PibValue::MacMaxBe(self.max_be),
            PibValue::MAC_MAX_CSMA_BACKOFFS => PibValue::MacMaxCsmaBackoffs(self.max_csma_backoffs),
            PibValue::MAC_MAX_FRAME_RETRIES => PibValue::MacMaxFrameRetries(self.max_frame_retries),
            PibValue::MAC_MIN_BE => PibValue::MacMinBe(self.min_be),
            PibValue::MAC_PROMISCUOUS_MODE => PibValue::MacPromiscuousMode(self.promiscuous_mode),
            PibValue::MAC_RESPONSE_WAIT_TIME => PibValue::MacResponseWaitTime(self.response_wait_time),
            PibValue::MAC_RX_ON_WHEN_IDLE => PibValue::MacRxOnWhenIdle(self.rx_on_when_idle),
            _ => return None,
        };

        Some(value)
    }

    /// The maximum number of symbols to
    /// wait for an acknowledgment frame to
    /// arrive following a transmitted data
    /// frame. This value is dependent on the
    /// supported PHY, which determines both
    /// the selected channel and channel page.
    /// The calculated value is the time to commence transmitting the ACK plus the
    /// length of the ACK frame. The commencement time is described in
    /// 5.1.6.4.2.
    ///
    /// ## Range
    ///
    /// As defined in 6.4.3
    #[doc(alias = "macAckWaitDuration")]
    pub fn ack_wait_duration(&self, phy_pib: &PhyPib) -> u32 {
        #[allow(unused)]
        use micromath::F32Ext;

        UNIT_BACKOFF_PERIOD
            + TURNAROUND_TIME
            + phy_pib.shr_duration
            + (6.0 * phy_pib.symbols_per_octet).ceil() as u32
    }

    /// The maximum time to wait either for a
    /// frame intended as a response to a data
    /// request frame or for a broadcast frame
    /// following a beacon with the Frame Pending field set to one.
    ///
    /// ## Range
    /// As defined in 6.4.3
    #[doc(alias = "macMaxFrameTotalWaitTime")]
    pub fn max_frame_total_wait_time(&self, phy_pib: &PhyPib) -> u32 {
        let m = (self.max_be - self.min_be).min(self.max_csma_backoffs);

        let mut max_frame_total_wait_time =
            (self.max_csma_backoffs - m) as u32 * ((1 << self.max_be as u32) - 1);

        for k in 0..m {
            max_frame_total_wait_time += 1 << (self.min_be + k);
        }

        max_frame_total_wait_time *= UNIT_BACKOFF_PERIOD;
        max_frame_total_wait_time += phy_pib.max_frame_duration;
        max_frame_total_wait_time
    }

    /// In BLE mode, the number of backoff
    /// periods during which the receiver is
    /// enabled after the IFS following a beacon.
    /// The sum of 3 backoff periods, the initial contention window
    /// and the SHR rounded to backoff periods.
    ///
    /// ## Range
    /// 6-41
    #[doc(alias = "macBattLifeExtPeriods")]
    pub fn batt_life_ext_periods(&self, phy_pib: &PhyPib) -> u8 {
        (3 + phy_pib.current_page.cw0() as u32
            + phy_pib.shr_duration.div_ceil(UNIT_BACKOFF_PERIOD)) as u8
    }

    /// The interframe space in symbols that must follow a frame of `mpdu_len` octets
    pub fn ifs_period(&self, mpdu_len: usize) -> u32 {
        if mpdu_len <= crate::consts::MAX_SIFS_FRAME_SIZE {
            self.sifs_period
        } else {
            self.lifs_period
        }
    }

    /// The unit in which `macTransactionPersistenceTime` is expressed, in symbols
    ///
    /// This is the beacon interval in a beacon-enabled PAN and `aBaseSuperframeDuration` otherwise.
    pub fn transaction_persistence_unit(&self) -> u64 {
        match self.beacon_order {
            BeaconOrder::OnDemand => BASE_SUPERFRAME_DURATION as u64,
            BeaconOrder::BeaconOrder(bo) => (BASE_SUPERFRAME_DURATION as u64) << bo,
        }
    }
}

impl core::ops::DerefMut for MacPib {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.pib_write
    }
}

impl core::ops::Deref for MacPib {
    type Target = MacPibWrite;

    fn deref(&self) -> &Self::Target {
        &self.pib_write
    }
}

#[derive(Debug, Clone)]
pub struct MacPibWrite {
    /// Indication of whether the device is associated to the PAN through the PAN coordinator.
    #[doc(alias = "macAssociatedPANCoord")]
    pub associated_pan_coord: bool,
    /// Indication of whether a coordinator is currently allowing association.
    #[doc(alias = "macAssociationPermit")]
    pub association_permit: bool,
    /// Indication of whether a device automatically sends a data request command if its address
    /// is listed in the beacon frame.
    #[doc(alias = "macAutoRequest")]
    pub auto_request: bool,
    /// Indication of whether BLE, through the reduction of coordinator receiver operation time
    /// during the CAP, is enabled.
    #[doc(alias = "macBattLifeExt")]
    pub batt_life_ext: bool,
    /// The contents of the beacon payload.
    #[doc(alias = "macBeaconPayload")]
    pub beacon_payload: Vec<u8, MAX_BEACON_PAYLOAD_LENGTH>,
    /// Indicates the frequency with which the beacon is transmitted, as defined in 5.1.1.1.
    ///
    /// ## Range
    /// 0–15
    #[doc(alias = "macBeaconOrder")]
    pub beacon_order: BeaconOrder,
    /// The sequence number added to the transmitted beacon frame.
    #[doc(alias = "macBSN")]
    pub bsn: SequenceNumber,
    /// The address of the coordinator through which the device is associated.
    #[doc(alias = "macCoordExtendedAddress")]
    pub coord_extended_address: ExtendedAddress,
    /// The short address assigned to the coordinator through which the device is associated.
    /// A value of 0xfffe indicates that the coordinator is only using its extended address.
    #[doc(alias = "macCoordShortAddress")]
    pub coord_short_address: ShortAddress,
    /// The sequence number added to the transmitted data or MAC command frame.
    #[doc(alias = "macDSN")]
    pub dsn: SequenceNumber,
    /// The maximum value of the backoff exponent, BE, in the CSMA-CA algorithm, as defined in 5.1.1.4.
    ///
    /// ## Range
    /// 3–8
    #[doc(alias = "macMaxBE")]
    pub max_be: u8,
    /// The maximum number of backoffs the CSMA-CA algorithm will attempt before declaring a channel
    /// access failure.
    ///
    /// ## Range
    /// 0–5
    #[doc(alias = "macMaxCSMABackoffs")]
    pub max_csma_backoffs: u8,
    /// The maximum number of retries allowed after a transmission failure.
    ///
    /// ## Range
    /// 0–7
    #[doc(alias = "macMaxFrameRetries")]
    pub max_frame_retries: u8,
    /// The minimum value of the backoff exponent (BE) in the CSMA-CA algorithm, as described in 5.1.1.4.
    ///
    /// ## Range
    /// 0–macMaxBE
    #[doc(alias = "macMinBE")]
    pub min_be: u8,
    /// The identifier of the PAN on which the device is operating.
    /// If this value is 0xffff, the device is not associated.
    #[doc(alias = "macPANId")]
    pub pan_id: PanId,
    /// Indication of whether the MAC sublayer is in a promiscuous (receive all) mode.
    #[doc(alias = "macPromiscuousMode")]
    pub promiscuous_mode: bool,
    /// The maximum time, in multiples of aBaseSuperframeDuration, a device shall wait for a response
    /// command to be available following a request command.
    ///
    /// ## Range
    /// 2–64
    #[doc(alias = "macResponseWaitTime")]
    pub response_wait_time: u8,
    /// Indication of whether the MAC sublayer is to enable its receiver during idle periods.
    #[doc(alias = "macRxOnWhenIdle")]
    pub rx_on_when_idle: bool,
    /// The address that the device uses to communicate in the PAN.
    /// A value of 0xfffe indicates that the device has associated but has not been allocated an address.
    /// A value of 0xffff indicates that the device does not have a short address.
    #[doc(alias = "macShortAddress")]
    pub short_address: ShortAddress,
    /// The maximum time (in unit periods) that a transaction is stored by a coordinator and indicated
    /// in its beacon.
    ///
    /// The unit period is governed by macBeaconOrder, BO, as follows: For 0 ≤ BO ≤ 14, the unit
    /// period will be aBaseSuperframeDuration × 2^BO. For BO = 15, the unit period will be
    /// aBaseSuperframeDuration.
    #[doc(alias = "macTransactionPersistenceTime")]
    pub transaction_persistence_time: u16,
}

impl MacPibWrite {
    /// Attributes that are derived or owned by the MAC itself
    const READ_ONLY: &'static [&'static str] = &[
        PibValue::MAC_EXTENDED_ADDRESS,
        PibValue::MAC_ACK_WAIT_DURATION,
        PibValue::MAC_BEACON_TX_TIME,
        PibValue::MAC_LIFS_PERIOD,
        PibValue::MAC_SIFS_PERIOD,
        PibValue::MAC_SUPERFRAME_ORDER,
        PibValue::MAC_MAX_FRAME_TOTAL_WAIT_TIME,
    ];

    /// Returns `None` when the attribute is not a MAC attribute
    pub fn try_set(&mut self, attribute: &str, value: &PibValue) -> Option<Status> {
        if !attribute.starts_with("mac") {
            return None;
        }

        if Self::READ_ONLY.contains(&attribute) {
            return Some(Status::ReadOnly);
        }

        if !PibValue::MAC_WRITABLE.contains(&attribute) {
            return Some(Status::UnsupportedAttribute);
        }

        // A known attribute paired with a value of another attribute
        if value.attribute() != Some(attribute) {
            return Some(Status::InvalidParameter);
        }

        match self.set(value) {
            Ok(()) => Some(Status::Success),
            Err(status) => Some(status),
        }
    }

    /// Store a value whose type already matches its attribute
    fn set(&mut self, value: &PibValue) -> Result<(), Status> {
        fn within(range: core::ops::RangeInclusive<u8>, value: u8) -> Result<u8, Status> {
            if range.contains(&value) {
                Ok(value)
            } else {
                Err(Status::InvalidParameter)
            }
        }

        match value {
            PibValue::MacAssociatedPanCoord(flag) => self.associated_pan_coord = *flag,
            PibValue::MacAssociationPermit(flag) => self.association_permit = *flag,
            PibValue::MacAutoRequest(flag) => self.auto_request = *flag,
            PibValue::MacBattLifeExt(flag) => self.batt_life_ext = *flag,
            // Only validated, the value is always derived from the PHY
            PibValue::MacBattLifeExtPeriods(periods) => {
                within(6..=41, *periods)?;
            }
            PibValue::MacBeaconPayload(payload) => self.beacon_payload = payload.clone(),
            PibValue::MacBeaconOrder(order) => self.beacon_order = *order,
            PibValue::MacBsn(seq) => self.bsn.value = *seq,
            PibValue::MacCoordExtendedAddress(address) => self.coord_extended_address = *address,
            PibValue::MacCoordShortAddress(address) => self.coord_short_address = *address,
            PibValue::MacDsn(seq) => self.dsn.value = *seq,
            // The maximum may never drop below the minimum
            PibValue::MacMaxBe(be) => self.max_be = within(self.min_be.max(3)..=8, *be)?,
            PibValue::MacMaxCsmaBackoffs(backoffs) => {
                self.max_csma_backoffs = within(0..=5, *backoffs)?
            }
            PibValue::MacMaxFrameRetries(retries) => {
                self.max_frame_retries = within(0..=7, *retries)?
            }
            PibValue::MacMinBe(be) => self.min_be = within(0..=self.max_be, *be)?,
            PibValue::MacPanId(pan_id) => self.pan_id = *pan_id,
            PibValue::MacPromiscuousMode(flag) => self.promiscuous_mode = *flag,
            PibValue::MacResponseWaitTime(time) => self.response_wait_time = within(2..=64, *time)?,
            PibValue::MacRxOnWhenIdle(flag) => self.rx_on_when_idle = *flag,
            PibValue::MacShortAddress(address) => self.short_address = *address,
            PibValue::MacTransactionPersistenceTime(time) => {
                self.transaction_persistence_time = *time
            }
            _ => return Err(Status::UnsupportedAttribute),
        }

        Ok(())
    }

    #[doc(alias = "BI")]
    pub fn beacon_interval(&self) -> Option<u32> {
        match self.beacon_order {
            BeaconOrder::OnDemand => None,
            BeaconOrder::BeaconOrder(bo) => Some(BASE_SUPERFRAME_DURATION << bo),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ChannelDescription {
    pub page: ChannelPage,
    pub channel_numbers: &'static [u8],
}

/// 8.2.7
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum CcaMode {
    EnergyAboveThreshold = 1,
    CarrierSenseOnly,
    CarrierSenseEnergyAboveTheshold,
    Aloha,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PibValue {
    #[default]
    None,
    PhyChannelsSupported(&'static [ChannelDescription]),
    PhyMaxFrameDuration(u32),
    PhyShrDuration(u32),
    PhySymbolsPerOctet(f32),
    PhyCurrentChannel(u8),
    PhyTxPower(i16),
    PhyCcaMode(CcaMode),
    PhyCurrentPage(ChannelPage),
    MacExtendedAddress(ExtendedAddress),
    MacAckWaitDuration(u32),
    MacAssociatedPanCoord(bool),
    MacAssociationPermit(bool),
    MacAutoRequest(bool),
    MacBattLifeExt(bool),
    MacBattLifeExtPeriods(u8),
    MacBeaconPayload(Vec<u8, MAX_BEACON_PAYLOAD_LENGTH>),
    MacBeaconOrder(BeaconOrder),
    MacBeaconTxTime(Instant),
    MacBsn(u8),
    MacCoordExtendedAddress(ExtendedAddress),
    MacCoordShortAddress(ShortAddress),
    MacDsn(u8),
    MacLifsPeriod(u32),
    MacMaxBe(u8),
    MacMaxCsmaBackoffs(u8),
    MacMaxFrameTotalWaitTime(u32),
    MacMaxFrameRetries(u8),
    MacMinBe(u8),
    MacPanId(PanId),
    MacPromiscuousMode(bool),
    MacResponseWaitTime(u8),
    MacRxOnWhenIdle(bool),
    MacShortAddress(ShortAddress),
    MacSifsPeriod(u32),
    MacSuperframeOrder(SuperframeOrder),
    MacTransactionPersistenceTime(u16),
}

impl PibValue {
    pub const PHY_CHANNELS_SUPPORTED: &'static str = "phyChannelsSupported";
    pub const PHY_MAX_FRAME_DURATION: &'static str = "phyMaxFrameDuration";
    pub const PHY_SHR_DURATION: &'static str = "phySHRDuration";
    pub const PHY_SYMBOLS_PER_OCTET: &'static str = "phySymbolsPerOctet";
    pub const PHY_CURRENT_CHANNEL: &'static str = "phyCurrentChannel";
    pub const PHY_TX_POWER: &'static str = "phyTXPower";
    pub const PHY_CCA_MODE: &'static str = "phyCCAMode";
    pub const PHY_CURRENT_PAGE: &'static str = "phyCurrentPage";
    pub const MAC_EXTENDED_ADDRESS: &'static str = "macExtendedAddress";
    pub const MAC_ACK_WAIT_DURATION: &'static str = "macAckWaitDuration";
    pub const MAC_ASSOCIATED_PAN_COORD: &'static str = "macAssociatedPANCoord";
    pub const MAC_ASSOCIATION_PERMIT: &'static str = "macAssociationPermit";
    pub const MAC_AUTO_REQUEST: &'static str = "macAutoRequest";
    pub const MAC_BATT_LIFE_EXT: &'static str = "macBattLifeExt";
    pub const MAC_BATT_LIFE_EXT_PERIODS: &'static str = "macBattLifeExtPeriods";
    pub const MAC_BEACON_PAYLOAD: &'static str = "macBeaconPayload";
    pub const MAC_BEACON_ORDER: &'static str = "macBeaconOrder";
    pub const MAC_BEACON_TX_TIME: &'static str = "macBeaconTxTime";
    pub const MAC_BSN: &'static str = "macBSN";
    pub const MAC_COORD_EXTENDED_ADDRESS: &'static str = "macCoordExtendedAddress";
    pub const MAC_COORD_SHORT_ADDRESS: &'static str = "macCoordShortAddress";
    pub const MAC_DSN: &'static str = "macDSN";
    pub const MAC_LIFS_PERIOD: &'static str = "macLIFSPeriod";
    pub const MAC_MAX_BE: &'static str = "macMaxBE";
    pub const MAC_MAX_CSMA_BACKOFFS: &'static str = "macMaxCSMABackoffs";
    pub const MAC_MAX_FRAME_TOTAL_WAIT_TIME: &'static str = "macMaxFrameTotalWaitTime";
    pub const MAC_MAX_FRAME_RETRIES: &'static str = "macMaxFrameRetries";
    pub const MAC_MIN_BE: &'static str = "macMinBE";
    pub const MAC_PAN_ID: &'static str = "macPANId";
    pub const MAC_PROMISCUOUS_MODE: &'static str = "macPromiscuousMode";
    pub const MAC_RESPONSE_WAIT_TIME: &'static str = "macResponseWaitTime";
    pub const MAC_RX_ON_WHEN_IDLE: &'static str = "macRxOnWhenIdle";
    pub const MAC_SHORT_ADDRESS: &'static str = "macShortAddress";
    pub const MAC_SIFS_PERIOD: &'static str = "macSIFSPeriod";
    pub const MAC_SUPERFRAME_ORDER: &'static str = "macSuperframeOrder";
    pub const MAC_TRANSACTION_PERSISTENCE_TIME: &'static str = "macTransactionPersistenceTime";

    /// The MAC attributes a higher layer may change
    pub const MAC_WRITABLE: &'static [&'static str] = &[
        Self::MAC_ASSOCIATED_PAN_COORD,
        Self::MAC_ASSOCIATION_PERMIT,
        Self::MAC_AUTO_REQUEST,
        Self::MAC_BATT_LIFE_EXT,
        Self::MAC_BATT_LIFE_EXT_PERIODS,
        Self::MAC_BEACON_PAYLOAD,
        Self::MAC_BEACON_ORDER,
        Self::MAC_BSN,
        Self::MAC_COORD_EXTENDED_ADDRESS,
        Self::MAC_COORD_SHORT_ADDRESS,
        Self::MAC_DSN,
        Self::MAC_MAX_BE,
        Self::MAC_MAX_CSMA_BACKOFFS,
        Self::MAC_MAX_FRAME_RETRIES,
        Self::MAC_MIN_BE,
        Self::MAC_PAN_ID,
        Self::MAC_PROMISCUOUS_MODE,
        Self::MAC_RESPONSE_WAIT_TIME,
        Self::MAC_RX_ON_WHEN_IDLE,
        Self::MAC_SHORT_ADDRESS,
        Self::MAC_TRANSACTION_PERSISTENCE_TIME,
    ];

    /// The name of the attribute this value belongs to
    pub fn attribute(&self) -> Option<&'static str> {
        let name = match self {
            Self::None => return None,
            Self::PhyChannelsSupported(_) => Self::PHY_CHANNELS_SUPPORTED,
            Self::PhyMaxFrameDuration(_) => Self::PHY_MAX_FRAME_DURATION,
            Self::PhyShrDuration(_) => Self::PHY_SHR_DURATION,
            Self::PhySymbolsPerOctet(_) => Self::PHY_SYMBOLS_PER_OCTET,
            Self::PhyCurrentChannel(_) => Self::PHY_CURRENT_CHANNEL,
            Self::PhyTxPower(_) => Self::PHY_TX_POWER,
            Self::PhyCcaMode(_) => Self::PHY_CCA_MODE,
            Self::PhyCurrentPage(_) => Self::PHY_CURRENT_PAGE,
            Self::MacExtendedAddress(_) => Self::MAC_EXTENDED_ADDRESS,
            Self::MacAckWaitDuration(_) => Self::MAC_ACK_WAIT_DURATION,
            Self::MacAssociatedPanCoord(_) => Self::MAC_ASSOCIATED_PAN_COORD,
            Self::MacAssociationPermit(_) => Self::MAC_ASSOCIATION_PERMIT,
            Self::MacAutoRequest(_) => Self::MAC_AUTO_REQUEST,
            Self::MacBattLifeExt(_) => Self::MAC_BATT_LIFE_EXT,
            Self::MacBattLifeExtPeriods(_) => Self::MAC_BATT_LIFE_EXT_PERIODS,
            Self::MacBeaconPayload(_) => Self::MAC_BEACON_PAYLOAD,
            Self::MacBeaconOrder(_) => Self::MAC_BEACON_ORDER,
            Self::MacBeaconTxTime(_) => Self::MAC_BEACON_TX_TIME,
            Self::MacBsn(_) => Self::MAC_BSN,
            Self::MacCoordExtendedAddress(_) => Self::MAC_COORD_EXTENDED_ADDRESS,
            Self::MacCoordShortAddress(_) => Self::MAC_COORD_SHORT_ADDRESS,
            Self::MacDsn(_) => Self::MAC_DSN,
            Self::MacLifsPeriod(_) => Self::MAC_LIFS_PERIOD,
            Self::MacMaxBe(_) => Self::MAC_MAX_BE,
            Self::MacMaxCsmaBackoffs(_) => Self::MAC_MAX_CSMA_BACKOFFS,
            Self::MacMaxFrameTotalWaitTime(_) => Self::MAC_MAX_FRAME_TOTAL_WAIT_TIME,
            Self::MacMaxFrameRetries(_) => Self::MAC_MAX_FRAME_RETRIES,
            Self::MacMinBe(_) => Self::MAC_MIN_BE,
            Self::MacPanId(_) => Self::MAC_PAN_ID,
            Self::MacPromiscuousMode(_) => Self::MAC_PROMISCUOUS_MODE,
            Self::MacResponseWaitTime(_) => Self::MAC_RESPONSE_WAIT_TIME,
            Self::MacRxOnWhenIdle(_) => Self::MAC_RX_ON_WHEN_IDLE,
            Self::MacShortAddress(_) => Self::MAC_SHORT_ADDRESS,
            Self::MacSifsPeriod(_) => Self::MAC_SIFS_PERIOD,
            Self::MacSuperframeOrder(_) => Self::MAC_SUPERFRAME_ORDER,
            Self::MacTransactionPersistenceTime(_) => Self::MAC_TRANSACTION_PERSISTENCE_TIME,
        };

        Some(name)
    }
}

/// An 8 bit sequence number that wraps around
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct SequenceNumber {
    value: u8,
}

impl SequenceNumber {
    pub fn new(initial_value: u8) -> Self {
        Self {
            value: initial_value,
        }
    }

    /// The value the next [`SequenceNumber::increment`] returns
    pub fn peek_next(&self) -> u8 {
        self.value.wrapping_add(1)
    }

    /// Increment by one and return the new value
    pub fn increment(&mut self) -> u8 {
        self.value = self.value.wrapping_add(1);
        self.value
    }

    pub fn value(&self) -> u8 {
        self.value
    }
}
