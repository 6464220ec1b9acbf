//! Frames on the air
//!
//! Frame control, addressing and the frame type specific content are handled by the
//! [`ieee802154`] crate. On top of that the PSDU carries the FCS, the 16 bit ITU-T CRC
//! (CRC-16/KERMIT) over the MHR and the MAC payload.

use byte::{TryRead, TryWrite};
use heapless::Vec;
use ieee802154::mac::{security::default::Unimplemented, FooterMode, FrameSerDesContext};

pub use ieee802154::mac::{
    command, Address, AddressMode, ExtendedAddress, FrameContent, FrameType, FrameVersion, Header,
    PanId, ShortAddress,
};

use crate::consts::{MAX_FRAME_BUFFER_SIZE, MAX_MAC_PAYLOAD_SIZE};

pub mod beacon;

const FCS: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_KERMIT);
const FCS_SIZE: usize = 2;
/// Frame control and sequence number
const MIN_HEADER_SIZE: usize = 3;

/// Assigned to devices that have associated but don't have a short address
pub const USE_EXTENDED: ShortAddress = ShortAddress(0xfffe);

/// Whether `short` is an address we can put in the source field of a frame
pub fn is_assigned(short: ShortAddress) -> bool {
    short.0 < USE_EXTENDED.0
}

/// Create a header for the given addresses, compressing the PAN id when both share it
pub fn header(
    frame_type: FrameType,
    seq: u8,
    destination: Option<Address>,
    source: Option<Address>,
) -> Header {
    let pan_id_compress = matches!(
        (destination, source),
        (Some(dst), Some(src)) if dst.pan_id() == src.pan_id()
    );

    Header {
        frame_type,
        frame_pending: false,
        ack_request: false,
        pan_id_compress,
        seq_no_suppress: false,
        ie_present: false,
        version: FrameVersion::Ieee802154_2003,
        seq,
        destination,
        source,
        auxiliary_security_header: None,
    }
}

pub trait AddressExt {
    /// True for the short broadcast address and short multicast addresses
    fn is_group(&self) -> bool;

    /// Whether both addresses name the same device, ignoring the PAN
    fn same_device(&self, other: &Address) -> bool;
}

impl AddressExt for Address {
    fn is_group(&self) -> bool {
        match self {
            // Multicast group addresses as used by 6LoWPAN have `100` as top bits
            Address::Short(_, short) => {
                *short == ShortAddress::BROADCAST || short.0 & 0xe000 == 0x8000
            }
            Address::Extended(..) => false,
        }
    }

    fn same_device(&self, other: &Address) -> bool {
        match (self, other) {
            (Address::Short(_, a), Address::Short(_, b)) => a == b,
            (Address::Extended(_, a), Address::Extended(_, b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum FrameError {
    /// The frame check sequence does not match the content
    Fcs,
    /// The frame could not be parsed
    Malformed,
    /// The frame does not fit in the serialization buffer
    TooLong,
}

impl From<byte::Error> for FrameError {
    fn from(error: byte::Error) -> Self {
        match error {
            byte::Error::Incomplete => FrameError::TooLong,
            _ => FrameError::Malformed,
        }
    }
}

/// A MAC frame that owns its payload
///
/// Received frames outlive the PSDU they were parsed from, so the payload is copied out of the
/// borrowed [`ieee802154::mac::Frame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: Header,
    pub content: FrameContent,
    pub payload: Vec<u8, MAX_MAC_PAYLOAD_SIZE>,
}

impl Frame {
    /// Serialize the frame and append the FCS
    pub fn to_psdu(&self) -> Result<Vec<u8, MAX_FRAME_BUFFER_SIZE>, FrameError> {
        let frame = ieee802154::mac::Frame {
            header: self.header.clone(),
            content: self.content.clone(),
            payload: &self.payload,
            footer: [0; FCS_SIZE],
        };

        let mut buffer = [0; MAX_FRAME_BUFFER_SIZE];
        let mut context =
            FrameSerDesContext::<Unimplemented, Unimplemented>::new(FooterMode::None, None);
        let length = frame.try_write(
            &mut buffer[..MAX_FRAME_BUFFER_SIZE - FCS_SIZE],
            &mut context,
        )?;

        let fcs = FCS.checksum(&buffer[..length]);
        buffer[length..][..FCS_SIZE].copy_from_slice(&fcs.to_le_bytes());

        Vec::from_slice(&buffer[..length + FCS_SIZE]).map_err(|_| FrameError::TooLong)
    }

    /// Validate the FCS and parse the frame
    pub fn from_psdu(psdu: &[u8]) -> Result<Self, FrameError> {
        if psdu.len() < MIN_HEADER_SIZE + FCS_SIZE {
            return Err(FrameError::Malformed);
        }

        let (mpdu, fcs) = psdu.split_at(psdu.len() - FCS_SIZE);
        if FCS.checksum(mpdu) != u16::from_le_bytes([fcs[0], fcs[1]]) {
            return Err(FrameError::Fcs);
        }

        let (frame, _) = ieee802154::mac::Frame::try_read(mpdu, FooterMode::None)
            .map_err(|_| FrameError::Malformed)?;

        Ok(Self {
            header: frame.header,
            content: frame.content,
            payload: Vec::from_slice(frame.payload).map_err(|_| FrameError::Malformed)?,
        })
    }
}
