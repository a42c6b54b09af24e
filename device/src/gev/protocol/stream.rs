/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! GVSP stream packet codec.
//!
//! Every stream datagram starts with the 8-byte header
//! `status (u16) | block_id (u16) | packet_format (u8) | packet_id (u24)`.
//! When the extended-id bit of `packet_format` is set, the 16-bit block id
//! field carries stream flags instead and a 12-byte extension follows with
//! a 64-bit block id and a 32-bit packet id.

use std::{convert::TryInto, io};

use lucida_impl::{
    bit_field::BitField,
    byte_io::{ReadBytes, WriteBytes},
};

use crate::{
    gev::{Error, Result},
    PixelFormat,
};

use super::Status;

/// Header length without the extended-id extension.
pub const BASE_HEADER_LEN: usize = 8;
/// Header length with the extended-id extension.
pub const EXTENDED_HEADER_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub status: Status,
    pub block_id: u64,
    pub packet_id: u32,
    pub kind: PacketKind,
    pub extended_id: bool,
    pub flags: StreamFlags,
}

impl PacketHeader {
    pub fn parse(cursor: &mut io::Cursor<&[u8]>) -> Result<Self> {
        let status = Status::parse(cursor)?;
        let bid_or_flags: u16 = cursor.read_bytes_be()?;
        let format: u8 = cursor.read_bytes_be()?;
        let packet_id24 = cursor.read_u24_be()?;

        let extended_id = format & 0x80 != 0;
        let kind = PacketKind::from_raw(format & 0x0f)?;

        let (block_id, packet_id, flags) = if extended_id {
            (
                cursor.read_bytes_be()?,
                cursor.read_bytes_be()?,
                StreamFlags(bid_or_flags),
            )
        } else {
            (u64::from(bid_or_flags), packet_id24, StreamFlags(0))
        };

        Ok(Self {
            status,
            block_id,
            packet_id,
            kind,
            extended_id,
            flags,
        })
    }

    pub fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        self.status.serialize(&mut buf)?;
        if self.extended_id {
            buf.write_bytes_be(self.flags.0)?;
        } else {
            if self.block_id > u64::from(u16::MAX) {
                return Err(Error::InvalidData(
                    "block id exceeds 16 bits without extended-id mode".into(),
                ));
            }
            buf.write_bytes_be(self.block_id as u16)?;
        }
        let format = (self.extended_id as u8) << 7 | self.kind.raw();
        buf.write_bytes_be(format)?;
        if self.extended_id {
            buf.write_u24_be(0)?;
            buf.write_bytes_be(self.block_id)?;
            buf.write_bytes_be(self.packet_id)?;
        } else {
            if self.packet_id > 0x00ff_ffff {
                return Err(Error::InvalidData(
                    "packet id exceeds 24 bits without extended-id mode".into(),
                ));
            }
            buf.write_u24_be(self.packet_id)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        if self.extended_id {
            EXTENDED_HEADER_LEN
        } else {
            BASE_HEADER_LEN
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Leader,
    Trailer,
    Payload,
    /// Leader, single payload and trailer folded into one datagram.
    AllIn,
}

impl PacketKind {
    fn from_raw(raw: u8) -> Result<Self> {
        Ok(match raw {
            1 => Self::Leader,
            2 => Self::Trailer,
            3 => Self::Payload,
            4 => Self::AllIn,
            other => {
                return Err(Error::InvalidPacket(
                    format!("invalid GVSP packet kind: {}", other).into(),
                ))
            }
        })
    }

    fn raw(self) -> u8 {
        match self {
            Self::Leader => 1,
            Self::Trailer => 2,
            Self::Payload => 3,
            Self::AllIn => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamFlags(pub u16);

impl StreamFlags {
    #[must_use]
    pub fn is_resend_range_error(self) -> bool {
        self.0.is_set(13)
    }

    #[must_use]
    pub fn is_previous_block_dropped(self) -> bool {
        self.0.is_set(14)
    }

    #[must_use]
    pub fn is_packet_resend(self) -> bool {
        self.0.is_set(15)
    }
}

/// Payload classification carried in leaders and trailers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Image,
    RawData,
    File,
    ChunkData,
    ExtendedChunkData,
    Jpeg,
    Jpeg2000,
    H264,
    MultiZoneImage,
    Multipart,
    GenDcContainer,
    GenDcComponentData,
    DeviceSpecific(u16),
}

impl PayloadKind {
    #[must_use]
    pub fn raw(self) -> u16 {
        match self {
            Self::Image => 0x0001,
            Self::RawData => 0x0002,
            Self::File => 0x0003,
            Self::ChunkData => 0x0004,
            Self::ExtendedChunkData => 0x0005,
            Self::Jpeg => 0x0006,
            Self::Jpeg2000 => 0x0007,
            Self::H264 => 0x0008,
            Self::MultiZoneImage => 0x0009,
            Self::Multipart => 0x000a,
            Self::GenDcContainer => 0x000b,
            Self::GenDcComponentData => 0x000c,
            Self::DeviceSpecific(raw) => raw,
        }
    }

    #[must_use]
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0x0001 => Self::Image,
            0x0002 => Self::RawData,
            0x0003 => Self::File,
            0x0004 => Self::ChunkData,
            0x0005 => Self::ExtendedChunkData,
            0x0006 => Self::Jpeg,
            0x0007 => Self::Jpeg2000,
            0x0008 => Self::H264,
            0x0009 => Self::MultiZoneImage,
            0x000a => Self::Multipart,
            0x000b => Self::GenDcContainer,
            0x000c => Self::GenDcComponentData,
            other => Self::DeviceSpecific(other),
        }
    }

    /// Returns `true` when leaders of this kind carry image geometry.
    #[must_use]
    pub fn has_image_info(self) -> bool {
        matches!(
            self,
            Self::Image | Self::ExtendedChunkData | Self::MultiZoneImage
        )
    }
}

/// Image geometry carried by image-bearing leaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    pub x_padding: u16,
    pub y_padding: u16,
}

impl ImageInfo {
    fn parse(cursor: &mut io::Cursor<&[u8]>) -> Result<Self> {
        let pixel_format = cursor
            .read_bytes_be::<u32>()?
            .try_into()
            .map_err(|e: String| Error::InvalidPacket(e.into()))?;
        let width = cursor.read_bytes_be()?;
        let height = cursor.read_bytes_be()?;
        let x_offset = cursor.read_bytes_be()?;
        let y_offset = cursor.read_bytes_be()?;
        let x_padding = cursor.read_bytes_be()?;
        let y_padding = cursor.read_bytes_be()?;
        Ok(Self {
            pixel_format,
            width,
            height,
            x_offset,
            y_offset,
            x_padding,
            y_padding,
        })
    }

    fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_be(self.pixel_format.code())?;
        buf.write_bytes_be(self.width)?;
        buf.write_bytes_be(self.height)?;
        buf.write_bytes_be(self.x_offset)?;
        buf.write_bytes_be(self.y_offset)?;
        buf.write_bytes_be(self.x_padding)?;
        buf.write_bytes_be(self.y_padding)?;
        Ok(())
    }
}

/// Frame leader: payload classification, device timestamp and, for
/// image-bearing payloads, the image geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leader {
    pub field_id: u8,
    pub field_count: u8,
    pub payload_kind: PayloadKind,
    /// Device timestamp in device ticks (ns for most devices).
    pub timestamp: u64,
    pub image: Option<ImageInfo>,
}

impl Leader {
    pub fn parse(cursor: &mut io::Cursor<&[u8]>) -> Result<Self> {
        let field: u8 = cursor.read_bytes_be()?;
        let _reserved: u8 = cursor.read_bytes_be()?;
        let payload_kind = PayloadKind::from_raw(cursor.read_bytes_be()?);
        let timestamp = cursor.read_bytes_be()?;
        let image = if payload_kind.has_image_info() {
            Some(ImageInfo::parse(cursor)?)
        } else {
            None
        };

        Ok(Self {
            field_id: field >> 4,
            field_count: field & 0x0f,
            payload_kind,
            timestamp,
            image,
        })
    }

    pub fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        if self.payload_kind.has_image_info() != self.image.is_some() {
            return Err(Error::InvalidData(
                "leader image info doesn't match the payload kind".into(),
            ));
        }
        buf.write_bytes_be(self.field_id << 4 | (self.field_count & 0x0f))?;
        buf.write_bytes_be(0_u8)?;
        buf.write_bytes_be(self.payload_kind.raw())?;
        buf.write_bytes_be(self.timestamp)?;
        if let Some(image) = &self.image {
            image.serialize(&mut buf)?;
        }
        Ok(())
    }
}

/// One entry of a multi-part trailer's parts descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartInfo {
    pub data_type: u16,
    pub component_id: u16,
    pub pixel_format: PixelFormat,
    /// Byte offset of the part inside the frame payload.
    pub offset: u64,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    pub x_padding: u16,
    pub y_padding: u16,
}

impl PartInfo {
    const WIRE_LEN: usize = 44;

    fn parse(cursor: &mut io::Cursor<&[u8]>) -> Result<Self> {
        let data_type = cursor.read_bytes_be()?;
        let component_id = cursor.read_bytes_be()?;
        let pixel_format = cursor
            .read_bytes_be::<u32>()?
            .try_into()
            .map_err(|e: String| Error::InvalidPacket(e.into()))?;
        let offset = cursor.read_bytes_be()?;
        let size = cursor.read_bytes_be()?;
        let width = cursor.read_bytes_be()?;
        let height = cursor.read_bytes_be()?;
        let x_offset = cursor.read_bytes_be()?;
        let y_offset = cursor.read_bytes_be()?;
        let x_padding = cursor.read_bytes_be()?;
        let y_padding = cursor.read_bytes_be()?;
        Ok(Self {
            data_type,
            component_id,
            pixel_format,
            offset,
            size,
            width,
            height,
            x_offset,
            y_offset,
            x_padding,
            y_padding,
        })
    }

    fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_be(self.data_type)?;
        buf.write_bytes_be(self.component_id)?;
        buf.write_bytes_be(self.pixel_format.code())?;
        buf.write_bytes_be(self.offset)?;
        buf.write_bytes_be(self.size)?;
        buf.write_bytes_be(self.width)?;
        buf.write_bytes_be(self.height)?;
        buf.write_bytes_be(self.x_offset)?;
        buf.write_bytes_be(self.y_offset)?;
        buf.write_bytes_be(self.x_padding)?;
        buf.write_bytes_be(self.y_padding)?;
        Ok(())
    }
}

/// Frame trailer: declared payload size and, for multi-part payloads, the
/// parts descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trailer {
    pub payload_kind: PayloadKind,
    /// Total payload size in bytes as declared by the device.
    pub payload_size: u64,
    pub parts: Vec<PartInfo>,
}

impl Trailer {
    pub fn parse(cursor: &mut io::Cursor<&[u8]>) -> Result<Self> {
        let _reserved: u16 = cursor.read_bytes_be()?;
        let payload_kind = PayloadKind::from_raw(cursor.read_bytes_be()?);
        let payload_size = cursor.read_bytes_be()?;
        let part_count: u16 = cursor.read_bytes_be()?;
        let mut parts = Vec::with_capacity(part_count as usize);
        for _ in 0..part_count {
            parts.push(PartInfo::parse(cursor)?);
        }
        Ok(Self {
            payload_kind,
            payload_size,
            parts,
        })
    }

    pub fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_be(0_u16)?;
        buf.write_bytes_be(self.payload_kind.raw())?;
        buf.write_bytes_be(self.payload_size)?;
        buf.write_bytes_be(self.parts.len() as u16)?;
        for part in &self.parts {
            part.serialize(&mut buf)?;
        }
        Ok(())
    }

    fn wire_len(&self) -> usize {
        14 + self.parts.len() * PartInfo::WIRE_LEN
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketContent<'a> {
    Leader(Leader),
    Payload(&'a [u8]),
    Trailer(Trailer),
    AllIn {
        leader: Leader,
        data: &'a [u8],
        trailer: Trailer,
    },
}

/// One parsed GVSP datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet<'a> {
    pub header: PacketHeader,
    pub content: PacketContent<'a>,
}

impl<'a> Packet<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        let mut cursor = io::Cursor::new(buf);
        let header = PacketHeader::parse(&mut cursor)?;
        let content = match header.kind {
            PacketKind::Leader => PacketContent::Leader(Leader::parse(&mut cursor)?),
            PacketKind::Trailer => PacketContent::Trailer(Trailer::parse(&mut cursor)?),
            PacketKind::Payload => PacketContent::Payload(&buf[cursor.position() as usize..]),
            PacketKind::AllIn => {
                let data_len: u32 = cursor.read_bytes_be()?;
                let leader = Leader::parse(&mut cursor)?;
                let data_start = cursor.position() as usize;
                let data_end = data_start + data_len as usize;
                if buf.len() < data_end {
                    return Err(Error::InvalidPacket(
                        "all-in packet data exceeds the datagram".into(),
                    ));
                }
                let data = &buf[data_start..data_end];
                let mut trailer_cursor = io::Cursor::new(&buf[data_end..]);
                let trailer = Trailer::parse(&mut trailer_cursor)?;
                PacketContent::AllIn {
                    leader,
                    data,
                    trailer,
                }
            }
        };
        Ok(Self { header, content })
    }
}

/// Builder for outgoing stream datagrams, used by the protocol tests and
/// in-process frame feeders.
#[derive(Debug, Clone, Copy)]
pub struct PacketWriter {
    pub status: Status,
    pub block_id: u64,
    pub extended_id: bool,
    pub flags: StreamFlags,
}

impl PacketWriter {
    #[must_use]
    pub fn new(block_id: u64, extended_id: bool) -> Self {
        Self {
            status: Status::SUCCESS,
            block_id,
            extended_id,
            flags: StreamFlags::default(),
        }
    }

    fn header(&self, kind: PacketKind, packet_id: u32) -> PacketHeader {
        PacketHeader {
            status: self.status,
            block_id: self.block_id,
            packet_id,
            kind,
            extended_id: self.extended_id,
            flags: self.flags,
        }
    }

    pub fn leader(&self, packet_id: u32, leader: &Leader) -> Result<Vec<u8>> {
        let header = self.header(PacketKind::Leader, packet_id);
        let mut buf = Vec::with_capacity(header.len() + 36);
        header.serialize(&mut buf)?;
        leader.serialize(&mut buf)?;
        Ok(buf)
    }

    pub fn payload(&self, packet_id: u32, data: &[u8]) -> Result<Vec<u8>> {
        let header = self.header(PacketKind::Payload, packet_id);
        let mut buf = Vec::with_capacity(header.len() + data.len());
        header.serialize(&mut buf)?;
        buf.extend_from_slice(data);
        Ok(buf)
    }

    pub fn trailer(&self, packet_id: u32, trailer: &Trailer) -> Result<Vec<u8>> {
        let header = self.header(PacketKind::Trailer, packet_id);
        let mut buf = Vec::with_capacity(header.len() + trailer.wire_len());
        header.serialize(&mut buf)?;
        trailer.serialize(&mut buf)?;
        Ok(buf)
    }

    pub fn all_in(&self, leader: &Leader, data: &[u8], trailer: &Trailer) -> Result<Vec<u8>> {
        let header = self.header(PacketKind::AllIn, 0);
        let mut buf = Vec::with_capacity(header.len() + 40 + data.len() + trailer.wire_len());
        header.serialize(&mut buf)?;
        buf.write_bytes_be(data.len() as u32)?;
        leader.serialize(&mut buf)?;
        buf.extend_from_slice(data);
        trailer.serialize(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_leader() -> Leader {
        Leader {
            field_id: 0,
            field_count: 0,
            payload_kind: PayloadKind::Image,
            timestamp: 0x0102_0304_0506_0708,
            image: Some(ImageInfo {
                pixel_format: PixelFormat::Mono8,
                width: 640,
                height: 480,
                x_offset: 0,
                y_offset: 0,
                x_padding: 0,
                y_padding: 0,
            }),
        }
    }

    #[test]
    fn leader_round_trip() {
        let leader = image_leader();
        let buf = PacketWriter::new(5, false).leader(0, &leader).unwrap();
        let packet = Packet::parse(&buf).unwrap();

        assert_eq!(packet.header.block_id, 5);
        assert_eq!(packet.header.packet_id, 0);
        assert_eq!(packet.header.kind, PacketKind::Leader);
        assert!(!packet.header.extended_id);
        assert_eq!(packet.content, PacketContent::Leader(leader));
    }

    #[test]
    fn extended_id_round_trip() {
        let leader = image_leader();
        let buf = PacketWriter::new(0x0001_0002_0003_0004, true)
            .leader(0x0100_0000, &leader)
            .unwrap();
        let packet = Packet::parse(&buf).unwrap();

        assert!(packet.header.extended_id);
        assert_eq!(packet.header.block_id, 0x0001_0002_0003_0004);
        assert_eq!(packet.header.packet_id, 0x0100_0000);
    }

    #[test]
    fn payload_round_trip() {
        let data: Vec<u8> = (0..64).collect();
        let buf = PacketWriter::new(5, false).payload(3, &data).unwrap();
        let packet = Packet::parse(&buf).unwrap();

        assert_eq!(packet.header.packet_id, 3);
        assert_eq!(packet.content, PacketContent::Payload(data.as_slice()));
    }

    #[test]
    fn multipart_trailer_round_trip() {
        let trailer = Trailer {
            payload_kind: PayloadKind::Multipart,
            payload_size: 1024,
            parts: vec![
                PartInfo {
                    data_type: 1,
                    component_id: 0,
                    pixel_format: PixelFormat::Mono8,
                    offset: 0,
                    size: 512,
                    width: 32,
                    height: 16,
                    x_offset: 0,
                    y_offset: 0,
                    x_padding: 0,
                    y_padding: 0,
                },
                PartInfo {
                    data_type: 1,
                    component_id: 1,
                    pixel_format: PixelFormat::Mono16,
                    offset: 512,
                    size: 512,
                    width: 16,
                    height: 16,
                    x_offset: 0,
                    y_offset: 0,
                    x_padding: 0,
                    y_padding: 0,
                },
            ],
        };
        let buf = PacketWriter::new(9, false).trailer(11, &trailer).unwrap();
        let packet = Packet::parse(&buf).unwrap();

        assert_eq!(packet.content, PacketContent::Trailer(trailer));
    }

    #[test]
    fn all_in_round_trip() {
        let leader = image_leader();
        let data: Vec<u8> = (0..128).map(|i| i as u8).collect();
        let trailer = Trailer {
            payload_kind: PayloadKind::Image,
            payload_size: 128,
            parts: vec![],
        };
        let buf = PacketWriter::new(1, false)
            .all_in(&leader, &data, &trailer)
            .unwrap();
        let packet = Packet::parse(&buf).unwrap();

        match packet.content {
            PacketContent::AllIn {
                leader: l,
                data: d,
                trailer: t,
            } => {
                assert_eq!(l, leader);
                assert_eq!(d, data.as_slice());
                assert_eq!(t, trailer);
            }
            other => panic!("expected all-in content, got {:?}", other),
        }
    }

    #[test]
    fn unextended_limits_are_enforced() {
        let writer = PacketWriter::new(0x1_0000, false);
        assert!(writer.payload(1, &[0; 4]).is_err());

        let writer = PacketWriter::new(1, false);
        assert!(writer.payload(0x0100_0000, &[0; 4]).is_err());
    }
}
