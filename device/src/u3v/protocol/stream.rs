/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! UVSP stream leader/trailer codec.
//!
//! One frame on the stream endpoint is a leader transfer, a configured
//! number of payload transfers and a trailer transfer. Leaders and
//! trailers open with the magics `L3UV` and `T3UV` respectively.

use std::{convert::TryInto, io};

use lucida_impl::byte_io::{ReadBytes, WriteBytes};

use crate::{
    u3v::{Error, Result},
    PixelFormat,
};

/// `L3UV`, little-endian.
pub const LEADER_MAGIC: u32 = u32::from_le_bytes(*b"L3UV");
/// `T3UV`, little-endian.
pub const TRAILER_MAGIC: u32 = u32::from_le_bytes(*b"T3UV");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Image,
    ImageExtendedChunk,
    Chunk,
}

impl PayloadKind {
    #[must_use]
    pub fn raw(self) -> u16 {
        match self {
            Self::Image => 0x0001,
            Self::ImageExtendedChunk => 0x4001,
            Self::Chunk => 0x4000,
        }
    }

    fn from_raw(raw: u16) -> Result<Self> {
        Ok(match raw {
            0x0001 => Self::Image,
            0x4001 => Self::ImageExtendedChunk,
            0x4000 => Self::Chunk,
            other => {
                return Err(Error::InvalidPacket(
                    format!("unknown UVSP payload type {:#06x}", other).into(),
                ))
            }
        })
    }
}

/// Frame leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leader {
    pub block_id: u64,
    pub payload_kind: PayloadKind,
    /// Device timestamp in nanoseconds.
    pub timestamp: u64,
    pub image: Option<ImageInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    pub x_padding: u16,
}

impl Leader {
    pub fn parse(buf: &(impl AsRef<[u8]> + ?Sized)) -> Result<Self> {
        let mut cursor = io::Cursor::new(buf.as_ref());
        let magic: u32 = cursor.read_bytes_le()?;
        if magic != LEADER_MAGIC {
            return Err(Error::InvalidPacket("invalid leader prefix magic".into()));
        }
        let _reserved: u16 = cursor.read_bytes_le()?;
        let _leader_size: u16 = cursor.read_bytes_le()?;
        let block_id = cursor.read_bytes_le()?;
        let _reserved: u16 = cursor.read_bytes_le()?;
        let payload_kind = PayloadKind::from_raw(cursor.read_bytes_le()?)?;
        let timestamp = cursor.read_bytes_le()?;

        let image = match payload_kind {
            PayloadKind::Image | PayloadKind::ImageExtendedChunk => {
                let pixel_format = cursor
                    .read_bytes_le::<u32>()?
                    .try_into()
                    .map_err(|e: String| Error::InvalidPacket(e.into()))?;
                Some(ImageInfo {
                    pixel_format,
                    width: cursor.read_bytes_le()?,
                    height: cursor.read_bytes_le()?,
                    x_offset: cursor.read_bytes_le()?,
                    y_offset: cursor.read_bytes_le()?,
                    x_padding: cursor.read_bytes_le()?,
                })
            }
            PayloadKind::Chunk => None,
        };

        Ok(Self {
            block_id,
            payload_kind,
            timestamp,
            image,
        })
    }

    pub fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        let leader_size = match self.payload_kind {
            PayloadKind::Image | PayloadKind::ImageExtendedChunk => 50_u16,
            PayloadKind::Chunk => 28,
        };
        buf.write_bytes_le(LEADER_MAGIC)?;
        buf.write_bytes_le(0_u16)?;
        buf.write_bytes_le(leader_size)?;
        buf.write_bytes_le(self.block_id)?;
        buf.write_bytes_le(0_u16)?;
        buf.write_bytes_le(self.payload_kind.raw())?;
        buf.write_bytes_le(self.timestamp)?;
        if let Some(image) = &self.image {
            buf.write_bytes_le(image.pixel_format.code())?;
            buf.write_bytes_le(image.width)?;
            buf.write_bytes_le(image.height)?;
            buf.write_bytes_le(image.x_offset)?;
            buf.write_bytes_le(image.y_offset)?;
            buf.write_bytes_le(image.x_padding)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadStatus {
    Success,
    /// The frame was aborted on the device side; the payload is truncated.
    DataDiscarded,
    DataOverrun,
}

impl PayloadStatus {
    #[must_use]
    pub fn raw(self) -> u16 {
        match self {
            Self::Success => 0x0000,
            Self::DataDiscarded => 0xa100,
            Self::DataOverrun => 0xa101,
        }
    }

    fn from_raw(raw: u16) -> Result<Self> {
        Ok(match raw {
            0x0000 => Self::Success,
            0xa100 => Self::DataDiscarded,
            0xa101 => Self::DataOverrun,
            other => {
                return Err(Error::InvalidPacket(
                    format!("unknown UVSP payload status {:#06x}", other).into(),
                ))
            }
        })
    }
}

/// Frame trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    pub block_id: u64,
    pub status: PayloadStatus,
    /// Bytes of payload actually delivered for this frame.
    pub valid_payload_size: u64,
    /// Delivered image height; differs from the leader's when the frame
    /// ended early.
    pub actual_height: u32,
}

impl Trailer {
    pub fn parse(buf: &(impl AsRef<[u8]> + ?Sized)) -> Result<Self> {
        let mut cursor = io::Cursor::new(buf.as_ref());
        let magic: u32 = cursor.read_bytes_le()?;
        if magic != TRAILER_MAGIC {
            return Err(Error::InvalidPacket("invalid trailer prefix magic".into()));
        }
        let _reserved: u16 = cursor.read_bytes_le()?;
        let _trailer_size: u16 = cursor.read_bytes_le()?;
        let block_id = cursor.read_bytes_le()?;
        let status = PayloadStatus::from_raw(cursor.read_bytes_le()?)?;
        let _reserved: u16 = cursor.read_bytes_le()?;
        let valid_payload_size = cursor.read_bytes_le()?;
        let actual_height = cursor.read_bytes_le()?;
        Ok(Self {
            block_id,
            status,
            valid_payload_size,
            actual_height,
        })
    }

    pub fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_le(TRAILER_MAGIC)?;
        buf.write_bytes_le(0_u16)?;
        buf.write_bytes_le(32_u16)?;
        buf.write_bytes_le(self.block_id)?;
        buf.write_bytes_le(self.status.raw())?;
        buf.write_bytes_le(0_u16)?;
        buf.write_bytes_le(self.valid_payload_size)?;
        buf.write_bytes_le(self.actual_height)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_leader_round_trip() {
        let leader = Leader {
            block_id: 77,
            payload_kind: PayloadKind::Image,
            timestamp: 123_456_789,
            image: Some(ImageInfo {
                pixel_format: PixelFormat::Mono8,
                width: 1280,
                height: 1024,
                x_offset: 0,
                y_offset: 0,
                x_padding: 0,
            }),
        };
        let mut buf = Vec::new();
        leader.serialize(&mut buf).unwrap();
        assert_eq!(&buf[0..4], b"L3UV");
        assert_eq!(Leader::parse(&buf).unwrap(), leader);
    }

    #[test]
    fn chunk_leader_round_trip() {
        let leader = Leader {
            block_id: 1,
            payload_kind: PayloadKind::Chunk,
            timestamp: 42,
            image: None,
        };
        let mut buf = Vec::new();
        leader.serialize(&mut buf).unwrap();
        assert_eq!(Leader::parse(&buf).unwrap(), leader);
    }

    #[test]
    fn trailer_round_trip() {
        let trailer = Trailer {
            block_id: 77,
            status: PayloadStatus::Success,
            valid_payload_size: 1280 * 1024,
            actual_height: 1024,
        };
        let mut buf = Vec::new();
        trailer.serialize(&mut buf).unwrap();
        assert_eq!(&buf[0..4], b"T3UV");
        assert_eq!(Trailer::parse(&buf).unwrap(), trailer);
    }

    #[test]
    fn magic_mismatch_is_rejected() {
        let trailer = Trailer {
            block_id: 0,
            status: PayloadStatus::Success,
            valid_payload_size: 0,
            actual_height: 0,
        };
        let mut buf = Vec::new();
        trailer.serialize(&mut buf).unwrap();
        assert!(Leader::parse(&buf).is_err());
    }
}
