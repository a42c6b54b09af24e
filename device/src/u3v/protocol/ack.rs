/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! UVCP acknowledge packets.

use std::{io, time};

use lucida_impl::byte_io::{ReadBytes, WriteBytes};

use crate::u3v::{Error, Result};

use super::{cmd::MAGIC, Status};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckPacket<'a> {
    ccd: AckCcd,
    raw_scd: &'a [u8],
}

impl<'a> AckPacket<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        let mut cursor = io::Cursor::new(buf);
        let magic: u32 = cursor.read_bytes_le()?;
        if magic != MAGIC {
            return Err(Error::InvalidPacket("invalid UVCP prefix magic".into()));
        }
        let ccd = AckCcd::parse(&mut cursor)?;

        let raw_scd = &cursor.get_ref()[cursor.position() as usize..];
        if raw_scd.len() < ccd.scd_len as usize {
            return Err(Error::InvalidPacket(
                "ack SCD shorter than the declared length".into(),
            ));
        }

        Ok(Self {
            ccd,
            raw_scd: &raw_scd[..ccd.scd_len as usize],
        })
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.ccd.status
    }

    #[must_use]
    pub fn scd_kind(&self) -> AckScdKind {
        self.ccd.scd_kind
    }

    #[must_use]
    pub fn request_id(&self) -> u16 {
        self.ccd.request_id
    }

    pub fn scd_as<T: ParseScd<'a>>(&self) -> Result<T> {
        T::parse(self.raw_scd, &self.ccd)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AckCcd {
    status: Status,
    scd_kind: AckScdKind,
    scd_len: u16,
    request_id: u16,
}

impl AckCcd {
    fn parse(cursor: &mut io::Cursor<&[u8]>) -> Result<Self> {
        let status = Status::from_code(cursor.read_bytes_le()?)?;
        let scd_kind = AckScdKind::from_code(cursor.read_bytes_le()?)?;
        let scd_len = cursor.read_bytes_le()?;
        let request_id = cursor.read_bytes_le()?;
        Ok(Self {
            status,
            scd_kind,
            scd_len,
            request_id,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckScdKind {
    ReadMem,
    WriteMem,
    Pending,
}

impl AckScdKind {
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::ReadMem => 0x0801,
            Self::WriteMem => 0x0803,
            Self::Pending => 0x0805,
        }
    }

    fn from_code(code: u16) -> Result<Self> {
        Ok(match code {
            0x0801 => Self::ReadMem,
            0x0803 => Self::WriteMem,
            0x0805 => Self::Pending,
            _ => {
                return Err(Error::InvalidPacket(
                    format!("unknown ack SCD kind {:#06x}", code).into(),
                ))
            }
        })
    }
}

pub trait ParseScd<'a>: Sized {
    fn parse(raw_scd: &'a [u8], ccd: &AckCcd) -> Result<Self>;
}

/// Serialization counterpart of [`ParseScd`], for tests and in-memory
/// device stand-ins.
pub trait AckSerialize {
    fn kind(&self) -> AckScdKind;

    fn scd_len(&self) -> u16;

    fn serialize(&self, buf: impl io::Write) -> Result<()>;

    fn finalize(&self, status: Status, request_id: u16) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(12 + self.scd_len() as usize);
        buf.write_bytes_le(MAGIC)?;
        buf.write_bytes_le(status.code())?;
        buf.write_bytes_le(self.kind().code())?;
        buf.write_bytes_le(self.scd_len())?;
        buf.write_bytes_le(request_id)?;
        self.serialize(&mut buf)?;
        Ok(buf)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadMem<'a> {
    data: &'a [u8],
}

impl<'a> ReadMem<'a> {
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

impl<'a> ParseScd<'a> for ReadMem<'a> {
    fn parse(raw_scd: &'a [u8], ccd: &AckCcd) -> Result<Self> {
        if ccd.scd_kind != AckScdKind::ReadMem {
            return Err(Error::InvalidPacket(
                format!("expected `ReadMem` ack, got {:?}", ccd.scd_kind).into(),
            ));
        }
        Ok(Self { data: raw_scd })
    }
}

/// Owned `ReadMem` answer used on the serialize side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadMemData(pub Vec<u8>);

impl AckSerialize for ReadMemData {
    fn kind(&self) -> AckScdKind {
        AckScdKind::ReadMem
    }

    fn scd_len(&self) -> u16 {
        self.0.len() as u16
    }

    fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_all(&self.0)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteMem {
    length_written: u16,
}

impl WriteMem {
    #[must_use]
    pub fn new(length_written: u16) -> Self {
        Self { length_written }
    }

    #[must_use]
    pub fn length_written(self) -> u16 {
        self.length_written
    }
}

impl<'a> ParseScd<'a> for WriteMem {
    fn parse(mut raw_scd: &'a [u8], ccd: &AckCcd) -> Result<Self> {
        if ccd.scd_kind != AckScdKind::WriteMem {
            return Err(Error::InvalidPacket(
                format!("expected `WriteMem` ack, got {:?}", ccd.scd_kind).into(),
            ));
        }
        let _reserved: u16 = raw_scd.read_bytes_le()?;
        let length_written = raw_scd.read_bytes_le()?;
        Ok(Self { length_written })
    }
}

impl AckSerialize for WriteMem {
    fn kind(&self) -> AckScdKind {
        AckScdKind::WriteMem
    }

    fn scd_len(&self) -> u16 {
        4
    }

    fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_le(0_u16)?;
        buf.write_bytes_le(self.length_written)?;
        Ok(())
    }
}

/// The device needs more time; extend the current attempt's deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pending {
    timeout_ms: u16,
}

impl Pending {
    #[must_use]
    pub fn new(timeout: time::Duration) -> Self {
        Self {
            timeout_ms: timeout.as_millis() as u16,
        }
    }

    #[must_use]
    pub fn timeout(self) -> time::Duration {
        time::Duration::from_millis(u64::from(self.timeout_ms))
    }
}

impl<'a> ParseScd<'a> for Pending {
    fn parse(mut raw_scd: &'a [u8], ccd: &AckCcd) -> Result<Self> {
        if ccd.scd_kind != AckScdKind::Pending {
            return Err(Error::InvalidPacket(
                format!("expected `Pending` ack, got {:?}", ccd.scd_kind).into(),
            ));
        }
        let _reserved: u16 = raw_scd.read_bytes_le()?;
        let timeout_ms = raw_scd.read_bytes_le()?;
        Ok(Self { timeout_ms })
    }
}

impl AckSerialize for Pending {
    fn kind(&self) -> AckScdKind {
        AckScdKind::Pending
    }

    fn scd_len(&self) -> u16 {
        4
    }

    fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_le(0_u16)?;
        buf.write_bytes_le(self.timeout_ms)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::u3v::protocol::StatusKind;

    #[test]
    fn read_mem_round_trip() {
        let buf = ReadMemData(vec![1, 2, 3, 4]).finalize(Status::SUCCESS, 5).unwrap();
        let ack = AckPacket::parse(&buf).unwrap();
        assert!(ack.status().is_success());
        assert_eq!(ack.request_id(), 5);
        let scd: ReadMem = ack.scd_as().unwrap();
        assert_eq!(scd.data(), &[1, 2, 3, 4]);
    }

    #[test]
    fn pending_round_trip() {
        let buf = Pending::new(time::Duration::from_millis(120))
            .finalize(Status::SUCCESS, 8)
            .unwrap();
        let ack = AckPacket::parse(&buf).unwrap();
        assert_eq!(ack.scd_kind(), AckScdKind::Pending);
        let scd: Pending = ack.scd_as().unwrap();
        assert_eq!(scd.timeout(), time::Duration::from_millis(120));
    }

    #[test]
    fn error_status_survives() {
        let buf = WriteMem::new(0)
            .finalize(StatusKind::WriteProtect.into(), 2)
            .unwrap();
        let ack = AckPacket::parse(&buf).unwrap();
        assert!(!ack.status().is_success());
        assert_eq!(ack.status().kind(), StatusKind::WriteProtect);
    }
}
