/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! UVCP command packets.
//!
//! A command is the magic `V3U1`, a common command descriptor (flags,
//! command id, SCD length, request id) and a command-specific descriptor.

use std::io;

use lucida_impl::byte_io::WriteBytes;

use crate::u3v::{Error, Result};

/// `V3U1`, little-endian.
pub const MAGIC: u32 = u32::from_le_bytes(*b"V3U1");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPacket<T> {
    ccd: CommandCcd,
    scd: T,
}

impl<T> CommandPacket<T>
where
    T: CommandScd,
{
    // Magic + CCD length.
    pub const HEADER_LEN: usize = 4 + 8;

    pub fn new(scd: T, request_id: u16) -> Self {
        let ccd = CommandCcd::from_scd(&scd, request_id);
        Self { ccd, scd }
    }

    pub fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_le(MAGIC)?;
        self.ccd.serialize(&mut buf)?;
        self.scd.serialize(&mut buf)?;
        Ok(())
    }

    #[must_use]
    pub fn cmd_len(&self) -> usize {
        Self::HEADER_LEN + self.scd.scd_len() as usize
    }

    #[must_use]
    pub fn request_id(&self) -> u16 {
        self.ccd.request_id
    }

    /// Largest acknowledge the device may answer with, pending acks
    /// included.
    #[must_use]
    pub fn maximum_ack_len(&self) -> usize {
        const MINIMUM_ACK_SCD_LEN: u16 = 4;
        Self::HEADER_LEN + self.scd.ack_scd_len().max(MINIMUM_ACK_SCD_LEN) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandCcd {
    flag: CommandFlag,
    scd_kind: ScdKind,
    scd_len: u16,
    request_id: u16,
}

impl CommandCcd {
    fn from_scd(scd: &impl CommandScd, request_id: u16) -> Self {
        Self {
            flag: scd.flag(),
            scd_kind: scd.kind(),
            scd_len: scd.scd_len(),
            request_id,
        }
    }

    fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_le(self.flag.0)?;
        buf.write_bytes_le(self.scd_kind.code())?;
        buf.write_bytes_le(self.scd_len)?;
        buf.write_bytes_le(self.request_id)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScdKind {
    ReadMem,
    WriteMem,
}

impl ScdKind {
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::ReadMem => 0x0800,
            Self::WriteMem => 0x0802,
        }
    }
}

pub trait CommandScd: Sized {
    fn flag(&self) -> CommandFlag;

    fn kind(&self) -> ScdKind;

    fn scd_len(&self) -> u16;

    /// SCD length of the corresponding acknowledge.
    fn ack_scd_len(&self) -> u16;

    fn serialize(&self, buf: impl io::Write) -> Result<()>;

    fn finalize(self, request_id: u16) -> CommandPacket<Self> {
        CommandPacket::new(self, request_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadMem {
    pub(crate) address: u64,
    pub(crate) read_length: u16,
}

impl ReadMem {
    #[must_use]
    pub fn new(address: u64, read_length: u16) -> Self {
        Self {
            address,
            read_length,
        }
    }

    #[must_use]
    pub fn read_length(&self) -> u16 {
        self.read_length
    }

    /// Largest read length whose acknowledge still fits `maximum_ack_len`.
    #[must_use]
    pub fn maximum_read_length(maximum_ack_len: usize) -> u16 {
        use std::convert::TryInto;
        (maximum_ack_len - CommandPacket::<ReadMem>::HEADER_LEN)
            .try_into()
            .unwrap_or(u16::MAX)
    }
}

impl CommandScd for ReadMem {
    fn flag(&self) -> CommandFlag {
        CommandFlag::new().request_ack()
    }

    fn kind(&self) -> ScdKind {
        ScdKind::ReadMem
    }

    fn scd_len(&self) -> u16 {
        12
    }

    fn ack_scd_len(&self) -> u16 {
        self.read_length
    }

    fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_le(self.address)?;
        buf.write_bytes_le(0_u16)?;
        buf.write_bytes_le(self.read_length)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteMem<'a> {
    pub(crate) address: u64,
    pub(crate) data: &'a [u8],
}

impl<'a> WriteMem<'a> {
    pub fn new(address: u64, data: &'a [u8]) -> Result<Self> {
        if data.len() > usize::from(u16::MAX) - 8 {
            return Err(Error::InvalidData(
                "`WriteMem` data too long for one command".into(),
            ));
        }
        Ok(Self { address, data })
    }

    /// Largest data length whose command still fits `maximum_cmd_len`.
    #[must_use]
    pub fn maximum_data_length(maximum_cmd_len: usize) -> usize {
        maximum_cmd_len - CommandPacket::<ReadMem>::HEADER_LEN - 8
    }
}

impl<'a> CommandScd for WriteMem<'a> {
    fn flag(&self) -> CommandFlag {
        CommandFlag::new().request_ack()
    }

    fn kind(&self) -> ScdKind {
        ScdKind::WriteMem
    }

    fn scd_len(&self) -> u16 {
        8 + self.data.len() as u16
    }

    fn ack_scd_len(&self) -> u16 {
        4
    }

    fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_le(self.address)?;
        buf.write_all(self.data)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandFlag(u16);

impl CommandFlag {
    const REQUEST_ACK: u16 = 1 << 14;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn request_ack(self) -> Self {
        Self(self.0 | Self::REQUEST_ACK)
    }

    #[must_use]
    pub fn is_ack_requested(self) -> bool {
        self.0 & Self::REQUEST_ACK != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_mem_layout() {
        let cmd = ReadMem::new(0x0004, 64).finalize(1);
        let mut buf = Vec::new();
        cmd.serialize(&mut buf).unwrap();

        assert_eq!(&buf[0..4], b"V3U1");
        assert_eq!(&buf[4..6], [0x00, 0x40]); // request_ack flag, LE
        assert_eq!(&buf[6..8], [0x00, 0x08]); // ReadMem, LE
        assert_eq!(&buf[8..10], [12, 0]); // scd_len
        assert_eq!(&buf[10..12], [1, 0]); // request_id
        assert_eq!(buf.len(), cmd.cmd_len());
    }

    #[test]
    fn write_mem_layout() {
        let data = [0xau8, 0xb, 0xc, 0xd];
        let cmd = WriteMem::new(0x1_0000, &data).unwrap().finalize(2);
        let mut buf = Vec::new();
        cmd.serialize(&mut buf).unwrap();

        assert_eq!(buf.len(), 12 + 8 + 4);
        assert_eq!(&buf[12..20], [0, 0, 1, 0, 0, 0, 0, 0]); // address LE
        assert_eq!(&buf[20..], data);
    }
}
