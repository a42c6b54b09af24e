/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! GVCP command packets.
//!
//! Every command is an 8-byte big-endian header followed by
//! command-specific data. Acknowledges echo the request id and carry
//! `command + 1` as their kind.

use std::io;

use lucida_impl::byte_io::WriteBytes;

use crate::gev::{Error, Result};

/// Request id 0 is reserved; id generators must skip it when wrapping.
pub const RESERVED_REQUEST_ID: u16 = 0;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandPacket<T> {
    header: CommandHeader,
    command_data: T,
}

impl<T> CommandPacket<T>
where
    T: CommandData,
{
    pub fn new(command_data: T, request_id: u16) -> Self {
        let header = CommandHeader::new(&command_data, request_id);
        Self {
            header,
            command_data,
        }
    }

    pub fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        self.header.serialize(&mut buf)?;
        self.command_data.serialize(&mut buf)?;
        Ok(())
    }

    /// Full datagram length, header included.
    #[must_use]
    pub fn length(&self) -> usize {
        8 + self.command_data.length() as usize
    }

    #[must_use]
    pub fn request_id(&self) -> u16 {
        self.header.request_id
    }

    #[must_use]
    pub fn kind(&self) -> CommandKind {
        self.header.command_kind
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandHeader {
    flag: CommandFlag,
    command_kind: CommandKind,
    length: u16,
    request_id: u16,
}

impl CommandHeader {
    const MAGIC: u8 = 0x42;

    pub fn new(command_data: &impl CommandData, request_id: u16) -> Self {
        Self {
            flag: command_data.flag(),
            command_kind: command_data.kind(),
            length: command_data.length(),
            request_id,
        }
    }

    pub fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_be(Self::MAGIC)?;
        self.flag.serialize(&mut buf)?;
        self.command_kind.serialize(&mut buf)?;
        buf.write_bytes_be(self.length)?;
        buf.write_bytes_be(self.request_id)?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    Discovery,
    ForceIp,
    ReadReg,
    WriteReg,
    ReadMem,
    WriteMem,
    PacketResend,
    Event,
}

impl CommandKind {
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::Discovery => 0x0002,
            Self::ForceIp => 0x0004,
            Self::PacketResend => 0x0040,
            Self::ReadReg => 0x0080,
            Self::WriteReg => 0x0082,
            Self::ReadMem => 0x0084,
            Self::WriteMem => 0x0086,
            Self::Event => 0x00c0,
        }
    }

    pub fn from_code(code: u16) -> Result<Self> {
        Ok(match code {
            0x0002 => Self::Discovery,
            0x0004 => Self::ForceIp,
            0x0040 => Self::PacketResend,
            0x0080 => Self::ReadReg,
            0x0082 => Self::WriteReg,
            0x0084 => Self::ReadMem,
            0x0086 => Self::WriteMem,
            0x00c0 => Self::Event,
            _ => {
                return Err(Error::InvalidPacket(
                    format!("unknown gvcp command code {:#06x}", code).into(),
                ))
            }
        })
    }

    pub fn serialize(self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_be(self.code())?;
        Ok(())
    }
}

pub trait CommandData: Sized {
    fn flag(&self) -> CommandFlag;

    fn kind(&self) -> CommandKind;

    /// Length of the command-specific data in bytes.
    fn length(&self) -> u16;

    fn serialize(&self, buf: impl io::Write) -> Result<()>;

    fn finalize(self, request_id: u16) -> CommandPacket<Self> {
        CommandPacket::new(self, request_id)
    }
}

/// Discovery broadcast. Devices answer with a [`super::ack::Discovery`]
/// block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Discovery {
    allow_broadcast_ack: bool,
}

impl Discovery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Permits devices to answer to the broadcast address, needed when the
    /// device has no valid IP configuration yet.
    pub fn set_allow_broadcast_ack(&mut self, allow: bool) {
        self.allow_broadcast_ack = allow;
    }
}

impl CommandData for Discovery {
    fn flag(&self) -> CommandFlag {
        let flag = CommandFlag::new().need_ack();
        if self.allow_broadcast_ack {
            flag.set_bit(3)
        } else {
            flag
        }
    }

    fn kind(&self) -> CommandKind {
        CommandKind::Discovery
    }

    fn length(&self) -> u16 {
        0
    }

    fn serialize(&self, _: impl io::Write) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ReadReg {
    addresses: Vec<u32>,
}

impl ReadReg {
    /// GVCP bounds one `ReadReg` command to 135 register addresses.
    pub const MAXIMUM_ENTRIES: usize = 135;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&mut self, address: u32) -> Result<()> {
        if self.addresses.len() >= Self::MAXIMUM_ENTRIES {
            Err(Error::InvalidPacket(
                format!(
                    "`ReadReg` is limited to {} entries",
                    Self::MAXIMUM_ENTRIES
                )
                .into(),
            ))
        } else if address % 4 != 0 {
            Err(Error::InvalidPacket(
                "a `ReadReg` address must be a multiple of 4".into(),
            ))
        } else {
            self.addresses.push(address);
            Ok(())
        }
    }
}

impl CommandData for ReadReg {
    fn flag(&self) -> CommandFlag {
        CommandFlag::new().need_ack()
    }

    fn kind(&self) -> CommandKind {
        CommandKind::ReadReg
    }

    fn length(&self) -> u16 {
        (self.addresses.len() * std::mem::size_of::<u32>()) as u16
    }

    fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        for address in &self.addresses {
            buf.write_bytes_be(*address)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteRegEntry {
    address: u32,
    data: u32,
}

impl WriteRegEntry {
    pub fn new(address: u32, data: u32) -> Result<Self> {
        if address % 4 == 0 {
            Ok(Self { address, data })
        } else {
            Err(Error::InvalidPacket(
                "a `WriteReg` address must be a multiple of 4".into(),
            ))
        }
    }

    const fn length() -> u16 {
        8
    }

    fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_be(self.address)?;
        buf.write_bytes_be(self.data)?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteReg {
    entries: Vec<WriteRegEntry>,
    need_ack: bool,
}

impl Default for WriteReg {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            need_ack: true,
        }
    }
}

impl WriteReg {
    pub const MAXIMUM_ENTRIES: usize = 67;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&mut self, entry: WriteRegEntry) -> Result<()> {
        if self.entries.len() >= Self::MAXIMUM_ENTRIES {
            Err(Error::InvalidPacket(
                format!(
                    "`WriteReg` is limited to {} entries",
                    Self::MAXIMUM_ENTRIES
                )
                .into(),
            ))
        } else {
            self.entries.push(entry);
            Ok(())
        }
    }

    pub fn set_need_ack(&mut self, need_ack: bool) {
        self.need_ack = need_ack;
    }
}

impl CommandData for WriteReg {
    fn flag(&self) -> CommandFlag {
        if self.need_ack {
            CommandFlag::new().need_ack()
        } else {
            CommandFlag::new()
        }
    }

    fn kind(&self) -> CommandKind {
        CommandKind::WriteReg
    }

    fn length(&self) -> u16 {
        self.entries.len() as u16 * WriteRegEntry::length()
    }

    fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        for ent in &self.entries {
            ent.serialize(&mut buf)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadMem {
    address: u32,
    length: u16,
}

impl ReadMem {
    /// Maximum read length of one `ReadMem` transaction, constrained by
    /// the minimum GVCP datagram size.
    pub const MAXIMUM_READ_LENGTH: u16 = 536;

    pub fn new(address: u32, length: u16) -> Result<Self> {
        if address % 4 != 0 || length % 4 != 0 {
            Err(Error::InvalidPacket(
                "`ReadMem` address and length must be multiples of 4".into(),
            ))
        } else if length > Self::MAXIMUM_READ_LENGTH {
            Err(Error::InvalidPacket(
                format!(
                    "`ReadMem` length must not exceed {}",
                    Self::MAXIMUM_READ_LENGTH
                )
                .into(),
            ))
        } else {
            Ok(Self { address, length })
        }
    }
}

impl CommandData for ReadMem {
    fn flag(&self) -> CommandFlag {
        CommandFlag::new().need_ack()
    }

    fn kind(&self) -> CommandKind {
        CommandKind::ReadMem
    }

    fn length(&self) -> u16 {
        8
    }

    fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_be(self.address)?;
        buf.write_bytes_be(0_u16)?;
        buf.write_bytes_be(self.length)?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteMem<'a> {
    address: u32,
    data: &'a [u8],
    need_ack: bool,
}

impl<'a> WriteMem<'a> {
    /// Maximum data length of one `WriteMem` transaction.
    pub const MAXIMUM_DATA_LENGTH: usize = 536;

    pub fn new(address: u32, data: &'a [u8]) -> Result<Self> {
        if address % 4 != 0 || data.len() % 4 != 0 {
            Err(Error::InvalidPacket(
                "`WriteMem` address and data length must be multiples of 4".into(),
            ))
        } else if data.len() > Self::MAXIMUM_DATA_LENGTH {
            Err(Error::InvalidPacket(
                format!(
                    "`WriteMem` data must not exceed {} bytes",
                    Self::MAXIMUM_DATA_LENGTH
                )
                .into(),
            ))
        } else {
            Ok(Self {
                address,
                data,
                need_ack: true,
            })
        }
    }

    pub fn set_need_ack(&mut self, need_ack: bool) {
        self.need_ack = need_ack;
    }
}

impl<'a> CommandData for WriteMem<'a> {
    fn flag(&self) -> CommandFlag {
        if self.need_ack {
            CommandFlag::new().need_ack()
        } else {
            CommandFlag::new()
        }
    }

    fn kind(&self) -> CommandKind {
        CommandKind::WriteMem
    }

    fn length(&self) -> u16 {
        4 + self.data.len() as u16
    }

    fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_be(self.address)?;
        buf.write_all(self.data)?;
        Ok(())
    }
}

/// Asks the device to retransmit a packet-id range of one stream block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketResend {
    is_extended_id: bool,
    stream_channel_index: u16,
    first_packet_id: u32,
    last_packet_id: u32,
    block_id: u64,
}

impl PacketResend {
    /// Largest packet id expressible without the extended-id mode.
    pub const UNEXTENDED_MAXIMUM_PACKET_ID: u32 = (1 << 24) - 1;

    #[must_use]
    pub fn with_extended_id(
        stream_channel_index: u16,
        first_packet_id: u32,
        last_packet_id: u32,
        block_id: u64,
    ) -> Self {
        Self {
            is_extended_id: true,
            stream_channel_index,
            first_packet_id,
            last_packet_id,
            block_id,
        }
    }

    pub fn with_unextended_id(
        stream_channel_index: u16,
        first_packet_id: u32,
        last_packet_id: u32,
        block_id: u16,
    ) -> Result<Self> {
        if first_packet_id > Self::UNEXTENDED_MAXIMUM_PACKET_ID
            || last_packet_id > Self::UNEXTENDED_MAXIMUM_PACKET_ID
        {
            Err(Error::InvalidPacket(
                format!(
                    "packet ids without extended-id mode are limited to {}",
                    Self::UNEXTENDED_MAXIMUM_PACKET_ID
                )
                .into(),
            ))
        } else {
            Ok(Self {
                is_extended_id: false,
                stream_channel_index,
                first_packet_id,
                last_packet_id,
                block_id: u64::from(block_id),
            })
        }
    }
}

impl CommandData for PacketResend {
    fn flag(&self) -> CommandFlag {
        // A resend command is never acknowledged; the resent stream
        // packets themselves are the answer.
        if self.is_extended_id {
            CommandFlag::new().set_bit(3)
        } else {
            CommandFlag::new()
        }
    }

    fn kind(&self) -> CommandKind {
        CommandKind::PacketResend
    }

    fn length(&self) -> u16 {
        if self.is_extended_id {
            20
        } else {
            12
        }
    }

    fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_be(self.stream_channel_index)?;
        if self.is_extended_id {
            buf.write_bytes_be(0_u16)?;
        } else {
            buf.write_bytes_be(self.block_id as u16)?;
        }
        buf.write_bytes_be(self.first_packet_id)?;
        buf.write_bytes_be(self.last_packet_id)?;
        if self.is_extended_id {
            buf.write_bytes_be(self.block_id)?;
        }
        Ok(())
    }
}

/// Device initiated event notification, sent on the message channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event {
    event_id: u16,
    stream_channel_index: u16,
    block_id: u64,
    timestamp: u64,
}

impl Event {
    #[must_use]
    pub fn new(event_id: u16, stream_channel_index: u16, block_id: u64, timestamp: u64) -> Self {
        Self {
            event_id,
            stream_channel_index,
            block_id,
            timestamp,
        }
    }

    #[must_use]
    pub fn event_id(&self) -> u16 {
        self.event_id
    }

    #[must_use]
    pub fn block_id(&self) -> u64 {
        self.block_id
    }

    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

impl CommandData for Event {
    fn flag(&self) -> CommandFlag {
        CommandFlag::new().need_ack()
    }

    fn kind(&self) -> CommandKind {
        CommandKind::Event
    }

    fn length(&self) -> u16 {
        24
    }

    fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_be(0_u16)?;
        buf.write_bytes_be(self.event_id)?;
        buf.write_bytes_be(self.stream_channel_index)?;
        buf.write_bytes_be(0_u16)?;
        buf.write_bytes_be(self.block_id)?;
        buf.write_bytes_be(self.timestamp)?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct CommandFlag(u8);

impl CommandFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn set_bit(self, pos: u8) -> Self {
        debug_assert!(pos < 8);
        Self(self.0 | 1_u8 << pos)
    }

    #[must_use]
    pub fn need_ack(self) -> Self {
        self.set_bit(7)
    }

    #[must_use]
    pub fn is_ack_needed(self) -> bool {
        self.0 & 0x80 != 0
    }

    pub fn serialize(self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_be(self.0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_header_layout() {
        let mut cmd = Discovery::new();
        cmd.set_allow_broadcast_ack(true);
        let pkt = cmd.finalize(1);
        let mut buf = Vec::new();
        pkt.serialize(&mut buf).unwrap();
        assert_eq!(buf, [0x42, 0x88, 0x00, 0x02, 0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn read_reg_rejects_unaligned_address() {
        let mut cmd = ReadReg::new();
        assert!(cmd.add_entry(0x0a02).is_err());
        assert!(cmd.add_entry(0x0a00).is_ok());
    }

    #[test]
    fn write_mem_layout() {
        let data = [1_u8, 2, 3, 4];
        let cmd = WriteMem::new(0x1000, &data).unwrap();
        let pkt = cmd.finalize(0x10);
        let mut buf = Vec::new();
        pkt.serialize(&mut buf).unwrap();
        assert_eq!(pkt.length(), 16);
        assert_eq!(
            buf,
            [0x42, 0x80, 0x00, 0x86, 0x00, 0x08, 0x00, 0x10, 0x00, 0x00, 0x10, 0x00, 1, 2, 3, 4]
        );
    }

    #[test]
    fn resend_with_unextended_id_layout() {
        let cmd = PacketResend::with_unextended_id(0, 3, 7, 0x0102).unwrap();
        let mut buf = Vec::new();
        cmd.finalize(9).serialize(&mut buf).unwrap();
        assert_eq!(
            buf,
            [
                0x42, 0x00, 0x00, 0x40, 0x00, 0x0c, 0x00, 0x09, // header
                0x00, 0x00, 0x01, 0x02, // channel + block id
                0x00, 0x00, 0x00, 0x03, // first
                0x00, 0x00, 0x00, 0x07, // last
            ]
        );
    }

    #[test]
    fn resend_rejects_oversized_unextended_packet_id() {
        assert!(PacketResend::with_unextended_id(0, 0, 1 << 24, 1).is_err());
    }
}
