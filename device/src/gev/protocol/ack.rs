/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! GVCP acknowledge packets.
//!
//! The parse side borrows the received datagram. The serialize side exists
//! so protocol tests (and in-process responders) can synthesize answers.

use std::{
    convert::TryInto,
    io::{self, Read, Seek},
    net::Ipv4Addr,
    time,
};

use lucida_impl::byte_io::{ReadBytes, WriteBytes};
use semver::Version;

use crate::gev::{
    register_map::{DeviceMode, NicCapability, NicConfiguration},
    Error, Result,
};

use super::{cmd::CommandKind, Status};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AckPacket<'a> {
    header: Header,
    raw_ack_data: &'a [u8],
}

impl<'a> AckPacket<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        let mut cursor = io::Cursor::new(buf);
        let header = Header::parse(&mut cursor)?;

        let ack_length = header.length as usize;
        let raw_ack_data = &cursor.get_ref()[cursor.position() as usize..];
        if raw_ack_data.len() < ack_length {
            return Err(Error::InvalidPacket(
                "ack data is shorter than the length declared in the header".into(),
            ));
        }

        Ok(Self {
            header,
            raw_ack_data: &raw_ack_data[..ack_length],
        })
    }

    #[must_use]
    pub fn ack_kind(&self) -> AckKind {
        self.header.ack_kind
    }

    pub fn ack_data_as<T: ParseAckData<'a>>(&self) -> Result<T> {
        T::parse(self.raw_ack_data, &self.header)
    }

    #[must_use]
    pub fn raw_ack_data(&self) -> &[u8] {
        self.raw_ack_data
    }

    #[must_use]
    pub fn request_id(&self) -> u16 {
        self.header.request_id
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.header.status
    }

    /// Verifies the invariant "a valid response to command `C` with id `I`
    /// is an ack whose kind is `C`'s ack and whose id is `I`".
    #[must_use]
    pub fn is_ack_for(&self, command: CommandKind, request_id: u16) -> bool {
        self.request_id() == request_id
            && (self.ack_kind() == AckKind::Pending || self.ack_kind().code() == command.code() + 1)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    status: Status,
    ack_kind: AckKind,
    length: u16,
    request_id: u16,
}

impl Header {
    fn parse(cursor: &mut io::Cursor<&[u8]>) -> Result<Self> {
        let status = Status::parse(cursor)?;
        let ack_kind = AckKind::parse(cursor)?;
        let length = cursor.read_bytes_be()?;
        let request_id = cursor.read_bytes_be()?;
        Ok(Self {
            status,
            ack_kind,
            length,
            request_id,
        })
    }
}

pub trait ParseAckData<'a>: Sized {
    fn parse(raw_data: &'a [u8], header: &Header) -> Result<Self>;
}

/// Serialization counterpart of [`ParseAckData`].
pub trait AckSerialize {
    fn kind(&self) -> AckKind;

    fn length(&self) -> u16;

    fn serialize(&self, buf: impl io::Write) -> Result<()>;

    fn finalize(&self, status: Status, request_id: u16) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(8 + self.length() as usize);
        status.serialize(&mut buf)?;
        self.kind().serialize(&mut buf)?;
        buf.write_bytes_be(self.length())?;
        buf.write_bytes_be(request_id)?;
        self.serialize(&mut buf)?;
        Ok(buf)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckKind {
    Discovery,
    ForceIp,
    ReadReg,
    WriteReg,
    ReadMem,
    WriteMem,
    PacketResend,
    Event,
    Pending,
}

impl AckKind {
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::Discovery => 0x0003,
            Self::ForceIp => 0x0005,
            Self::PacketResend => 0x0041,
            Self::ReadReg => 0x0081,
            Self::WriteReg => 0x0083,
            Self::ReadMem => 0x0085,
            Self::WriteMem => 0x0087,
            Self::Pending => 0x0089,
            Self::Event => 0x00c1,
        }
    }

    fn parse(cursor: &mut io::Cursor<&[u8]>) -> Result<Self> {
        let code: u16 = cursor.read_bytes_be()?;
        Ok(match code {
            0x0003 => Self::Discovery,
            0x0005 => Self::ForceIp,
            0x0041 => Self::PacketResend,
            0x0081 => Self::ReadReg,
            0x0083 => Self::WriteReg,
            0x0085 => Self::ReadMem,
            0x0087 => Self::WriteMem,
            0x0089 => Self::Pending,
            0x00c1 => Self::Event,
            _ => {
                return Err(Error::InvalidPacket(
                    format!("unknown ack kind code {:#06x}", code).into(),
                ))
            }
        })
    }

    fn serialize(self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_be(self.code())?;
        Ok(())
    }
}

/// The 248-byte discovery acknowledge block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Discovery {
    pub gev_version: Version,
    pub device_mode: DeviceMode,
    pub mac_addr: [u8; 6],
    pub nic_capability: NicCapability,
    pub nic_configuration: NicConfiguration,
    pub ip: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub default_gateway: Ipv4Addr,
    pub manufacturer_name: String,
    pub model_name: String,
    pub device_version: String,
    pub manufacturer_info: String,
    pub serial_number: String,
    pub user_defined_name: String,
}

impl Discovery {
    const MANUFACTURER_NAME_LEN: usize = 32;
    const MODEL_NAME_LEN: usize = 32;
    const DEVICE_VERSION_LEN: usize = 32;
    const MANUFACTURER_INFO_LEN: usize = 48;
    const SERIAL_NUMBER_LEN: usize = 16;
    const USER_DEFINED_NAME_LEN: usize = 16;

    fn read_string(cursor: &mut io::Cursor<&[u8]>, field_len: usize) -> Result<String> {
        let start = cursor.position() as usize;
        let end = start + field_len;
        let inner = cursor.get_ref();
        if inner.len() < end {
            return Err(Error::InvalidPacket(
                format!("discovery ack too small: {} bytes", inner.len()).into(),
            ));
        }

        let field = &inner[start..end];
        let strlen = field.iter().position(|c| *c == 0).unwrap_or(field_len);
        let s = String::from_utf8_lossy(&field[..strlen]).to_string();
        cursor.seek(io::SeekFrom::Current(field_len as i64))?;
        Ok(s)
    }

    fn write_string(mut buf: impl io::Write, s: &str, field_len: usize) -> Result<()> {
        let mut field = vec![0_u8; field_len];
        let bytes = s.as_bytes();
        let len = bytes.len().min(field_len - 1);
        field[..len].copy_from_slice(&bytes[..len]);
        buf.write_all(&field)?;
        Ok(())
    }
}

impl<'a> ParseAckData<'a> for Discovery {
    fn parse(raw_data: &'a [u8], header: &Header) -> Result<Self> {
        if header.ack_kind != AckKind::Discovery {
            return Err(Error::InvalidPacket(
                format!("expected `Discovery` ack, got {:?}", header.ack_kind).into(),
            ));
        }

        let mut cursor = io::Cursor::new(raw_data);
        let version_major: u16 = cursor.read_bytes_be()?;
        let version_minor: u16 = cursor.read_bytes_be()?;
        let gev_version = Version::new(u64::from(version_major), u64::from(version_minor), 0);
        let device_mode = DeviceMode::from_raw(cursor.read_bytes_be()?);
        cursor.seek(io::SeekFrom::Current(2))?;
        let mut mac_addr = [0; 6];
        cursor.read_exact(&mut mac_addr)?;
        let nic_capability = NicCapability::from_raw(cursor.read_bytes_be()?);
        let nic_configuration = NicConfiguration::from_raw(cursor.read_bytes_be()?);
        cursor.seek(io::SeekFrom::Current(12))?;
        let ip = cursor.read_bytes_be::<u32>()?.into();
        cursor.seek(io::SeekFrom::Current(12))?;
        let subnet_mask = cursor.read_bytes_be::<u32>()?.into();
        cursor.seek(io::SeekFrom::Current(12))?;
        let default_gateway = cursor.read_bytes_be::<u32>()?.into();

        let manufacturer_name = Self::read_string(&mut cursor, Self::MANUFACTURER_NAME_LEN)?;
        let model_name = Self::read_string(&mut cursor, Self::MODEL_NAME_LEN)?;
        let device_version = Self::read_string(&mut cursor, Self::DEVICE_VERSION_LEN)?;
        let manufacturer_info = Self::read_string(&mut cursor, Self::MANUFACTURER_INFO_LEN)?;
        let serial_number = Self::read_string(&mut cursor, Self::SERIAL_NUMBER_LEN)?;
        let user_defined_name = Self::read_string(&mut cursor, Self::USER_DEFINED_NAME_LEN)?;

        Ok(Self {
            gev_version,
            device_mode,
            mac_addr,
            nic_capability,
            nic_configuration,
            ip,
            subnet_mask,
            default_gateway,
            manufacturer_name,
            model_name,
            device_version,
            manufacturer_info,
            serial_number,
            user_defined_name,
        })
    }
}

impl AckSerialize for Discovery {
    fn kind(&self) -> AckKind {
        AckKind::Discovery
    }

    fn length(&self) -> u16 {
        248
    }

    fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_be(self.gev_version.major as u16)?;
        buf.write_bytes_be(self.gev_version.minor as u16)?;
        buf.write_bytes_be(self.device_mode.raw())?;
        buf.write_bytes_be(0_u16)?;
        buf.write_all(&self.mac_addr)?;
        buf.write_bytes_be(self.nic_capability.raw())?;
        buf.write_bytes_be(self.nic_configuration.raw())?;
        buf.write_all(&[0; 12])?;
        buf.write_bytes_be(u32::from(self.ip))?;
        buf.write_all(&[0; 12])?;
        buf.write_bytes_be(u32::from(self.subnet_mask))?;
        buf.write_all(&[0; 12])?;
        buf.write_bytes_be(u32::from(self.default_gateway))?;
        Self::write_string(&mut buf, &self.manufacturer_name, Self::MANUFACTURER_NAME_LEN)?;
        Self::write_string(&mut buf, &self.model_name, Self::MODEL_NAME_LEN)?;
        Self::write_string(&mut buf, &self.device_version, Self::DEVICE_VERSION_LEN)?;
        Self::write_string(&mut buf, &self.manufacturer_info, Self::MANUFACTURER_INFO_LEN)?;
        Self::write_string(&mut buf, &self.serial_number, Self::SERIAL_NUMBER_LEN)?;
        Self::write_string(&mut buf, &self.user_defined_name, Self::USER_DEFINED_NAME_LEN)?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadReg<'a> {
    reg_data: &'a [u8],
}

impl<'a> ReadReg<'a> {
    #[must_use]
    pub fn entry_num(&self) -> u16 {
        (self.reg_data.len() / 4) as u16
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a [u8; 4]> {
        self.reg_data
            .chunks_exact(4)
            .map(|chunk| chunk.try_into().unwrap())
    }
}

impl<'a> ParseAckData<'a> for ReadReg<'a> {
    fn parse(raw_data: &'a [u8], header: &Header) -> Result<Self> {
        if header.ack_kind != AckKind::ReadReg {
            return Err(Error::InvalidPacket(
                format!("expected `ReadReg` ack, got {:?}", header.ack_kind).into(),
            ));
        }

        if header.length % 4 != 0 {
            return Err(Error::InvalidPacket(
                "`ReadReg` ack data must be a multiple of 4".into(),
            ));
        }
        Ok(Self { reg_data: raw_data })
    }
}

/// Owned `ReadReg` answer used on the serialize side.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ReadRegData {
    pub entries: Vec<u32>,
}

impl AckSerialize for ReadRegData {
    fn kind(&self) -> AckKind {
        AckKind::ReadReg
    }

    fn length(&self) -> u16 {
        (self.entries.len() * 4) as u16
    }

    fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        for ent in &self.entries {
            buf.write_bytes_be(*ent)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteReg {
    entry_num: u16,
}

impl WriteReg {
    #[must_use]
    pub fn new(entry_num: u16) -> Self {
        Self { entry_num }
    }

    #[must_use]
    pub fn entry_num(self) -> u16 {
        self.entry_num
    }
}

impl<'a> ParseAckData<'a> for WriteReg {
    fn parse(raw_data: &'a [u8], header: &Header) -> Result<Self> {
        if header.ack_kind != AckKind::WriteReg {
            return Err(Error::InvalidPacket(
                format!("expected `WriteReg` ack, got {:?}", header.ack_kind).into(),
            ));
        }

        let entry_num = (&raw_data[2..4]).read_bytes_be()?;
        Ok(Self { entry_num })
    }
}

impl AckSerialize for WriteReg {
    fn kind(&self) -> AckKind {
        AckKind::WriteReg
    }

    fn length(&self) -> u16 {
        4
    }

    fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_be(0_u16)?;
        buf.write_bytes_be(self.entry_num)?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadMem<'a> {
    address: u32,
    data: &'a [u8],
}

impl<'a> ReadMem<'a> {
    #[must_use]
    pub fn address(&self) -> u32 {
        self.address
    }

    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

impl<'a> ParseAckData<'a> for ReadMem<'a> {
    fn parse(mut raw_data: &'a [u8], header: &Header) -> Result<Self> {
        if header.ack_kind != AckKind::ReadMem {
            return Err(Error::InvalidPacket(
                format!("expected `ReadMem` ack, got {:?}", header.ack_kind).into(),
            ));
        }
        if (header.length as usize) < 4 {
            return Err(Error::InvalidPacket("`ReadMem` ack too short".into()));
        }

        let address = raw_data.read_bytes_be()?;
        Ok(Self {
            address,
            data: raw_data,
        })
    }
}

/// Owned `ReadMem` answer used on the serialize side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadMemData {
    pub address: u32,
    pub data: Vec<u8>,
}

impl AckSerialize for ReadMemData {
    fn kind(&self) -> AckKind {
        AckKind::ReadMem
    }

    fn length(&self) -> u16 {
        4 + self.data.len() as u16
    }

    fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_be(self.address)?;
        buf.write_all(&self.data)?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteMem {
    address: u32,
    num_bytes: u16,
}

impl WriteMem {
    #[must_use]
    pub fn new(address: u32, num_bytes: u16) -> Self {
        Self { address, num_bytes }
    }

    #[must_use]
    pub fn address(self) -> u32 {
        self.address
    }

    #[must_use]
    pub fn num_bytes(self) -> u16 {
        self.num_bytes
    }
}

impl<'a> ParseAckData<'a> for WriteMem {
    fn parse(mut raw_data: &'a [u8], header: &Header) -> Result<Self> {
        if header.ack_kind != AckKind::WriteMem {
            return Err(Error::InvalidPacket(
                format!("expected `WriteMem` ack, got {:?}", header.ack_kind).into(),
            ));
        }
        let address = raw_data.read_bytes_be()?;
        let _reserved: u16 = raw_data.read_bytes_be()?;
        let num_bytes = raw_data.read_bytes_be()?;
        Ok(Self { address, num_bytes })
    }
}

impl AckSerialize for WriteMem {
    fn kind(&self) -> AckKind {
        AckKind::WriteMem
    }

    fn length(&self) -> u16 {
        8
    }

    fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_be(self.address)?;
        buf.write_bytes_be(0_u16)?;
        buf.write_bytes_be(self.num_bytes)?;
        Ok(())
    }
}

/// Tells the host the device needs more time; the host must extend the
/// current attempt's deadline by [`Pending::waiting_time`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pending {
    waiting_time_ms: u16,
}

impl Pending {
    #[must_use]
    pub fn new(waiting_time: time::Duration) -> Self {
        Self {
            waiting_time_ms: waiting_time.as_millis() as u16,
        }
    }

    #[must_use]
    pub fn waiting_time(self) -> time::Duration {
        time::Duration::from_millis(u64::from(self.waiting_time_ms))
    }
}

impl<'a> ParseAckData<'a> for Pending {
    fn parse(raw_data: &'a [u8], header: &Header) -> Result<Self> {
        if header.ack_kind != AckKind::Pending {
            return Err(Error::InvalidPacket(
                format!("expected `Pending` ack, got {:?}", header.ack_kind).into(),
            ));
        }
        let waiting_time_ms = (&raw_data[2..4]).read_bytes_be()?;
        Ok(Self { waiting_time_ms })
    }
}

impl AckSerialize for Pending {
    fn kind(&self) -> AckKind {
        AckKind::Pending
    }

    fn length(&self) -> u16 {
        4
    }

    fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_be(0_u16)?;
        buf.write_bytes_be(self.waiting_time_ms)?;
        Ok(())
    }
}

/// Event record carried by an `Event` command from the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event {
    pub event_id: u16,
    pub stream_channel_index: u16,
    pub block_id: u64,
    pub timestamp: u64,
}

impl<'a> ParseAckData<'a> for Event {
    fn parse(mut raw_data: &'a [u8], header: &Header) -> Result<Self> {
        if header.ack_kind != AckKind::Event {
            return Err(Error::InvalidPacket(
                format!("expected `Event` ack, got {:?}", header.ack_kind).into(),
            ));
        }
        let _reserved: u16 = raw_data.read_bytes_be()?;
        let event_id = raw_data.read_bytes_be()?;
        let stream_channel_index = raw_data.read_bytes_be()?;
        let _reserved: u16 = raw_data.read_bytes_be()?;
        let block_id = raw_data.read_bytes_be()?;
        let timestamp = raw_data.read_bytes_be()?;
        Ok(Self {
            event_id,
            stream_channel_index,
            block_id,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gev::protocol::StatusKind;

    #[test]
    fn read_mem_round_trip() {
        let data = ReadMemData {
            address: 0x2000,
            data: vec![1, 2, 3, 4, 5, 6, 7, 8],
        };
        let buf = data.finalize(Status::SUCCESS, 0x42).unwrap();

        let ack = AckPacket::parse(&buf).unwrap();
        assert!(ack.status().is_success());
        assert_eq!(ack.request_id(), 0x42);
        assert!(ack.is_ack_for(CommandKind::ReadMem, 0x42));
        assert!(!ack.is_ack_for(CommandKind::ReadMem, 0x43));
        assert!(!ack.is_ack_for(CommandKind::WriteMem, 0x42));

        let parsed: ReadMem = ack.ack_data_as().unwrap();
        assert_eq!(parsed.address(), 0x2000);
        assert_eq!(parsed.data(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn pending_round_trip() {
        let pending = Pending::new(time::Duration::from_millis(350));
        let buf = pending.finalize(Status::SUCCESS, 7).unwrap();
        let ack = AckPacket::parse(&buf).unwrap();
        assert_eq!(ack.ack_kind(), AckKind::Pending);
        // A pending ack matches any outstanding command with the same id.
        assert!(ack.is_ack_for(CommandKind::WriteReg, 7));
        let parsed: Pending = ack.ack_data_as().unwrap();
        assert_eq!(parsed.waiting_time(), time::Duration::from_millis(350));
    }

    #[test]
    fn error_status_is_preserved() {
        let ack_buf = WriteReg::new(0)
            .finalize(StatusKind::WriteProtect.into(), 3)
            .unwrap();
        let ack = AckPacket::parse(&ack_buf).unwrap();
        assert!(!ack.status().is_success());
        assert_eq!(ack.status().kind(), StatusKind::WriteProtect);
    }

    #[test]
    fn discovery_round_trip() {
        let disc = Discovery {
            gev_version: Version::new(2, 0, 0),
            mac_addr: [0, 1, 2, 3, 4, 5],
            device_mode: DeviceMode::from_raw(0x8000_0000),
            nic_capability: NicCapability::from_raw(0x8000_0003),
            nic_configuration: NicConfiguration::from_raw(0x0000_0001),
            ip: Ipv4Addr::new(192, 168, 32, 5),
            subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
            default_gateway: Ipv4Addr::new(192, 168, 32, 1),
            manufacturer_name: "Lucida".into(),
            model_name: "Synth-GV01".into(),
            device_version: "1.4".into(),
            manufacturer_info: "synthetic test device".into(),
            serial_number: "SN0001".into(),
            user_defined_name: "bench".into(),
        };
        let buf = disc.finalize(Status::SUCCESS, 1).unwrap();
        assert_eq!(buf.len(), 8 + 248);

        let ack = AckPacket::parse(&buf).unwrap();
        let parsed: Discovery = ack.ack_data_as().unwrap();
        assert_eq!(parsed, disc);
    }

    #[test]
    fn truncated_packet_is_rejected() {
        let buf = WriteReg::new(1).finalize(Status::SUCCESS, 1).unwrap();
        assert!(AckPacket::parse(&buf[..buf.len() - 2]).is_err());
    }
}
