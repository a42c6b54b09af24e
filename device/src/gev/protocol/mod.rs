/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! GVCP/GVSP packet codecs.
//!
//! Encoders always produce freshly owned byte sequences; decoders borrow
//! the caller's datagram and fail with `Error::InvalidPacket` on any
//! length, magic or cross-field inconsistency.

pub mod ack;
pub mod cmd;
pub mod stream;

use std::io;

use lucida_impl::byte_io::{ReadBytes, WriteBytes};

use super::{Error, Result};

/// GigE Vision status word, shared by GVCP acknowledges and GVSP packet
/// headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Status {
    code: u16,
    kind: StatusKind,
}

impl Status {
    pub const SUCCESS: Status = Status {
        code: 0x0000,
        kind: StatusKind::Success,
    };

    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self.kind, StatusKind::Success | StatusKind::PacketResend)
    }

    #[must_use]
    pub fn code(self) -> u16 {
        self.code
    }

    #[must_use]
    pub fn kind(self) -> StatusKind {
        self.kind
    }

    pub fn from_code(code: u16) -> Result<Self> {
        let kind = match code {
            0x0000 => StatusKind::Success,
            0x0100 => StatusKind::PacketResend,
            0x8001 => StatusKind::NotImplemented,
            0x8002 => StatusKind::InvalidParameter,
            0x8003 => StatusKind::InvalidAddress,
            0x8004 => StatusKind::WriteProtect,
            0x8005 => StatusKind::BadAlignment,
            0x8006 => StatusKind::AccessDenied,
            0x8007 => StatusKind::Busy,
            0x800b => StatusKind::NoMessage,
            0x800c => StatusKind::PacketUnavailable,
            0x800d => StatusKind::DataOverrun,
            0x800e => StatusKind::InvalidHeader,
            0x8011 => StatusKind::PacketRemovedFromMemory,
            0x8015 => StatusKind::Overflow,
            0x8fff => StatusKind::GenericError,
            _ => {
                return Err(Error::InvalidPacket(
                    format!("invalid gev status code {:#06x}", code).into(),
                ));
            }
        };
        Ok(Self { code, kind })
    }

    pub(super) fn parse(cursor: &mut io::Cursor<&[u8]>) -> Result<Self> {
        Self::from_code(cursor.read_bytes_be()?)
    }

    pub(super) fn serialize(self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_be(self.code)?;
        Ok(())
    }
}

impl From<StatusKind> for Status {
    fn from(kind: StatusKind) -> Self {
        let code = match kind {
            StatusKind::Success => 0x0000,
            StatusKind::PacketResend => 0x0100,
            StatusKind::NotImplemented => 0x8001,
            StatusKind::InvalidParameter => 0x8002,
            StatusKind::InvalidAddress => 0x8003,
            StatusKind::WriteProtect => 0x8004,
            StatusKind::BadAlignment => 0x8005,
            StatusKind::AccessDenied => 0x8006,
            StatusKind::Busy => 0x8007,
            StatusKind::NoMessage => 0x800b,
            StatusKind::PacketUnavailable => 0x800c,
            StatusKind::DataOverrun => 0x800d,
            StatusKind::InvalidHeader => 0x800e,
            StatusKind::PacketRemovedFromMemory => 0x8011,
            StatusKind::Overflow => 0x8015,
            StatusKind::GenericError => 0x8fff,
        };
        Self { code, kind }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusKind {
    Success,
    PacketResend,
    NotImplemented,
    InvalidParameter,
    InvalidAddress,
    WriteProtect,
    BadAlignment,
    AccessDenied,
    Busy,
    NoMessage,
    PacketUnavailable,
    DataOverrun,
    InvalidHeader,
    PacketRemovedFromMemory,
    Overflow,
    GenericError,
}
