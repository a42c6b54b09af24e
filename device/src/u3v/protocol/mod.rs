/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! UVCP/UVSP packet codecs.
//!
//! All USB3 Vision wire structures are little-endian and open with a
//! 32-bit ASCII magic: `V3U1` for control packets, `L3UV`/`T3UV` for
//! stream leaders and trailers.

pub mod ack;
pub mod cmd;
pub mod stream;

use crate::u3v::{Error, Result};

/// GenCP status word carried by UVCP acknowledges.
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
        self.kind == StatusKind::Success
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
            0x8001 => StatusKind::NotImplemented,
            0x8002 => StatusKind::InvalidParameter,
            0x8003 => StatusKind::InvalidAddress,
            0x8004 => StatusKind::WriteProtect,
            0x8005 => StatusKind::BadAlignment,
            0x8006 => StatusKind::AccessDenied,
            0x8007 => StatusKind::Busy,
            0x800b => StatusKind::Timeout,
            0x800f => StatusKind::InvalidHeader,
            0x8fff => StatusKind::GenericError,
            _ => {
                return Err(Error::InvalidPacket(
                    format!("invalid GenCP status code {:#06x}", code).into(),
                ))
            }
        };
        Ok(Self { code, kind })
    }
}

impl From<StatusKind> for Status {
    fn from(kind: StatusKind) -> Self {
        let code = match kind {
            StatusKind::Success => 0x0000,
            StatusKind::NotImplemented => 0x8001,
            StatusKind::InvalidParameter => 0x8002,
            StatusKind::InvalidAddress => 0x8003,
            StatusKind::WriteProtect => 0x8004,
            StatusKind::BadAlignment => 0x8005,
            StatusKind::AccessDenied => 0x8006,
            StatusKind::Busy => 0x8007,
            StatusKind::Timeout => 0x800b,
            StatusKind::InvalidHeader => 0x800f,
            StatusKind::GenericError => 0x8fff,
        };
        Self { code, kind }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusKind {
    Success,
    NotImplemented,
    InvalidParameter,
    InvalidAddress,
    WriteProtect,
    BadAlignment,
    AccessDenied,
    Busy,
    Timeout,
    InvalidHeader,
    GenericError,
}
