/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! USB3 Vision cameras.
//!
//! USB transport plumbing is an external collaborator: the control and
//! stream handles are written against the [`ControlPipe`] and
//! [`StreamPipe`] traits, and any bulk-endpoint implementation (libusb
//! or otherwise) plugs in behind them.

pub mod control_handle;
pub mod register_map;
pub mod stream_handle;

pub use control_handle::ControlHandle;
pub use stream_handle::{StreamHandle, StreamParams};

use std::time;

use lucida_device::u3v;

use crate::{ControlError, ControlResult, ProtocolErrorKind, StreamResult};

/// A bulk control endpoint pair: one outgoing command, one incoming
/// acknowledge.
pub trait ControlPipe: Send {
    fn send(&mut self, buf: &[u8], timeout: time::Duration) -> ControlResult<usize>;

    fn recv(&mut self, buf: &mut [u8], timeout: time::Duration) -> ControlResult<usize>;
}

/// The incoming bulk stream endpoint.
pub trait StreamPipe: Send {
    fn recv(&mut self, buf: &mut [u8], timeout: time::Duration) -> StreamResult<usize>;
}

impl From<u3v::Error> for ControlError {
    fn from(err: u3v::Error) -> Self {
        match err {
            u3v::Error::Io(err) => ControlError::Io(err.into()),
            u3v::Error::InvalidPacket(msg) => {
                ControlError::InvalidData(anyhow::Error::msg(msg.into_owned()))
            }
            u3v::Error::InvalidData(msg) => {
                ControlError::InvalidData(anyhow::Error::msg(msg.into_owned()))
            }
        }
    }
}

impl From<u3v::protocol::StatusKind> for ProtocolErrorKind {
    fn from(kind: u3v::protocol::StatusKind) -> Self {
        use u3v::protocol::StatusKind;
        match kind {
            StatusKind::NotImplemented => Self::NotImplemented,
            StatusKind::InvalidParameter => Self::InvalidParameter,
            StatusKind::InvalidAddress => Self::InvalidAddress,
            StatusKind::WriteProtect => Self::WriteProtect,
            StatusKind::BadAlignment => Self::BadAlignment,
            StatusKind::AccessDenied => Self::AccessDenied,
            StatusKind::Busy => Self::Busy,
            _ => Self::Unknown,
        }
    }
}
