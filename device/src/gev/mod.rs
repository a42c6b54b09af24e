/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! GigE Vision wire protocols: GVCP (control) and GVSP (stream).

pub mod protocol;
pub mod register_map;

use std::borrow::Cow;

use thiserror::Error;

/// UDP port a device listens on for GVCP commands.
pub const GVCP_PORT: u16 = 3956;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("packet is broken: {0}")]
    InvalidPacket(Cow<'static, str>),

    #[error("invalid data: {0}")]
    InvalidData(Cow<'static, str>),
}
