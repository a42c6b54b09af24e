/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! USB3 Vision wire protocols: UVCP (control) and UVSP (stream).

pub mod protocol;
pub mod register_map;

use std::borrow::Cow;

use thiserror::Error;

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
