/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation
)]

//! `lucida` is a vendor-neutral client library for industrial machine
//! vision cameras speaking the GenICam family of standards: device
//! discovery, a control channel, an interpreted feature tree and
//! continuous image-buffer streaming over GigE Vision or USB3 Vision.

pub mod camera;
pub mod chunk_parser;
pub mod genapi;
pub mod gev;
pub mod payload;
pub mod system;
pub mod u3v;

mod utils;

pub use camera::{Camera, CameraInfo, DeviceControl, PayloadStream};
pub use lucida_device::PixelFormat;
pub use lucida_genapi::{AccessCheckPolicy, RangeCheckPolicy, RegisterCachePolicy};
pub use payload::{Buffer, BufferPayloadType, BufferStatus, StreamEvent, StreamStatistics};

use std::borrow::Cow;

/// The error type for control-channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// The device is controlled by another application.
    #[error("device is busy")]
    Busy,

    /// The device stopped answering; only destruction is legal.
    #[error("device is disconnected")]
    Disconnected,

    /// The handle is not opened yet.
    #[error("device is not opened")]
    NotOpened,

    /// The handle holds no control privilege over the device.
    #[error("the handle doesn't control the device")]
    NotController,

    /// The transaction ran out of retries.
    #[error("operation timed out")]
    Timeout,

    /// The device answered with a protocol-level error status.
    #[error("device protocol error: {0:?}")]
    Protocol(ProtocolErrorKind),

    /// The device advertises no genicam document.
    #[error("genicam file not found on the device")]
    GenICamNotFound,

    /// The device exposes no stream channel.
    #[error("device has no stream channel")]
    NoStreamChannel,

    /// Data passed to or received from the device is malformed.
    #[error("invalid data: {0}")]
    InvalidData(anyhow::Error),

    /// The device lacks a capability the operation needs.
    #[error("operation not supported: {0}")]
    NotSupported(Cow<'static, str>),

    /// Transport-level failure.
    #[error("input/output error: {0}")]
    Io(anyhow::Error),
}

/// Protocol error statuses a device can answer with, shared by GVCP and
/// UVCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    NotImplemented,
    InvalidParameter,
    InvalidAddress,
    WriteProtect,
    BadAlignment,
    AccessDenied,
    Busy,
    Unknown,
}

pub type ControlResult<T> = std::result::Result<T, ControlError>;

/// The error type for streaming operations.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("the stream is already receiving")]
    InStreaming,

    #[error("stream transport is disconnected")]
    Disconnected,

    #[error("buffer is too small to receive the payload")]
    BufferTooSmall,

    #[error("invalid payload: {0}")]
    InvalidPayload(Cow<'static, str>),

    /// The buffer queue is empty or the peer side is gone.
    #[error("buffer queue error: {0}")]
    QueueError(Cow<'static, str>),

    #[error("operation timed out")]
    Timeout,

    #[error("a lock of the stream is poisoned: {0}")]
    Poisoned(Cow<'static, str>),

    #[error("input/output error: {0}")]
    Io(anyhow::Error),
}

pub type StreamResult<T> = std::result::Result<T, StreamError>;

/// The top level error type.
#[derive(Debug, thiserror::Error)]
pub enum LucidaError {
    #[error("control error: {0}")]
    ControlError(#[from] ControlError),

    #[error("stream error: {0}")]
    StreamError(#[from] StreamError),

    #[error("genapi error: {0}")]
    GenApi(#[from] lucida_genapi::GenApiError),

    /// The genicam document is broken or lacks a mandatory node.
    #[error("invalid genapi xml: {0}")]
    InvalidGenApiXml(Cow<'static, str>),

    /// An operation required the genapi context but none is loaded.
    #[error("no genapi context is loaded")]
    GenApiContextMissing,

    /// Name lookup in the feature tree failed.
    #[error("feature not found: {0}")]
    FeatureNotFound(Cow<'static, str>),

    /// The feature exists but has the wrong interface for the operation.
    #[error("wrong feature type: {0}")]
    WrongFeature(Cow<'static, str>),

    #[error("device not found: {0}")]
    DeviceNotFound(Cow<'static, str>),
}

pub type LucidaResult<T> = std::result::Result<T, LucidaError>;

/// File kind of a `GenICam` XML file on the device's memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenICamFileType {
    /// The device XML containing all device features.
    DeviceXml,
    /// Optional XML containing only chunk-data related nodes.
    BufferXml,
}

/// Compression of a `GenICam` XML file on the device's memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    Uncompressed,
    /// ZIP archive containing a single `GenICam` XML file.
    Zip,
}

impl From<lucida_genapi::GenApiError> for ControlError {
    fn from(err: lucida_genapi::GenApiError) -> Self {
        ControlError::InvalidData(anyhow::Error::msg(err.to_string()))
    }
}
