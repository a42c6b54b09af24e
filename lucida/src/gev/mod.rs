/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! GigE Vision cameras: discovery, the GVCP control handle and the GVSP
//! stream handle.

pub mod control_handle;
pub mod register_map;
pub mod stream_handle;

pub use control_handle::{ControlHandle, DeviceInfo, OpenMode};
pub use stream_handle::{PacketSizeAdjustment, StreamHandle, StreamOptions, StreamParams};

use std::time;

use async_std::{future, net::UdpSocket, task};
use tracing::{debug, warn};

use lucida_device::{
    gev::{
        self,
        protocol::{ack, cmd, cmd::CommandData},
    },
    net,
};

use crate::{
    camera::{Camera, CameraInfo},
    genapi::DefaultGenApiCtxt,
    ControlError, ControlResult, LucidaResult, ProtocolErrorKind,
};

impl From<gev::Error> for ControlError {
    fn from(err: gev::Error) -> Self {
        match err {
            gev::Error::Io(err) => ControlError::Io(err.into()),
            gev::Error::InvalidPacket(msg) => {
                ControlError::InvalidData(anyhow::Error::msg(msg.into_owned()))
            }
            gev::Error::InvalidData(msg) => {
                ControlError::InvalidData(anyhow::Error::msg(msg.into_owned()))
            }
        }
    }
}

impl From<gev::protocol::StatusKind> for ProtocolErrorKind {
    fn from(kind: gev::protocol::StatusKind) -> Self {
        use gev::protocol::StatusKind;
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

/// How long discovery listens for acknowledges on each interface.
const DISCOVERY_TIMEOUT: time::Duration = time::Duration::from_millis(500);

/// Broadcasts a `Discovery` command on every eligible IPv4 interface and
/// collects the answering devices.
pub fn enumerate_devices() -> ControlResult<Vec<DeviceInfo>> {
    task::block_on(enumerate_devices_impl())
}

async fn enumerate_devices_impl() -> ControlResult<Vec<DeviceInfo>> {
    let mut infos: Vec<DeviceInfo> = Vec::new();

    for iface in net::enumerate_interfaces().map_err(|e| ControlError::Io(e.into()))? {
        debug!(iface = %iface.name, "discovery on interface");
        match discover_on(&iface).await {
            Ok(found) => {
                for info in found {
                    if !infos.iter().any(|known| known.mac_addr == info.mac_addr) {
                        infos.push(info);
                    }
                }
            }
            Err(err) => warn!(iface = %iface.name, %err, "discovery failed on interface"),
        }
    }

    Ok(infos)
}

async fn discover_on(iface: &net::NetworkInterface) -> ControlResult<Vec<DeviceInfo>> {
    let sock = UdpSocket::bind((iface.addr, 0))
        .await
        .map_err(|e| ControlError::Io(e.into()))?;
    sock.set_broadcast(true)
        .map_err(|e| ControlError::Io(e.into()))?;

    let mut discovery = cmd::Discovery::new();
    discovery.set_allow_broadcast_ack(true);
    let packet = discovery.finalize(1);
    let mut buf = Vec::with_capacity(packet.length());
    packet.serialize(&mut buf)?;
    sock.send_to(&buf, (iface.broadcast(), gev::GVCP_PORT))
        .await
        .map_err(|e| ControlError::Io(e.into()))?;

    let mut found = Vec::new();
    let deadline = time::Instant::now() + DISCOVERY_TIMEOUT;
    let mut recv_buf = vec![0; 1024];
    loop {
        let remaining = match deadline.checked_duration_since(time::Instant::now()) {
            Some(remaining) => remaining,
            None => break,
        };
        let (len, peer) = match future::timeout(remaining, sock.recv_from(&mut recv_buf)).await {
            Ok(Ok(res)) => res,
            Ok(Err(e)) => return Err(ControlError::Io(e.into())),
            Err(_) => break,
        };

        match ack::AckPacket::parse(&recv_buf[..len])
            .and_then(|ack| ack.ack_data_as::<ack::Discovery>())
        {
            Ok(info) => {
                debug!(%peer, model = %info.model_name, "device discovered");
                found.push(info);
            }
            Err(err) => debug!(%peer, %err, "ignoring malformed discovery ack"),
        }
    }

    Ok(found)
}

/// Enumerates GigE Vision cameras ready to be opened.
pub fn enumerate_cameras(
) -> LucidaResult<Vec<Camera<ControlHandle, StreamHandle, DefaultGenApiCtxt>>> {
    let mut cameras = Vec::new();
    for info in enumerate_devices()? {
        let camera_info = CameraInfo {
            vendor_name: info.manufacturer_name.clone(),
            model_name: info.model_name.clone(),
            serial_number: info.serial_number.clone(),
        };
        let device_ip = info.ip;
        let mut strm = StreamHandle::new()?;
        let mut ctrl = ControlHandle::new(info)?;
        ctrl.set_stream_host_port(strm.local_port());
        strm.set_device_addr((device_ip, gev::GVCP_PORT).into());
        cameras.push(Camera::new(ctrl, strm, None, camera_info));
    }
    Ok(cameras)
}
