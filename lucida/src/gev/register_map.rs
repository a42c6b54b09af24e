/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Typed access to the GigE Vision bootstrap registers through a
//! [`DeviceControl`] handle.

pub use lucida_device::gev::register_map::{
    ControlChannelPrivilege, DeviceMode, GvcpCapability, NicCapability, NicConfiguration,
    PacketSize,
};

use std::{net::Ipv4Addr, time};

use lucida_device::gev::register_map::{bootstrap, stream};
use semver::Version;

use crate::{ControlError, ControlResult, DeviceControl};

/// The bootstrap register block of a `GigE` device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bootstrap {
    _priv: (),
}

impl Bootstrap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<Version> {
        let version = read_reg(device, bootstrap::VERSION)?;
        Ok(Version::new(
            u64::from(version >> 16),
            u64::from(version & 0xffff),
            0,
        ))
    }

    pub fn device_mode<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<DeviceMode> {
        Ok(DeviceMode::from_raw(read_reg(
            device,
            bootstrap::DEVICE_MODE,
        )?))
    }

    pub fn gvcp_capability<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<GvcpCapability> {
        Ok(GvcpCapability::from_raw(read_reg(
            device,
            bootstrap::GVCP_CAPABILITY,
        )?))
    }

    pub fn control_channel_privilege<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<ControlChannelPrivilege> {
        Ok(ControlChannelPrivilege::from_raw(read_reg(
            device,
            bootstrap::CONTROL_CHANNEL_PRIVILEGE,
        )?))
    }

    pub fn set_control_channel_privilege<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
        ccp: ControlChannelPrivilege,
    ) -> ControlResult<()> {
        write_reg(device, bootstrap::CONTROL_CHANNEL_PRIVILEGE, ccp.raw())
    }

    pub fn heartbeat_timeout<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<time::Duration> {
        let timeout_ms = read_reg(device, bootstrap::HEARTBEAT_TIMEOUT)?;
        Ok(time::Duration::from_millis(u64::from(timeout_ms)))
    }

    pub fn set_heartbeat_timeout<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
        timeout: time::Duration,
    ) -> ControlResult<()> {
        write_reg(
            device,
            bootstrap::HEARTBEAT_TIMEOUT,
            timeout.as_millis() as u32,
        )
    }

    pub fn pending_timeout<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<time::Duration> {
        let timeout_ms = read_reg(device, bootstrap::PENDING_TIMEOUT)?;
        Ok(time::Duration::from_millis(u64::from(timeout_ms)))
    }

    pub fn number_of_stream_channels<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<u32> {
        read_reg(device, bootstrap::NUMBER_OF_STREAM_CHANNELS)
    }

    pub fn timestamp_tick_frequency<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<u64> {
        let high = read_reg(device, bootstrap::TIMESTAMP_TICK_FREQUENCY_HIGH)?;
        let low = read_reg(device, bootstrap::TIMESTAMP_TICK_FREQUENCY_LOW)?;
        Ok(u64::from(high) << 32 | u64::from(low))
    }

    pub fn manufacturer_name<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<String> {
        read_string(device, bootstrap::MANUFACTURER_NAME)
    }

    pub fn model_name<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<String> {
        read_string(device, bootstrap::MODEL_NAME)
    }

    pub fn serial_number<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<String> {
        read_string(device, bootstrap::SERIAL_NUMBER)
    }

    pub fn user_defined_name<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<String> {
        read_string(device, bootstrap::USER_DEFINED_NAME)
    }

    pub fn first_url<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<String> {
        read_string(device, bootstrap::FIRST_URL)
    }

    pub fn second_url<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<String> {
        read_string(device, bootstrap::SECOND_URL)
    }
}

/// One stream channel register block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRegister {
    base: u32,
}

impl StreamRegister {
    #[must_use]
    pub fn new(channel_index: u32) -> Self {
        Self {
            base: stream::base_address(channel_index),
        }
    }

    pub fn channel_port<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<u16> {
        let word = self.read(device, stream::STREAM_CHANNEL_PORT)?;
        Ok(word as u16)
    }

    /// Writing the host port starts transmission; writing 0 stops it.
    pub fn set_channel_port<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
        host_port: u16,
    ) -> ControlResult<()> {
        self.write(device, stream::STREAM_CHANNEL_PORT, u32::from(host_port))
    }

    pub fn packet_size<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<PacketSize> {
        Ok(PacketSize::from_raw(
            self.read(device, stream::STREAM_CHANNEL_PACKET_SIZE)?,
        ))
    }

    pub fn set_packet_size<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
        packet_size: PacketSize,
    ) -> ControlResult<()> {
        self.write(
            device,
            stream::STREAM_CHANNEL_PACKET_SIZE,
            packet_size.raw(),
        )
    }

    pub fn packet_delay<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<u32> {
        self.read(device, stream::STREAM_CHANNEL_PACKET_DELAY)
    }

    pub fn set_destination_address<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
        addr: Ipv4Addr,
    ) -> ControlResult<()> {
        self.write(
            device,
            stream::STREAM_CHANNEL_DESTINATION_ADDRESS,
            u32::from(addr),
        )
    }

    fn read<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
        reg: (u32, u16),
    ) -> ControlResult<u32> {
        read_reg(device, (self.base + reg.0, reg.1))
    }

    fn write<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
        reg: (u32, u16),
        value: u32,
    ) -> ControlResult<()> {
        write_reg(device, (self.base + reg.0, reg.1), value)
    }
}

fn read_reg<Ctrl: DeviceControl + ?Sized>(
    device: &mut Ctrl,
    reg: (u32, u16),
) -> ControlResult<u32> {
    debug_assert_eq!(reg.1, 4);
    device.read_reg(u64::from(reg.0))
}

fn write_reg<Ctrl: DeviceControl + ?Sized>(
    device: &mut Ctrl,
    reg: (u32, u16),
    value: u32,
) -> ControlResult<()> {
    debug_assert_eq!(reg.1, 4);
    device.write_reg(u64::from(reg.0), value)
}

fn read_string<Ctrl: DeviceControl + ?Sized>(
    device: &mut Ctrl,
    reg: (u32, u16),
) -> ControlResult<String> {
    let mut buf = vec![0; reg.1 as usize];
    device.read(u64::from(reg.0), &mut buf)?;
    let strlen = buf.iter().position(|c| *c == 0).unwrap_or(buf.len());
    String::from_utf8(buf[..strlen].to_vec())
        .map_err(|e| ControlError::InvalidData(anyhow::Error::msg(e.to_string())))
}
