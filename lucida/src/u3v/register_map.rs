/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Typed access to the USB3 Vision register blocks (ABRM, SBRM, SIRM)
//! through a [`DeviceControl`] handle.

use std::time;

use lucida_device::u3v::register_map::{abrm, sbrm, sirm};

use crate::{ControlError, ControlResult, DeviceControl};

/// The technology-agnostic bootstrap register map, anchored at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Abrm {
    _priv: (),
}

impl Abrm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manufacturer_name<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<String> {
        read_string(device, abrm::MANUFACTURER_NAME)
    }

    pub fn model_name<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<String> {
        read_string(device, abrm::MODEL_NAME)
    }

    pub fn serial_number<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<String> {
        read_string(device, abrm::SERIAL_NUMBER)
    }

    pub fn user_defined_name<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<String> {
        read_string(device, abrm::USER_DEFINED_NAME)
    }

    pub fn maximum_device_response_time<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<time::Duration> {
        let ms = read_u32(device, abrm::MAXIMUM_DEVICE_RESPONSE_TIME)?;
        Ok(time::Duration::from_millis(u64::from(ms)))
    }

    pub fn manifest_table_address<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<u64> {
        read_u64(device, abrm::MANIFEST_TABLE_ADDRESS)
    }

    pub fn sbrm<Ctrl: DeviceControl + ?Sized>(self, device: &mut Ctrl) -> ControlResult<Sbrm> {
        let address = read_u64(device, abrm::SBRM_ADDRESS)?;
        Ok(Sbrm { base: address })
    }
}

/// The USB3-specific register block located by `abrm::SBRM_ADDRESS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sbrm {
    base: u64,
}

impl Sbrm {
    pub fn maximum_command_transfer_length<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<u32> {
        read_u32(device, offset(self.base, sbrm::MAXIMUM_COMMAND_TRANSFER_LENGTH))
    }

    pub fn maximum_acknowledge_transfer_length<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<u32> {
        read_u32(
            device,
            offset(self.base, sbrm::MAXIMUM_ACKNOWLEDGE_TRANSFER_LENGTH),
        )
    }

    pub fn number_of_stream_channels<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<u32> {
        read_u32(device, offset(self.base, sbrm::NUMBER_OF_STREAM_CHANNELS))
    }

    pub fn sirm<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<Option<Sirm>> {
        if self.number_of_stream_channels(device)? == 0 {
            return Ok(None);
        }
        let address = read_u64(device, offset(self.base, sbrm::SIRM_ADDRESS))?;
        Ok(Some(Sirm { base: address }))
    }
}

/// The streaming register block located by `sbrm::SIRM_ADDRESS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sirm {
    base: u64,
}

impl Sirm {
    /// Writing 1 to `SI_CONTROL` enables stream transmission.
    pub fn enable_stream<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<()> {
        device.write_reg(offset(self.base, sirm::SI_CONTROL).0, 1)
    }

    pub fn disable_stream<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<()> {
        device.write_reg(offset(self.base, sirm::SI_CONTROL).0, 0)
    }

    pub fn maximum_leader_size<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<u32> {
        read_u32(device, offset(self.base, sirm::MAXIMUM_LEADER_SIZE))
    }

    pub fn maximum_trailer_size<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<u32> {
        read_u32(device, offset(self.base, sirm::MAXIMUM_TRAILER_SIZE))
    }

    pub fn payload_transfer_size<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<u32> {
        read_u32(device, offset(self.base, sirm::PAYLOAD_TRANSFER_SIZE))
    }

    pub fn payload_transfer_count<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<u32> {
        read_u32(device, offset(self.base, sirm::PAYLOAD_TRANSFER_COUNT))
    }

    pub fn payload_final_transfer1_size<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<u32> {
        read_u32(device, offset(self.base, sirm::PAYLOAD_FINAL_TRANSFER1_SIZE))
    }

    pub fn payload_final_transfer2_size<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<u32> {
        read_u32(device, offset(self.base, sirm::PAYLOAD_FINAL_TRANSFER2_SIZE))
    }

    pub fn required_payload_size<Ctrl: DeviceControl + ?Sized>(
        self,
        device: &mut Ctrl,
    ) -> ControlResult<u64> {
        read_u64(device, offset(self.base, sirm::REQUIRED_PAYLOAD_SIZE))
    }
}

fn offset(base: u64, reg: (u64, u16)) -> (u64, u16) {
    (base + reg.0, reg.1)
}

fn read_u32<Ctrl: DeviceControl + ?Sized>(
    device: &mut Ctrl,
    reg: (u64, u16),
) -> ControlResult<u32> {
    debug_assert_eq!(reg.1, 4);
    device.read_reg(reg.0)
}

fn read_u64<Ctrl: DeviceControl + ?Sized>(
    device: &mut Ctrl,
    reg: (u64, u16),
) -> ControlResult<u64> {
    debug_assert_eq!(reg.1, 8);
    let mut buf = [0; 8];
    device.read(reg.0, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_string<Ctrl: DeviceControl + ?Sized>(
    device: &mut Ctrl,
    reg: (u64, u16),
) -> ControlResult<String> {
    let mut buf = vec![0; reg.1 as usize];
    device.read(reg.0, &mut buf)?;
    let strlen = buf.iter().position(|c| *c == 0).unwrap_or(buf.len());
    buf.truncate(strlen);
    String::from_utf8(buf)
        .map_err(|e| ControlError::InvalidData(anyhow::Error::msg(e.to_string())))
}
