/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! USB3 Vision register maps.
//!
//! ABRM (the technology-agnostic bootstrap map) is anchored at address 0;
//! its `SBRM_ADDRESS` entry points at the USB3-specific block, which in
//! turn locates the streaming (SIRM) block.

/// (Offset, Length) of registers of the ABRM block.
pub mod abrm {
    pub const GENCP_VERSION: (u64, u16) = (0x0000, 4);
    pub const MANUFACTURER_NAME: (u64, u16) = (0x0004, 64);
    pub const MODEL_NAME: (u64, u16) = (0x0044, 64);
    pub const FAMILY_NAME: (u64, u16) = (0x0084, 64);
    pub const DEVICE_VERSION: (u64, u16) = (0x00C4, 64);
    pub const MANUFACTURER_INFO: (u64, u16) = (0x0104, 64);
    pub const SERIAL_NUMBER: (u64, u16) = (0x0144, 64);
    pub const USER_DEFINED_NAME: (u64, u16) = (0x0184, 64);
    pub const DEVICE_CAPABILITY: (u64, u16) = (0x01C4, 8);
    pub const MAXIMUM_DEVICE_RESPONSE_TIME: (u64, u16) = (0x01CC, 4);
    pub const MANIFEST_TABLE_ADDRESS: (u64, u16) = (0x01D0, 8);
    pub const SBRM_ADDRESS: (u64, u16) = (0x01D8, 8);
    pub const DEVICE_CONFIGURATION: (u64, u16) = (0x01E0, 8);
    pub const HEARTBEAT_TIMEOUT: (u64, u16) = (0x01E8, 4);
    pub const MESSAGE_CHANNEL_ID: (u64, u16) = (0x01EC, 4);
    pub const TIMESTAMP: (u64, u16) = (0x01F0, 8);
    pub const TIMESTAMP_LATCH: (u64, u16) = (0x01F8, 4);
    pub const TIMESTAMP_INCREMENT: (u64, u16) = (0x01FC, 8);
    pub const ACCESS_PRIVILEGE: (u64, u16) = (0x0204, 4);
    pub const PROTOCOL_ENDIANNESS: (u64, u16) = (0x0208, 4);
}

/// (Offset, Length) of registers of the SBRM block, relative to
/// `abrm::SBRM_ADDRESS`.
pub mod sbrm {
    pub const U3V_VERSION: (u64, u16) = (0x0000, 4);
    pub const MAXIMUM_COMMAND_TRANSFER_LENGTH: (u64, u16) = (0x0004, 4);
    pub const MAXIMUM_ACKNOWLEDGE_TRANSFER_LENGTH: (u64, u16) = (0x0008, 4);
    pub const NUMBER_OF_STREAM_CHANNELS: (u64, u16) = (0x000C, 4);
    pub const SIRM_ADDRESS: (u64, u16) = (0x0010, 8);
    pub const SIRM_LENGTH: (u64, u16) = (0x0018, 4);
    pub const EIRM_ADDRESS: (u64, u16) = (0x001C, 8);
    pub const EIRM_LENGTH: (u64, u16) = (0x0024, 4);
    pub const CURRENT_SPEED: (u64, u16) = (0x002C, 4);
}

/// (Offset, Length) of registers of the SIRM block, relative to
/// `sbrm::SIRM_ADDRESS`.
pub mod sirm {
    pub const SI_INFO: (u64, u16) = (0x0000, 4);
    pub const SI_CONTROL: (u64, u16) = (0x0004, 4);
    pub const MAXIMUM_LEADER_SIZE: (u64, u16) = (0x0008, 4);
    pub const MAXIMUM_TRAILER_SIZE: (u64, u16) = (0x000C, 4);
    pub const PAYLOAD_TRANSFER_SIZE: (u64, u16) = (0x0010, 4);
    pub const PAYLOAD_TRANSFER_COUNT: (u64, u16) = (0x0014, 4);
    pub const PAYLOAD_FINAL_TRANSFER1_SIZE: (u64, u16) = (0x0018, 4);
    pub const PAYLOAD_FINAL_TRANSFER2_SIZE: (u64, u16) = (0x001C, 4);
    pub const REQUIRED_PAYLOAD_SIZE: (u64, u16) = (0x0020, 8);
}
