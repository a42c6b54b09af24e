/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! GigE Vision bootstrap register map.
//!
//! The bootstrap registers live in a standardized 64 KiB window of the
//! device address space, reachable before any genicam document is loaded.

use lucida_impl::bit_field::BitField;

/// (Address, Length) of registers of the Bootstrap Register Map.
pub mod bootstrap {
    pub const VERSION: (u32, u16) = (0x0000, 4);
    pub const DEVICE_MODE: (u32, u16) = (0x0004, 4);
    pub const DEVICE_MAC_ADDRESS_HIGH: (u32, u16) = (0x0008, 4);
    pub const DEVICE_MAC_ADDRESS_LOW: (u32, u16) = (0x000C, 4);
    pub const NETWORK_INTERFACE_CAPABILITY: (u32, u16) = (0x0010, 4);
    pub const NETWORK_INTERFACE_CONFIGURATION: (u32, u16) = (0x0014, 4);
    pub const CURRENT_IP_ADDRESS: (u32, u16) = (0x0024, 4);
    pub const CURRENT_SUBNET_MASK: (u32, u16) = (0x0034, 4);
    pub const CURRENT_DEFAULT_GATEWAY: (u32, u16) = (0x0044, 4);
    pub const MANUFACTURER_NAME: (u32, u16) = (0x0048, 32);
    pub const MODEL_NAME: (u32, u16) = (0x0068, 32);
    pub const DEVICE_VERSION: (u32, u16) = (0x0088, 32);
    pub const MANUFACTURER_INFO: (u32, u16) = (0x00A8, 48);
    pub const SERIAL_NUMBER: (u32, u16) = (0x00D8, 16);
    pub const USER_DEFINED_NAME: (u32, u16) = (0x00E8, 16);
    pub const FIRST_URL: (u32, u16) = (0x0200, 512);
    pub const SECOND_URL: (u32, u16) = (0x0400, 512);
    pub const NUMBER_OF_NETWORK_INTERFACES: (u32, u16) = (0x0600, 4);
    pub const PERSISTENT_IP_ADDRESS: (u32, u16) = (0x064C, 4);
    pub const PERSISTENT_SUBNET_MASK: (u32, u16) = (0x065C, 4);
    pub const PERSISTENT_DEFAULT_GATEWAY: (u32, u16) = (0x066C, 4);
    pub const NUMBER_OF_MESSAGE_CHANNELS: (u32, u16) = (0x0900, 4);
    pub const NUMBER_OF_STREAM_CHANNELS: (u32, u16) = (0x0904, 4);
    pub const NUMBER_OF_ACTION_SIGNALS: (u32, u16) = (0x0908, 4);
    pub const GVCP_CAPABILITY: (u32, u16) = (0x0934, 4);
    pub const HEARTBEAT_TIMEOUT: (u32, u16) = (0x0938, 4);
    pub const TIMESTAMP_TICK_FREQUENCY_HIGH: (u32, u16) = (0x093C, 4);
    pub const TIMESTAMP_TICK_FREQUENCY_LOW: (u32, u16) = (0x0940, 4);
    pub const PENDING_TIMEOUT: (u32, u16) = (0x0958, 4);
    pub const CONTROL_CHANNEL_PRIVILEGE: (u32, u16) = (0x0A00, 4);
    pub const MESSAGE_CHANNEL_PORT: (u32, u16) = (0x0B00, 4);
    pub const MESSAGE_CHANNEL_DESTINATION: (u32, u16) = (0x0B10, 4);
    pub const MESSAGE_CHANNEL_TRANSMISSION_TIMEOUT: (u32, u16) = (0x0B14, 4);
    pub const MESSAGE_CHANNEL_RETRY_COUNT: (u32, u16) = (0x0B18, 4);
    pub const MESSAGE_CHANNEL_SOURCE_PORT: (u32, u16) = (0x0B1C, 4);
    pub const MANIFEST_TABLE: (u32, u16) = (0x9000, 512);
}

/// (Offset, Length) of registers of a stream channel register block.
pub mod stream {
    pub const STREAM_CHANNEL_PORT: (u32, u16) = (0x0000, 4);
    pub const STREAM_CHANNEL_PACKET_SIZE: (u32, u16) = (0x0004, 4);
    pub const STREAM_CHANNEL_PACKET_DELAY: (u32, u16) = (0x0008, 4);
    pub const STREAM_CHANNEL_DESTINATION_ADDRESS: (u32, u16) = (0x0018, 4);
    pub const STREAM_CHANNEL_SOURCE_PORT: (u32, u16) = (0x001C, 4);
    pub const STREAM_CHANNEL_CAPABILITY: (u32, u16) = (0x0020, 4);
    pub const STREAM_CHANNEL_CONFIGURATION: (u32, u16) = (0x0024, 4);

    #[must_use]
    pub fn base_address(channel_index: u32) -> u32 {
        0x0D00 + 0x0040 * channel_index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceMode(u32);

impl DeviceMode {
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn is_big_endian(self) -> bool {
        self.0.is_set(0)
    }

    /// Character set of the identification strings: 1 = UTF-8.
    #[must_use]
    pub fn character_set(self) -> u32 {
        self.0 & 0xff
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NicCapability(u32);

impl NicCapability {
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn is_persistent_ip_supported(self) -> bool {
        self.0.is_set(0)
    }

    #[must_use]
    pub fn is_dhcp_supported(self) -> bool {
        self.0.is_set(1)
    }

    #[must_use]
    pub fn is_lla_supported(self) -> bool {
        self.0.is_set(2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NicConfiguration(u32);

impl NicConfiguration {
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn is_persistent_ip_enabled(self) -> bool {
        self.0.is_set(0)
    }

    #[must_use]
    pub fn is_dhcp_enabled(self) -> bool {
        self.0.is_set(1)
    }

    #[must_use]
    pub fn is_lla_enabled(self) -> bool {
        self.0.is_set(2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GvcpCapability(u32);

impl GvcpCapability {
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn is_manifest_table_supported(self) -> bool {
        self.0.is_set(11)
    }

    #[must_use]
    pub fn is_packet_resend_supported(self) -> bool {
        self.0.is_set(21)
    }

    #[must_use]
    pub fn is_write_mem_supported(self) -> bool {
        self.0.is_set(30)
    }

    #[must_use]
    pub fn is_pending_ack_supported(self) -> bool {
        self.0.is_set(15)
    }
}

/// The CCP register word. Writing `0x2` claims control of the device,
/// clearing it releases; bit 0 additionally locks out monitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlChannelPrivilege(u32);

impl ControlChannelPrivilege {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn enable_control_access(self) -> Self {
        Self(self.0 | 0b10)
    }

    #[must_use]
    pub fn enable_exclusive_access(self) -> Self {
        Self(self.0 | 0b11)
    }

    #[must_use]
    pub fn is_control_access_enabled(self) -> bool {
        self.0 & 0b10 != 0
    }

    #[must_use]
    pub fn is_exclusive_access_enabled(self) -> bool {
        self.0 & 0b01 != 0
    }
}

/// The `GevSCPSPacketSize` word: stream packet size plus the fire-test
/// and do-not-fragment control bits used during size negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketSize(u32);

impl PacketSize {
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn size(self) -> u16 {
        self.0 as u16
    }

    #[must_use]
    pub fn with_size(self, size: u16) -> Self {
        Self((self.0 & 0xffff_0000) | u32::from(size))
    }

    /// Asks the device to emit one test packet of the configured size.
    #[must_use]
    pub fn fire_test_packet(self) -> Self {
        Self(self.0.set_bit(0))
    }

    #[must_use]
    pub fn do_not_fragment(self) -> Self {
        Self(self.0.set_bit(1))
    }

    #[must_use]
    pub fn is_fire_test_packet(self) -> bool {
        self.0.is_set(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ccp_bits() {
        let ccp = ControlChannelPrivilege::new().enable_control_access();
        assert_eq!(ccp.raw(), 0x2);
        assert!(ccp.is_control_access_enabled());
        assert!(!ccp.is_exclusive_access_enabled());

        let ccp = ControlChannelPrivilege::new().enable_exclusive_access();
        assert!(ccp.is_exclusive_access_enabled());
    }

    #[test]
    fn packet_size_word() {
        let word = PacketSize::from_raw(0).with_size(1500).fire_test_packet();
        assert_eq!(word.size(), 1500);
        assert!(word.is_fire_test_packet());
        assert_eq!(word.raw() & 0x8000_0000, 0x8000_0000);
    }

    #[test]
    fn stream_channel_base_addresses() {
        assert_eq!(stream::base_address(0), 0x0D00);
        assert_eq!(stream::base_address(2), 0x0D80);
    }
}
