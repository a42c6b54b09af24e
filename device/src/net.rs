/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Network interface enumeration for device discovery.
//!
//! GigE Vision discovery is a per-interface broadcast: a `Discovery`
//! command is sent to the broadcast address of every eligible IPv4
//! interface and the replies are collected on the sending socket.

use std::net::Ipv4Addr;

use tracing::debug;

/// An IPv4 interface eligible for discovery broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    /// Interface name as reported by the OS.
    pub name: String,
    /// Local address of the interface.
    pub addr: Ipv4Addr,
    /// Network mask of the interface.
    pub netmask: Ipv4Addr,
}

impl NetworkInterface {
    /// Directed broadcast address of the interface's subnet.
    #[must_use]
    pub fn broadcast(&self) -> Ipv4Addr {
        let addr = u32::from(self.addr);
        let mask = u32::from(self.netmask);
        Ipv4Addr::from(addr | !mask)
    }

    /// Returns `true` if `peer` belongs to this interface's subnet.
    #[must_use]
    pub fn contains(&self, peer: Ipv4Addr) -> bool {
        let mask = u32::from(self.netmask);
        u32::from(self.addr) & mask == u32::from(peer) & mask
    }
}

/// Enumerates IPv4 interfaces usable for discovery.
///
/// Loopback interfaces are included: the test tooling binds fake devices
/// to `127.0.0.1`.
pub fn enumerate_interfaces() -> std::io::Result<Vec<NetworkInterface>> {
    let mut ifaces = Vec::new();
    for iface in if_addrs::get_if_addrs()? {
        if let if_addrs::IfAddr::V4(v4) = iface.addr {
            debug!(name = %iface.name, addr = %v4.ip, "found IPv4 interface");
            ifaces.push(NetworkInterface {
                name: iface.name,
                addr: v4.ip,
                netmask: v4.netmask,
            });
        }
    }
    Ok(ifaces)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_of_class_c() {
        let iface = NetworkInterface {
            name: "eth0".into(),
            addr: Ipv4Addr::new(192, 168, 1, 10),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
        };
        assert_eq!(iface.broadcast(), Ipv4Addr::new(192, 168, 1, 255));
        assert!(iface.contains(Ipv4Addr::new(192, 168, 1, 42)));
        assert!(!iface.contains(Ipv4Addr::new(192, 168, 2, 42)));
    }
}
