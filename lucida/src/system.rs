/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The system facade: an ordered registry of transport interfaces with
//! device enumeration and open-by-id across all of them.
//!
//! [`System`] is an explicit value the caller constructs and passes
//! around; there is no process-global instance.

use tracing::debug;

use crate::{
    camera::{Camera, CameraInfo},
    genapi::DefaultGenApiCtxt,
    gev,
    DeviceControl, LucidaError, LucidaResult, PayloadStream,
};

/// A camera with its transport erased, as returned by the registry.
pub type GenericCamera = Camera<Box<dyn DeviceControl>, Box<dyn PayloadStream>, DefaultGenApiCtxt>;

/// Identification of an enumerated device, stable across list rebuilds
/// while the device stays present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Identifier used with `open_device`.
    pub id: String,
    pub vendor_name: String,
    pub model_name: String,
    pub serial_number: String,
    pub user_defined_name: String,
    /// Name of the interface that enumerated the device.
    pub interface_id: String,
}

/// Device enumeration of one transport.
pub trait Interface {
    /// Identifier of the interface, e.g. `"Lucida-GV"`.
    fn interface_id(&self) -> &str;

    /// Rebuilds the device-list snapshot.
    fn update_device_list(&mut self) -> LucidaResult<()>;

    /// Number of devices in the last snapshot.
    fn n_devices(&self) -> usize;

    fn device_id(&self, index: usize) -> Option<&str>;

    fn device_info(&self, index: usize) -> Option<&DeviceDescriptor>;

    /// Opens the device with the given id from the last snapshot.
    fn open_device(&mut self, id: &str) -> LucidaResult<GenericCamera>;
}

/// The GigE Vision interface: discovery broadcast plus ACK collection.
#[derive(Default)]
pub struct GevInterface {
    devices: Vec<(DeviceDescriptor, gev::DeviceInfo)>,
}

impl GevInterface {
    pub const ID: &'static str = "Lucida-GV";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn descriptor_of(info: &gev::DeviceInfo) -> DeviceDescriptor {
        // Prefer the user-defined name; devices without one fall back to
        // a vendor-serial pair. Either way the id survives re-discovery.
        let id = if info.user_defined_name.is_empty() {
            format!("{}-{}", info.manufacturer_name, info.serial_number)
        } else {
            info.user_defined_name.clone()
        };
        DeviceDescriptor {
            id,
            vendor_name: info.manufacturer_name.clone(),
            model_name: info.model_name.clone(),
            serial_number: info.serial_number.clone(),
            user_defined_name: info.user_defined_name.clone(),
            interface_id: Self::ID.into(),
        }
    }
}

impl Interface for GevInterface {
    fn interface_id(&self) -> &str {
        Self::ID
    }

    fn update_device_list(&mut self) -> LucidaResult<()> {
        let found = gev::enumerate_devices()?;
        debug!(n = found.len(), "gev discovery finished");

        // Keep the previous ordering for devices still present so ids
        // and indices stay stable across rebuilds.
        let mut next: Vec<(DeviceDescriptor, gev::DeviceInfo)> = Vec::new();
        for (descriptor, _) in &self.devices {
            if let Some(info) = found
                .iter()
                .find(|info| Self::descriptor_of(info).id == descriptor.id)
            {
                next.push((Self::descriptor_of(info), info.clone()));
            }
        }
        for info in found {
            let descriptor = Self::descriptor_of(&info);
            if !next.iter().any(|(known, _)| known.id == descriptor.id) {
                next.push((descriptor, info));
            }
        }

        self.devices = next;
        Ok(())
    }

    fn n_devices(&self) -> usize {
        self.devices.len()
    }

    fn device_id(&self, index: usize) -> Option<&str> {
        self.devices.get(index).map(|(d, _)| d.id.as_str())
    }

    fn device_info(&self, index: usize) -> Option<&DeviceDescriptor> {
        self.devices.get(index).map(|(d, _)| d)
    }

    fn open_device(&mut self, id: &str) -> LucidaResult<GenericCamera> {
        let (_, info) = self
            .devices
            .iter()
            .find(|(descriptor, _)| descriptor.id == id)
            .ok_or_else(|| LucidaError::DeviceNotFound(id.to_string().into()))?;

        let camera_info = CameraInfo {
            vendor_name: info.manufacturer_name.clone(),
            model_name: info.model_name.clone(),
            serial_number: info.serial_number.clone(),
        };
        let device_ip = info.ip;
        let mut strm = gev::StreamHandle::new()?;
        let mut ctrl = gev::ControlHandle::new(info.clone())?;
        ctrl.set_stream_host_port(strm.local_port());
        strm.set_device_addr((device_ip, lucida_device::gev::GVCP_PORT).into());

        Ok(Camera::new(
            Box::new(ctrl) as Box<dyn DeviceControl>,
            Box::new(strm) as Box<dyn PayloadStream>,
            None,
            camera_info,
        ))
    }
}

/// The registry of interfaces. The GigE Vision interface is registered
/// by default; additional transports (or test doubles) are added with
/// [`System::register_interface`].
pub struct System {
    interfaces: Vec<Box<dyn Interface>>,
}

impl System {
    #[must_use]
    pub fn new() -> Self {
        Self {
            interfaces: vec![Box::new(GevInterface::new())],
        }
    }

    /// A registry without any interface, for callers that register their
    /// own set.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            interfaces: Vec::new(),
        }
    }

    pub fn register_interface(&mut self, interface: Box<dyn Interface>) {
        self.interfaces.push(interface);
    }

    /// (Re)enables a built-in interface by id; a no-op when it is
    /// already registered.
    pub fn enable_interface(&mut self, interface_id: &str) -> LucidaResult<()> {
        if self
            .interfaces
            .iter()
            .any(|iface| iface.interface_id() == interface_id)
        {
            return Ok(());
        }
        match interface_id {
            GevInterface::ID => {
                self.interfaces.push(Box::new(GevInterface::new()));
                Ok(())
            }
            other => Err(crate::ControlError::NotSupported(
                format!("unknown interface `{}`", other).into(),
            )
            .into()),
        }
    }

    /// Drops an interface (and its device snapshot) by id.
    pub fn disable_interface(&mut self, interface_id: &str) {
        self.interfaces
            .retain(|iface| iface.interface_id() != interface_id);
    }

    pub fn interface_ids(&self) -> Vec<&str> {
        self.interfaces
            .iter()
            .map(|iface| iface.interface_id())
            .collect()
    }

    /// Rebuilds every interface's snapshot.
    pub fn update_device_list(&mut self) -> LucidaResult<()> {
        for interface in &mut self.interfaces {
            interface.update_device_list()?;
        }
        Ok(())
    }

    pub fn n_devices(&self) -> usize {
        self.interfaces.iter().map(|iface| iface.n_devices()).sum()
    }

    /// Device id at the registry-wide index, walking interfaces in
    /// registration order.
    pub fn device_id(&self, mut index: usize) -> Option<&str> {
        for interface in &self.interfaces {
            if index < interface.n_devices() {
                return interface.device_id(index);
            }
            index -= interface.n_devices();
        }
        None
    }

    pub fn device_info(&self, mut index: usize) -> Option<&DeviceDescriptor> {
        for interface in &self.interfaces {
            if index < interface.n_devices() {
                return interface.device_info(index);
            }
            index -= interface.n_devices();
        }
        None
    }

    /// Opens a device by id, walking interfaces in registration order.
    pub fn open_device(&mut self, id: &str) -> LucidaResult<GenericCamera> {
        for interface in &mut self.interfaces {
            let known = (0..interface.n_devices())
                .any(|i| interface.device_id(i) == Some(id));
            if known {
                return interface.open_device(id);
            }
        }
        Err(LucidaError::DeviceNotFound(id.to_string().into()))
    }

    /// Drops all interfaces and their snapshots.
    pub fn shutdown(self) {}
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A scripted interface standing in for a transport.
    struct MockInterface {
        id: &'static str,
        present: Vec<&'static str>,
        devices: Vec<DeviceDescriptor>,
    }

    impl MockInterface {
        fn new(id: &'static str, present: Vec<&'static str>) -> Self {
            Self {
                id,
                present,
                devices: Vec::new(),
            }
        }

        fn descriptor(&self, device: &str) -> DeviceDescriptor {
            DeviceDescriptor {
                id: device.into(),
                vendor_name: "Mock".into(),
                model_name: "Synth".into(),
                serial_number: device.into(),
                user_defined_name: device.into(),
                interface_id: self.id.into(),
            }
        }
    }

    impl Interface for MockInterface {
        fn interface_id(&self) -> &str {
            self.id
        }

        fn update_device_list(&mut self) -> LucidaResult<()> {
            let mut next = Vec::new();
            for known in &self.devices {
                if self.present.contains(&known.id.as_str()) {
                    next.push(known.clone());
                }
            }
            for device in &self.present {
                if !next.iter().any(|d: &DeviceDescriptor| d.id == *device) {
                    next.push(self.descriptor(device));
                }
            }
            self.devices = next;
            Ok(())
        }

        fn n_devices(&self) -> usize {
            self.devices.len()
        }

        fn device_id(&self, index: usize) -> Option<&str> {
            self.devices.get(index).map(|d| d.id.as_str())
        }

        fn device_info(&self, index: usize) -> Option<&DeviceDescriptor> {
            self.devices.get(index)
        }

        fn open_device(&mut self, id: &str) -> LucidaResult<GenericCamera> {
            Err(LucidaError::DeviceNotFound(id.to_string().into()))
        }
    }

    #[test]
    fn registry_wide_indexing() {
        let mut system = System::empty();
        system.register_interface(Box::new(MockInterface::new("IF-A", vec!["a0", "a1"])));
        system.register_interface(Box::new(MockInterface::new("IF-B", vec!["b0"])));
        system.update_device_list().unwrap();

        assert_eq!(system.n_devices(), 3);
        assert_eq!(system.device_id(0), Some("a0"));
        assert_eq!(system.device_id(1), Some("a1"));
        assert_eq!(system.device_id(2), Some("b0"));
        assert_eq!(system.device_id(3), None);
        assert_eq!(system.device_info(2).unwrap().interface_id, "IF-B");
    }

    #[test]
    fn ids_stay_stable_across_rebuilds() {
        let mut iface = MockInterface::new("IF-A", vec!["cam-1", "cam-2"]);
        iface.update_device_list().unwrap();
        assert_eq!(iface.device_id(0), Some("cam-1"));

        // A rebuild that discovers the same devices in another order must
        // keep the previous ordering.
        iface.present = vec!["cam-2", "cam-1"];
        iface.update_device_list().unwrap();
        assert_eq!(iface.device_id(0), Some("cam-1"));
        assert_eq!(iface.device_id(1), Some("cam-2"));

        // A vanished device frees its slot; the rest keep theirs.
        iface.present = vec!["cam-2"];
        iface.update_device_list().unwrap();
        assert_eq!(iface.device_id(0), Some("cam-2"));
        assert_eq!(iface.n_devices(), 1);
    }

    #[test]
    fn disable_interface_removes_devices() {
        let mut system = System::empty();
        system.register_interface(Box::new(MockInterface::new("IF-A", vec!["a0"])));
        system.register_interface(Box::new(MockInterface::new("IF-B", vec!["b0"])));
        system.update_device_list().unwrap();
        assert_eq!(system.n_devices(), 2);

        system.disable_interface("IF-A");
        assert_eq!(system.n_devices(), 1);
        assert_eq!(system.interface_ids(), vec!["IF-B"]);
    }
}
