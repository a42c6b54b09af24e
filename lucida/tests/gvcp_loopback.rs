/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! GVCP transactions against a scripted responder on the loopback
//! interface: request-id correlation, retransmission, pending-ack
//! deadline extension and chunked memory transfers.

mod common;

use std::net::Ipv4Addr;
use std::time::Duration;

use common::GvcpResponder;

use lucida::gev::register_map::{DeviceMode, NicCapability, NicConfiguration};
use lucida::gev::{ControlHandle, DeviceInfo};
use lucida::DeviceControl;

fn device_info() -> DeviceInfo {
    DeviceInfo {
        gev_version: semver::Version::new(2, 0, 0),
        device_mode: DeviceMode::from_raw(0x8000_0000),
        mac_addr: [2, 0, 0, 0, 0, 1],
        nic_capability: NicCapability::from_raw(0),
        nic_configuration: NicConfiguration::from_raw(0),
        ip: Ipv4Addr::LOCALHOST,
        subnet_mask: Ipv4Addr::new(255, 0, 0, 0),
        default_gateway: Ipv4Addr::LOCALHOST,
        manufacturer_name: "Lucida".into(),
        model_name: "Synth-GV01".into(),
        device_version: "1.0".into(),
        manufacturer_info: "loopback test device".into(),
        serial_number: "SN-LOOP".into(),
        user_defined_name: "loop".into(),
    }
}

fn open_handle(responder: &GvcpResponder) -> ControlHandle {
    // A generous device heartbeat so the background heartbeat never
    // interferes with short tests.
    responder.poke_u32(0x0938, 30_000);
    let mut handle = ControlHandle::new_with_addr(device_info(), responder.addr).unwrap();
    handle.set_timeout(Duration::from_millis(100));
    handle.open().unwrap();
    handle
}

#[test]
fn open_claims_the_control_channel() {
    let responder = GvcpResponder::spawn();
    let handle = open_handle(&responder);

    // CCP now carries the control bit.
    assert_eq!(responder.peek_u32(0x0a00) & 0b10, 0b10);
    drop(handle);
}

#[test]
fn close_releases_the_control_channel() {
    let responder = GvcpResponder::spawn();
    let mut handle = open_handle(&responder);
    handle.close().unwrap();
    assert_eq!(responder.peek_u32(0x0a00), 0);
}

#[test]
fn register_round_trip() {
    let responder = GvcpResponder::spawn();
    let mut handle = open_handle(&responder);

    handle.write_reg(0x2000, 0xdead_beef).unwrap();
    assert_eq!(handle.read_reg(0x2000).unwrap(), 0xdead_beef);
    assert_eq!(responder.peek_u32(0x2000), 0xdead_beef);
}

#[test]
fn chunked_memory_transfer() {
    let responder = GvcpResponder::spawn();
    // WriteMem capability bit.
    responder.poke_u32(0x0934, 0x0000_0002);
    let mut handle = open_handle(&responder);

    // Larger than one 536-byte transaction either way.
    let data: Vec<u8> = (0..2048_u32).map(|i| i as u8).collect();
    handle.write(0x4000, &data).unwrap();

    let mut read_back = vec![0_u8; data.len()];
    handle.read(0x4000, &mut read_back).unwrap();
    assert_eq!(read_back, data);
}

#[test]
fn foreign_request_ids_are_discarded() {
    let responder = GvcpResponder::spawn();
    let mut handle = open_handle(&responder);

    responder.poke_u32(0x3000, 42);
    responder
        .bogus_id_next
        .store(true, std::sync::atomic::Ordering::SeqCst);

    // The bogus ack precedes the real one; the client must keep waiting
    // and return the answer that matches its request id.
    assert_eq!(handle.read_reg(0x3000).unwrap(), 42);
}

#[test]
fn lost_datagrams_are_retransmitted() {
    let responder = GvcpResponder::spawn();
    let mut handle = open_handle(&responder);

    responder.poke_u32(0x3000, 7);
    *responder.drop_next.lock().unwrap() = 2;

    assert_eq!(handle.read_reg(0x3000).unwrap(), 7);
}

#[test]
fn exhausted_retries_fail_with_timeout() {
    let responder = GvcpResponder::spawn();
    let mut handle = open_handle(&responder);
    handle.set_retry_count(1);

    // Swallow the initial try and both retransmissions.
    *responder.drop_next.lock().unwrap() = 10;

    assert!(matches!(
        handle.read_reg(0x3000),
        Err(lucida::ControlError::Timeout)
    ));
}

#[test]
fn pending_ack_extends_the_attempt() {
    let responder = GvcpResponder::spawn();
    let mut handle = open_handle(&responder);
    handle.set_timeout(Duration::from_millis(40));

    responder.poke_u32(0x3000, 3);
    *responder.pend_next.lock().unwrap() = 1;

    // The pending ack buys the responder time beyond the base timeout.
    assert_eq!(handle.read_reg(0x3000).unwrap(), 3);
}
