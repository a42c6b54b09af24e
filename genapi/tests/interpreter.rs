/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Interpreter semantics against an in-memory register file: address
//! resolution, masked access, converters, access modes, caching and the
//! recursion guard.

use std::convert::TryInto;

use lucida_genapi::{
    builder::GenApiBuilder,
    prelude::*,
    store::{DefaultCacheStore, DefaultNodeStore, DefaultValueStore, NodeStore},
    Device, GenApiError, RangeCheckPolicy, RegisterCachePolicy, ValueCtxt,
};

/// A register file pretending to be a camera.
struct MemoryDevice {
    memory: Vec<u8>,
    n_reads: usize,
    n_writes: usize,
}

impl MemoryDevice {
    fn new() -> Self {
        Self {
            memory: vec![0; 0x1000],
            n_reads: 0,
            n_writes: 0,
        }
    }

    fn poke(&mut self, address: usize, data: &[u8]) {
        self.memory[address..address + data.len()].copy_from_slice(data);
    }

    fn peek_u32_be(&self, address: usize) -> u32 {
        u32::from_be_bytes(self.memory[address..address + 4].try_into().unwrap())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("out of bounds register access")]
struct OutOfBounds;

impl Device for MemoryDevice {
    type Error = OutOfBounds;

    fn read_mem(&mut self, address: i64, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.n_reads += 1;
        let start = address as usize;
        let slice = self.memory.get(start..start + buf.len()).ok_or(OutOfBounds)?;
        buf.copy_from_slice(slice);
        Ok(())
    }

    fn write_mem(&mut self, address: i64, data: &[u8]) -> Result<(), Self::Error> {
        self.n_writes += 1;
        let start = address as usize;
        let slice = self
            .memory
            .get_mut(start..start + data.len())
            .ok_or(OutOfBounds)?;
        slice.copy_from_slice(data);
        Ok(())
    }
}

type Ctxt = ValueCtxt<DefaultValueStore, DefaultCacheStore>;

fn build(xml: &str) -> (DefaultNodeStore, Ctxt) {
    let (_, store, cx) = GenApiBuilder::<DefaultNodeStore>::default()
        .build(&xml)
        .unwrap();
    (store, cx)
}

fn document(body: &str) -> String {
    format!(
        r#"
        <RegisterDescription ModelName="Synth" VendorName="Lucida"
            StandardNameSpace="GEV" SchemaMajorVersion="1" SchemaMinorVersion="1"
            SchemaSubMinorVersion="0" MajorVersion="1" MinorVersion="0"
            SubMinorVersion="0" ProductGuid="1" VersionGuid="1"
            xmlns="http://www.genicam.org/GenApi/Version_1_1">
            {}
            <Port Name="Device">
            </Port>
        </RegisterDescription>
        "#,
        body
    )
}

#[test]
fn masked_int_reg_read_and_range() {
    let xml = document(
        r#"
        <MaskedIntReg Name="Exposure">
            <Address>0x20</Address>
            <Length>4</Length>
            <AccessMode>RW</AccessMode>
            <pPort>Device</pPort>
            <LSB>0</LSB>
            <MSB>7</MSB>
            <Sign>Unsigned</Sign>
            <Endianess>LittleEndian</Endianess>
        </MaskedIntReg>
        "#,
    );
    let (store, mut cx) = build(&xml);
    let mut device = MemoryDevice::new();
    device.poke(0x20, &[0x7b, 0x00, 0x00, 0x00]);

    let node = store.id_by_name("Exposure").unwrap();
    let node = node.expect_iinteger_kind(&store).unwrap();

    assert_eq!(node.value(&mut device, &store, &mut cx).unwrap(), 123);
    assert_eq!(node.min(&mut device, &store, &mut cx).unwrap(), 0);
    assert_eq!(node.max(&mut device, &store, &mut cx).unwrap(), 255);

    // 321 exceeds the 8-bit field.
    let res = node.set_value(321, &mut device, &store, &mut cx);
    assert!(matches!(res, Err(GenApiError::OutOfRange(_))));

    // With the check relaxed to Debug the write goes through masked.
    cx.set_range_check_policy(RangeCheckPolicy::Debug);
    node.set_value(321, &mut device, &store, &mut cx).unwrap();
}

#[test]
fn address_is_the_sum_of_contributions() {
    let xml = document(
        r#"
        <Integer Name="ChannelBase">
            <Value>0x100</Value>
        </Integer>

        <IntReg Name="ChannelPort">
            <Address>0x10</Address>
            <pAddress>ChannelBase</pAddress>
            <Length>4</Length>
            <AccessMode>RW</AccessMode>
            <pPort>Device</pPort>
            <Endianess>BigEndian</Endianess>
        </IntReg>
        "#,
    );
    let (store, mut cx) = build(&xml);
    let mut device = MemoryDevice::new();
    device.poke(0x110, &11_u32.to_be_bytes());

    let node = store.id_by_name("ChannelPort").unwrap();
    let integer = node.expect_iinteger_kind(&store).unwrap();
    assert_eq!(integer.value(&mut device, &store, &mut cx).unwrap(), 11);

    let register = node.expect_iregister_kind(&store).unwrap();
    assert_eq!(
        register.address(&mut device, &store, &mut cx).unwrap(),
        0x110
    );
}

#[test]
fn converter_applies_both_directions() {
    let xml = document(
        r#"
        <Converter Name="Gain">
            <FormulaTo>FROM * 10</FormulaTo>
            <FormulaFrom>TO / 10.0</FormulaFrom>
            <pValue>GainRaw</pValue>
        </Converter>

        <IntReg Name="GainRaw">
            <Address>0x40</Address>
            <Length>4</Length>
            <AccessMode>RW</AccessMode>
            <pPort>Device</pPort>
            <Endianess>BigEndian</Endianess>
        </IntReg>
        "#,
    );
    let (store, mut cx) = build(&xml);
    let mut device = MemoryDevice::new();

    let gain = store.id_by_name("Gain").unwrap();
    let gain = gain.expect_ifloat_kind(&store).unwrap();

    // Write: application value 2.5 -> register value 25.
    gain.set_value(2.5, &mut device, &store, &mut cx).unwrap();
    assert_eq!(device.peek_u32_be(0x40), 25);

    // Read: register value 25 -> application value 2.5.
    assert!((gain.value(&mut device, &store, &mut cx).unwrap() - 2.5).abs() < f64::EPSILON);
}

#[test]
fn int_swiss_knife_combines_features() {
    let xml = document(
        r#"
        <Integer Name="Width">
            <Value>640</Value>
        </Integer>
        <Integer Name="Height">
            <Value>480</Value>
        </Integer>
        <IntSwissKnife Name="PayloadSize">
            <pVariable Name="W">Width</pVariable>
            <pVariable Name="H">Height</pVariable>
            <Constant Name="BPP">1</Constant>
            <Formula>W * H * BPP</Formula>
        </IntSwissKnife>
        "#,
    );
    let (store, mut cx) = build(&xml);
    let mut device = MemoryDevice::new();

    let payload = store.id_by_name("PayloadSize").unwrap();
    let payload = payload.expect_iinteger_kind(&store).unwrap();
    assert_eq!(
        payload.value(&mut device, &store, &mut cx).unwrap(),
        640 * 480
    );

    // A swiss knife computes; it never accepts a write.
    assert!(payload.set_value(1, &mut device, &store, &mut cx).is_err());
}

#[test]
fn locked_feature_refuses_writes() {
    let xml = document(
        r#"
        <Boolean Name="ParamsLocked">
            <Value>Yes</Value>
        </Boolean>

        <Integer Name="Width">
            <pIsLocked>ParamsLocked</pIsLocked>
            <Value>512</Value>
        </Integer>
        "#,
    );
    let (store, mut cx) = build(&xml);
    let mut device = MemoryDevice::new();

    let width = store.id_by_name("Width").unwrap();
    let width = width.expect_iinteger_kind(&store).unwrap();

    assert_eq!(width.value(&mut device, &store, &mut cx).unwrap(), 512);
    assert!(!width.is_writable(&mut device, &store, &mut cx).unwrap());
    assert!(matches!(
        width.set_value(640, &mut device, &store, &mut cx),
        Err(GenApiError::ReadOnly(_))
    ));

    // Unlock through the lock feature itself.
    let lock = store.id_by_name("ParamsLocked").unwrap();
    let lock = lock.expect_iboolean_kind(&store).unwrap();
    lock.set_value(false, &mut device, &store, &mut cx).unwrap();
    width.set_value(640, &mut device, &store, &mut cx).unwrap();
    assert_eq!(width.value(&mut device, &store, &mut cx).unwrap(), 640);
}

#[test]
fn write_only_register_refuses_reads() {
    let xml = document(
        r#"
        <IntReg Name="Strobe">
            <Address>0x60</Address>
            <Length>4</Length>
            <AccessMode>WO</AccessMode>
            <pPort>Device</pPort>
            <Endianess>BigEndian</Endianess>
        </IntReg>
        "#,
    );
    let (store, mut cx) = build(&xml);
    let mut device = MemoryDevice::new();

    let strobe = store.id_by_name("Strobe").unwrap();
    let strobe = strobe.expect_iinteger_kind(&store).unwrap();
    assert!(matches!(
        strobe.value(&mut device, &store, &mut cx),
        Err(GenApiError::WriteOnly(_))
    ));
    strobe.set_value(1, &mut device, &store, &mut cx).unwrap();
}

#[test]
fn cacheable_register_reads_hit_the_device_once() {
    let xml = document(
        r#"
        <IntReg Name="Temperature">
            <Address>0x80</Address>
            <Length>4</Length>
            <AccessMode>RW</AccessMode>
            <pPort>Device</pPort>
            <Cachable>WriteThrough</Cachable>
            <Endianess>BigEndian</Endianess>
        </IntReg>
        "#,
    );
    let (store, mut cx) = build(&xml);
    let mut device = MemoryDevice::new();
    device.poke(0x80, &21_u32.to_be_bytes());

    let node = store.id_by_name("Temperature").unwrap();
    let node = node.expect_iinteger_kind(&store).unwrap();

    assert_eq!(node.value(&mut device, &store, &mut cx).unwrap(), 21);
    let reads_after_first = device.n_reads;
    assert_eq!(node.value(&mut device, &store, &mut cx).unwrap(), 21);
    assert_eq!(device.n_reads, reads_after_first);

    // Disabling the cache forces a device read again.
    cx.set_register_cache_policy(RegisterCachePolicy::Disable);
    assert_eq!(node.value(&mut device, &store, &mut cx).unwrap(), 21);
    assert!(device.n_reads > reads_after_first);
}

#[test]
fn invalidator_stales_dependent_cache() {
    let xml = document(
        r#"
        <IntReg Name="Mode">
            <Address>0x90</Address>
            <Length>4</Length>
            <AccessMode>RW</AccessMode>
            <pPort>Device</pPort>
            <Endianess>BigEndian</Endianess>
        </IntReg>

        <IntReg Name="Status">
            <Address>0x94</Address>
            <Length>4</Length>
            <AccessMode>RO</AccessMode>
            <pPort>Device</pPort>
            <Cachable>WriteThrough</Cachable>
            <pInvalidator>Mode</pInvalidator>
            <Endianess>BigEndian</Endianess>
        </IntReg>
        "#,
    );
    let (store, mut cx) = build(&xml);
    let mut device = MemoryDevice::new();
    device.poke(0x94, &1_u32.to_be_bytes());

    let mode = store.id_by_name("Mode").unwrap();
    let mode = mode.expect_iinteger_kind(&store).unwrap();
    let status = store.id_by_name("Status").unwrap();
    let status = status.expect_iinteger_kind(&store).unwrap();

    assert_eq!(status.value(&mut device, &store, &mut cx).unwrap(), 1);

    // The device changes the status as a side effect of the mode write;
    // the invalidator edge must force a fresh read.
    device.poke(0x94, &2_u32.to_be_bytes());
    mode.set_value(5, &mut device, &store, &mut cx).unwrap();
    assert_eq!(status.value(&mut device, &store, &mut cx).unwrap(), 2);
}

#[test]
fn cyclic_p_value_chain_terminates() {
    let xml = document(
        r#"
        <Integer Name="Alpha">
            <pValue>Beta</pValue>
        </Integer>
        <Integer Name="Beta">
            <pValue>Alpha</pValue>
        </Integer>
        "#,
    );
    let (store, mut cx) = build(&xml);
    let mut device = MemoryDevice::new();

    let alpha = store.id_by_name("Alpha").unwrap();
    let alpha = alpha.expect_iinteger_kind(&store).unwrap();
    assert!(matches!(
        alpha.value(&mut device, &store, &mut cx),
        Err(GenApiError::InvalidPValue(_))
    ));
}

#[test]
fn command_execution_and_completion() {
    let xml = document(
        r#"
        <Command Name="Start">
            <pValue>StartReg</pValue>
            <CommandValue>3</CommandValue>
        </Command>

        <IntReg Name="StartReg">
            <Address>0xa0</Address>
            <Length>4</Length>
            <AccessMode>RW</AccessMode>
            <pPort>Device</pPort>
            <Endianess>BigEndian</Endianess>
        </IntReg>
        "#,
    );
    let (store, mut cx) = build(&xml);
    let mut device = MemoryDevice::new();

    let start = store.id_by_name("Start").unwrap();
    let start = start.expect_icommand_kind(&store).unwrap();

    start.execute(&mut device, &store, &mut cx).unwrap();
    assert_eq!(device.peek_u32_be(0xa0), 3);
    // The register still carries the command value: not done yet.
    assert!(!start.is_done(&mut device, &store, &mut cx).unwrap());

    // The device clears it on completion.
    device.poke(0xa0, &0_u32.to_be_bytes());
    assert!(start.is_done(&mut device, &store, &mut cx).unwrap());
}

#[test]
fn string_register_round_trip() {
    let xml = document(
        r#"
        <StringReg Name="UserID">
            <Address>0xc0</Address>
            <Length>16</Length>
            <AccessMode>RW</AccessMode>
            <pPort>Device</pPort>
        </StringReg>
        "#,
    );
    let (store, mut cx) = build(&xml);
    let mut device = MemoryDevice::new();

    let node = store.id_by_name("UserID").unwrap();
    let node = node.expect_istring_kind(&store).unwrap();

    node.set_value("bench".to_string(), &mut device, &store, &mut cx)
        .unwrap();
    assert_eq!(node.value(&mut device, &store, &mut cx).unwrap(), "bench");
    assert_eq!(node.max_length(&mut device, &store, &mut cx).unwrap(), 16);

    let res = node.set_value(
        "a string longer than the register".to_string(),
        &mut device,
        &store,
        &mut cx,
    );
    assert!(matches!(res, Err(GenApiError::InvalidLength(_))));
}

#[test]
fn enumeration_validates_membership() {
    let xml = document(
        r#"
        <Enumeration Name="PixelFormat">
            <EnumEntry Name="Mono8">
                <Value>1</Value>
            </EnumEntry>
            <EnumEntry Name="Mono16">
                <Value>2</Value>
            </EnumEntry>
            <Value>1</Value>
        </Enumeration>
        "#,
    );
    let (store, mut cx) = build(&xml);
    let mut device = MemoryDevice::new();

    let node = store.id_by_name("PixelFormat").unwrap();
    let node = node.expect_ienumeration_kind(&store).unwrap();

    let entry = node.current_entry(&mut device, &store, &mut cx).unwrap();
    assert_eq!(entry.name(&store), "Mono8");

    node.set_entry_by_name("Mono16", &mut device, &store, &mut cx)
        .unwrap();
    assert_eq!(node.current_value(&mut device, &store, &mut cx).unwrap(), 2);

    // Membership is always validated.
    assert!(matches!(
        node.set_entry_by_value(9, &mut device, &store, &mut cx),
        Err(GenApiError::EnumEntryNotFound(_))
    ));
    assert!(matches!(
        node.set_entry_by_name("Mono12", &mut device, &store, &mut cx),
        Err(GenApiError::EnumEntryNotFound(_))
    ));
}
