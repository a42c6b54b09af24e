/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Test doubles shared by the integration suites: an in-memory register
//! file behind `DeviceControl`, a no-op stream, and a scripted GVCP
//! responder bound to the loopback interface.

#![allow(dead_code)]

use std::{
    convert::TryInto,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
};

use lucida::{ControlError, ControlResult, DeviceControl, PayloadStream, StreamResult};

/// Genicam document of the synthetic test camera.
///
/// `Width`/`Height` are register-backed with declared bounds,
/// `PayloadSize` derives from them, and `TriggerMode`'s register address
/// shifts with `TriggerSelector` through an indexed address term.
pub const TEST_GENAPI_XML: &str = r#"
<RegisterDescription ModelName="Synth-GV01" VendorName="Lucida"
    StandardNameSpace="GEV" SchemaMajorVersion="1" SchemaMinorVersion="1"
    SchemaSubMinorVersion="0" MajorVersion="1" MinorVersion="0"
    SubMinorVersion="0" ProductGuid="1" VersionGuid="1"
    xmlns="http://www.genicam.org/GenApi/Version_1_1">

    <Category Name="Root">
        <pFeature>Width</pFeature>
        <pFeature>Height</pFeature>
        <pFeature>OffsetX</pFeature>
        <pFeature>OffsetY</pFeature>
        <pFeature>PayloadSize</pFeature>
        <pFeature>TriggerSelector</pFeature>
        <pFeature>TriggerMode</pFeature>
    </Category>

    <Integer Name="Width">
        <pValue>WidthReg</pValue>
        <Min>16</Min>
        <Max>4096</Max>
    </Integer>

    <IntReg Name="WidthReg">
        <Address>0x100</Address>
        <Length>4</Length>
        <AccessMode>RW</AccessMode>
        <pPort>Device</pPort>
        <Endianess>BigEndian</Endianess>
    </IntReg>

    <Integer Name="Height">
        <pValue>HeightReg</pValue>
        <Min>16</Min>
        <Max>4096</Max>
    </Integer>

    <IntReg Name="HeightReg">
        <Address>0x104</Address>
        <Length>4</Length>
        <AccessMode>RW</AccessMode>
        <pPort>Device</pPort>
        <Endianess>BigEndian</Endianess>
    </IntReg>

    <Integer Name="OffsetX">
        <pValue>OffsetXReg</pValue>
        <Min>0</Min>
        <Max>4096</Max>
    </Integer>

    <IntReg Name="OffsetXReg">
        <Address>0x108</Address>
        <Length>4</Length>
        <AccessMode>RW</AccessMode>
        <pPort>Device</pPort>
        <Endianess>BigEndian</Endianess>
    </IntReg>

    <Integer Name="OffsetY">
        <pValue>OffsetYReg</pValue>
        <Min>0</Min>
        <Max>4096</Max>
    </Integer>

    <IntReg Name="OffsetYReg">
        <Address>0x10C</Address>
        <Length>4</Length>
        <AccessMode>RW</AccessMode>
        <pPort>Device</pPort>
        <Endianess>BigEndian</Endianess>
    </IntReg>

    <Boolean Name="AcquisitionFrameRateEnable">
        <Value>No</Value>
    </Boolean>

    <Float Name="AcquisitionFrameRate">
        <Value>20.0</Value>
        <Min>1.0</Min>
        <Max>120.0</Max>
    </Float>

    <IntSwissKnife Name="PayloadSize">
        <pVariable Name="W">Width</pVariable>
        <pVariable Name="H">Height</pVariable>
        <Formula>W * H</Formula>
    </IntSwissKnife>

    <Enumeration Name="TriggerSelector">
        <EnumEntry Name="FrameStart">
            <Value>0</Value>
        </EnumEntry>
        <EnumEntry Name="AcquisitionStart">
            <Value>1</Value>
        </EnumEntry>
        <Value>0</Value>
        <pSelected>TriggerMode</pSelected>
    </Enumeration>

    <IntReg Name="TriggerMode">
        <Address>0x300</Address>
        <pIndex Offset="0x20">TriggerSelector</pIndex>
        <Length>4</Length>
        <AccessMode>RW</AccessMode>
        <pPort>Device</pPort>
        <Endianess>BigEndian</Endianess>
    </IntReg>

    <Command Name="AcquisitionStart">
        <pValue>AcquisitionStartReg</pValue>
        <CommandValue>1</CommandValue>
    </Command>

    <IntReg Name="AcquisitionStartReg">
        <Address>0x400</Address>
        <Length>4</Length>
        <AccessMode>RW</AccessMode>
        <pPort>Device</pPort>
        <Endianess>BigEndian</Endianess>
    </IntReg>

    <Command Name="AcquisitionStop">
        <pValue>AcquisitionStopReg</pValue>
        <CommandValue>1</CommandValue>
    </Command>

    <IntReg Name="AcquisitionStopReg">
        <Address>0x404</Address>
        <Length>4</Length>
        <AccessMode>RW</AccessMode>
        <pPort>Device</pPort>
        <Endianess>BigEndian</Endianess>
    </IntReg>

    <Port Name="Device">
    </Port>
</RegisterDescription>
"#;

pub const WIDTH_REG: u64 = 0x100;
pub const HEIGHT_REG: u64 = 0x104;
pub const TRIGGER_MODE_REG: u64 = 0x300;
pub const TRIGGER_MODE_ACQUISITION_START_OFFSET: u64 = 0x20;

/// An in-memory register file standing in for a camera.
#[derive(Clone)]
pub struct MemoryDevice {
    pub memory: Arc<Mutex<Vec<u8>>>,
    opened: bool,
}

impl MemoryDevice {
    pub fn new() -> Self {
        let mut memory = vec![0_u8; 0x1000];
        // Factory defaults: 512x480, Mono8.
        memory[WIDTH_REG as usize..WIDTH_REG as usize + 4]
            .copy_from_slice(&512_u32.to_be_bytes());
        memory[HEIGHT_REG as usize..HEIGHT_REG as usize + 4]
            .copy_from_slice(&480_u32.to_be_bytes());
        Self {
            memory: Arc::new(Mutex::new(memory)),
            opened: false,
        }
    }

    pub fn peek_u32(&self, address: u64) -> u32 {
        let memory = self.memory.lock().unwrap();
        let start = address as usize;
        u32::from_be_bytes(memory[start..start + 4].try_into().unwrap())
    }

    pub fn poke_u32(&self, address: u64, value: u32) {
        let mut memory = self.memory.lock().unwrap();
        let start = address as usize;
        memory[start..start + 4].copy_from_slice(&value.to_be_bytes());
    }
}

impl DeviceControl for MemoryDevice {
    fn open(&mut self) -> ControlResult<()> {
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) -> ControlResult<()> {
        self.opened = false;
        Ok(())
    }

    fn is_opened(&self) -> bool {
        self.opened
    }

    fn read(&mut self, address: u64, buf: &mut [u8]) -> ControlResult<()> {
        let memory = self.memory.lock().unwrap();
        let start = address as usize;
        let slice = memory.get(start..start + buf.len()).ok_or_else(|| {
            ControlError::InvalidData(anyhow::Error::msg("read outside the register file"))
        })?;
        buf.copy_from_slice(slice);
        Ok(())
    }

    fn read_reg(&mut self, address: u64) -> ControlResult<u32> {
        let mut buf = [0; 4];
        self.read(address, &mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    fn write(&mut self, address: u64, data: &[u8]) -> ControlResult<()> {
        let mut memory = self.memory.lock().unwrap();
        let start = address as usize;
        let slice = memory.get_mut(start..start + data.len()).ok_or_else(|| {
            ControlError::InvalidData(anyhow::Error::msg("write outside the register file"))
        })?;
        slice.copy_from_slice(data);
        Ok(())
    }

    fn write_reg(&mut self, address: u64, data: u32) -> ControlResult<()> {
        self.write(address, &data.to_be_bytes())
    }

    fn genapi(&mut self) -> ControlResult<String> {
        Ok(TEST_GENAPI_XML.into())
    }

    fn enable_streaming(&mut self) -> ControlResult<()> {
        Ok(())
    }

    fn disable_streaming(&mut self) -> ControlResult<()> {
        Ok(())
    }
}

/// A stream handle that never receives anything.
#[derive(Default)]
pub struct NullStream {
    running: bool,
}

impl PayloadStream for NullStream {
    fn open(&mut self) -> StreamResult<()> {
        Ok(())
    }

    fn close(&mut self) -> StreamResult<()> {
        Ok(())
    }

    fn start_streaming_loop(
        &mut self,
        _supply: lucida::payload::BufferSupply,
        _ctrl: &mut dyn DeviceControl,
    ) -> StreamResult<()> {
        self.running = true;
        Ok(())
    }

    fn stop_streaming_loop(&mut self) -> StreamResult<()> {
        self.running = false;
        Ok(())
    }

    fn is_loop_running(&self) -> bool {
        self.running
    }
}

/// A scripted GVCP responder bound to `127.0.0.1`.
///
/// It answers `ReadReg`/`WriteReg`/`ReadMem`/`WriteMem` against an
/// in-memory register file. Fault injection: drop the next N datagrams,
/// answer the next command with a pending ack first, or prefix a bogus
/// request id.
pub struct GvcpResponder {
    pub addr: SocketAddr,
    pub memory: Arc<Mutex<Vec<u8>>>,
    pub drop_next: Arc<Mutex<u32>>,
    pub pend_next: Arc<Mutex<u32>>,
    pub bogus_id_next: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
}

impl GvcpResponder {
    pub fn spawn() -> Self {
        use lucida_impl::byte_io::{ReadBytes, WriteBytes};

        let sock = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        sock.set_read_timeout(Some(std::time::Duration::from_millis(20)))
            .unwrap();
        let addr = sock.local_addr().unwrap();

        let memory = Arc::new(Mutex::new(vec![0_u8; 0x10000]));
        let drop_next = Arc::new(Mutex::new(0_u32));
        let pend_next = Arc::new(Mutex::new(0_u32));
        let bogus_id_next = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));

        let memory2 = memory.clone();
        let drop2 = drop_next.clone();
        let pend2 = pend_next.clone();
        let bogus2 = bogus_id_next.clone();
        let stop2 = stop.clone();

        let join = thread::spawn(move || {
            let mut buf = [0_u8; 2048];
            while !stop2.load(Ordering::SeqCst) {
                let (len, peer) = match sock.recv_from(&mut buf) {
                    Ok(res) => res,
                    Err(_) => continue,
                };
                let datagram = &buf[..len];
                if datagram.len() < 8 || datagram[0] != 0x42 {
                    continue;
                }

                {
                    let mut drop_count = drop2.lock().unwrap();
                    if *drop_count > 0 {
                        *drop_count -= 1;
                        continue;
                    }
                }

                let mut cursor = std::io::Cursor::new(&datagram[2..]);
                let command: u16 = cursor.read_bytes_be().unwrap();
                let _size: u16 = cursor.read_bytes_be().unwrap();
                let request_id: u16 = cursor.read_bytes_be().unwrap();
                let payload = &datagram[8..];

                {
                    let mut pend_count = pend2.lock().unwrap();
                    if *pend_count > 0 {
                        *pend_count -= 1;
                        // Pending ack asking for 50 more milliseconds.
                        let mut pending = Vec::new();
                        pending.write_bytes_be(0x0000_u16).unwrap();
                        pending.write_bytes_be(0x0089_u16).unwrap();
                        pending.write_bytes_be(4_u16).unwrap();
                        pending.write_bytes_be(request_id).unwrap();
                        pending.write_bytes_be(0_u16).unwrap();
                        pending.write_bytes_be(50_u16).unwrap();
                        sock.send_to(&pending, peer).unwrap();
                        // The real answer follows after a short nap.
                        thread::sleep(std::time::Duration::from_millis(10));
                    }
                }

                if bogus2.swap(false, Ordering::SeqCst) {
                    // An unrelated ack that the client must discard.
                    let mut bogus = Vec::new();
                    bogus.write_bytes_be(0x0000_u16).unwrap();
                    bogus.write_bytes_be(command + 1).unwrap();
                    bogus.write_bytes_be(0_u16).unwrap();
                    bogus.write_bytes_be(request_id.wrapping_add(17)).unwrap();
                    sock.send_to(&bogus, peer).unwrap();
                }

                let mut memory = memory2.lock().unwrap();
                let mut answer = Vec::new();
                match command {
                    // ReadReg
                    0x0080 => {
                        let mut data = Vec::new();
                        for entry in payload.chunks_exact(4) {
                            let address =
                                u32::from_be_bytes(entry.try_into().unwrap()) as usize;
                            data.extend_from_slice(&memory[address..address + 4]);
                        }
                        answer.write_bytes_be(0x0000_u16).unwrap();
                        answer.write_bytes_be(0x0081_u16).unwrap();
                        answer.write_bytes_be(data.len() as u16).unwrap();
                        answer.write_bytes_be(request_id).unwrap();
                        answer.extend_from_slice(&data);
                    }
                    // WriteReg
                    0x0082 => {
                        let mut entries = 0_u16;
                        for entry in payload.chunks_exact(8) {
                            let address =
                                u32::from_be_bytes(entry[..4].try_into().unwrap()) as usize;
                            memory[address..address + 4].copy_from_slice(&entry[4..]);
                            entries += 1;
                        }
                        answer.write_bytes_be(0x0000_u16).unwrap();
                        answer.write_bytes_be(0x0083_u16).unwrap();
                        answer.write_bytes_be(4_u16).unwrap();
                        answer.write_bytes_be(request_id).unwrap();
                        answer.write_bytes_be(0_u16).unwrap();
                        answer.write_bytes_be(entries).unwrap();
                    }
                    // ReadMem
                    0x0084 => {
                        let address =
                            u32::from_be_bytes(payload[..4].try_into().unwrap()) as usize;
                        let count =
                            u16::from_be_bytes(payload[6..8].try_into().unwrap()) as usize;
                        answer.write_bytes_be(0x0000_u16).unwrap();
                        answer.write_bytes_be(0x0085_u16).unwrap();
                        answer.write_bytes_be((4 + count) as u16).unwrap();
                        answer.write_bytes_be(request_id).unwrap();
                        answer.write_bytes_be(address as u32).unwrap();
                        answer.extend_from_slice(&memory[address..address + count]);
                    }
                    // WriteMem
                    0x0086 => {
                        let address =
                            u32::from_be_bytes(payload[..4].try_into().unwrap()) as usize;
                        let data = &payload[4..];
                        memory[address..address + data.len()].copy_from_slice(data);
                        answer.write_bytes_be(0x0000_u16).unwrap();
                        answer.write_bytes_be(0x0087_u16).unwrap();
                        answer.write_bytes_be(8_u16).unwrap();
                        answer.write_bytes_be(request_id).unwrap();
                        answer.write_bytes_be(address as u32).unwrap();
                        answer.write_bytes_be(0_u16).unwrap();
                        answer.write_bytes_be(data.len() as u16).unwrap();
                    }
                    _ => continue,
                }
                sock.send_to(&answer, peer).unwrap();
            }
        });

        Self {
            addr,
            memory,
            drop_next,
            pend_next,
            bogus_id_next,
            stop,
            join: Some(join),
        }
    }

    pub fn poke_u32(&self, address: usize, value: u32) {
        self.memory.lock().unwrap()[address..address + 4].copy_from_slice(&value.to_be_bytes());
    }

    pub fn peek_u32(&self, address: usize) -> u32 {
        let memory = self.memory.lock().unwrap();
        u32::from_be_bytes(memory[address..address + 4].try_into().unwrap())
    }
}

impl Drop for GvcpResponder {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join().ok();
        }
    }
}
