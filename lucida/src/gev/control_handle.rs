/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The GVCP control handle: reliable request/response transactions over
//! UDP with retries and pending-ack handling, plus the heartbeat that
//! keeps device ownership alive.

use std::{
    convert::TryInto,
    io::Read,
    sync::{Arc, Mutex},
    thread, time,
};

use async_std::{future, net::UdpSocket, task};
use futures_channel::oneshot;
use futures_util::{select, FutureExt};
use tracing::{debug, error, warn};

use lucida_device::gev::{
    protocol::{ack, cmd, cmd::CommandData},
    GVCP_PORT,
};

use crate::{
    utils::unzip_genxml, CompressionType, ControlError, ControlResult, DeviceControl,
};

use super::register_map::{Bootstrap, ControlChannelPrivilege, GvcpCapability, StreamRegister};

/// Timeout of one transaction attempt until the bootstrap registers have
/// been read.
const INITIAL_TIMEOUT: time::Duration = time::Duration::from_millis(500);

/// How many times a command is retransmitted before giving up.
const DEFAULT_RETRY_COUNT: u16 = 5;

/// Heartbeat period until the device's heartbeat timeout is known.
const DEFAULT_HEARTBEAT_PERIOD: time::Duration = time::Duration::from_secs(1);

/// Consecutive heartbeat failures after which control is considered
/// lost.
const HEARTBEAT_FAILURE_LIMIT: u32 = 3;

const GVCP_BUFFER_SIZE: usize = 1024;

pub type DeviceInfo = ack::Discovery;

/// Called on the heartbeat thread when device ownership is lost.
pub type ControlLostHandler = Box<dyn FnMut() + Send>;

/// How the control channel is claimed at open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Claim exclusive control: no other application may even monitor.
    Exclusive,
    /// Claim control, leaving monitor access open.
    Control,
    /// Observe without claiming control; writes will be refused by the
    /// device.
    MonitorAccess,
}

impl Default for OpenMode {
    fn default() -> Self {
        OpenMode::Control
    }
}

pub struct ControlHandle {
    inner: Arc<Mutex<ControlHandleInner>>,
    event_tx: Option<async_channel::Sender<HeartbeatEvent>>,
    completion_rx: Option<oneshot::Receiver<()>>,
    control_lost: Arc<Mutex<Option<ControlLostHandler>>>,
    info: DeviceInfo,
}

impl ControlHandle {
    pub fn new(info: DeviceInfo) -> ControlResult<Self> {
        let addr = (info.ip, GVCP_PORT).into();
        Self::new_with_addr(info, addr)
    }

    /// Opens the control channel towards an explicit address instead of
    /// the standard GVCP port, e.g. for tunnelled devices or test
    /// doubles.
    pub fn new_with_addr(info: DeviceInfo, addr: std::net::SocketAddr) -> ControlResult<Self> {
        let inner = Arc::new(Mutex::new(task::block_on(ControlHandleInner::new(addr))?));

        Ok(Self {
            inner,
            event_tx: None,
            completion_rx: None,
            control_lost: Arc::new(Mutex::new(None)),
            info,
        })
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Sets the handler invoked when the heartbeat loses the device.
    pub fn set_control_lost_handler(&mut self, handler: ControlLostHandler) {
        *self.control_lost.lock().unwrap() = Some(handler);
    }

    pub fn set_open_mode(&mut self, open_mode: OpenMode) {
        self.inner.lock().unwrap().config.open_mode = open_mode;
    }

    /// Timeout of one transaction attempt.
    pub fn set_timeout(&mut self, timeout: time::Duration) {
        self.inner.lock().unwrap().config.timeout = timeout;
    }

    pub fn set_retry_count(&mut self, count: u16) {
        self.inner.lock().unwrap().config.retry_count = count;
    }

    /// Local UDP port the stream channel should target; set by the
    /// interface when it pairs the handle with a stream.
    pub fn set_stream_host_port(&mut self, port: u16) {
        self.inner.lock().unwrap().stream_host_port = Some(port);
    }

    pub fn set_heartbeat_timeout(&mut self, timeout: time::Duration) -> ControlResult<()> {
        {
            let mut inner = self.inner.lock().unwrap();
            Bootstrap::new().set_heartbeat_timeout(&mut *inner, timeout)?;
        }
        if let Some(tx) = self.event_tx.as_ref() {
            tx.try_send(HeartbeatEvent::PeriodChanged(timeout / 3)).ok();
        }
        Ok(())
    }

    /// `true` once the heartbeat reported control lost; only destruction
    /// is legal from here.
    pub fn is_disconnected(&self) -> bool {
        self.inner.lock().unwrap().disconnected
    }

    fn stop_heartbeat(&mut self) {
        match (self.event_tx.take(), self.completion_rx.take()) {
            (Some(event_tx), Some(completion_rx)) => {
                event_tx.try_send(HeartbeatEvent::ChannelClosed).ok();
                task::block_on(completion_rx).ok();
            }
            _ => {}
        }
    }
}

impl DeviceControl for ControlHandle {
    fn open(&mut self) -> ControlResult<()> {
        debug!("opening gev control channel");
        let (heartbeat_period, need_heartbeat) = {
            let mut inner = self.inner.lock().unwrap();
            inner.open()?;

            let mut heartbeat_timeout = Bootstrap::new()
                .heartbeat_timeout(&mut *inner)
                .unwrap_or(DEFAULT_HEARTBEAT_PERIOD * 3);
            if heartbeat_timeout.is_zero() {
                heartbeat_timeout = DEFAULT_HEARTBEAT_PERIOD * 3;
            }
            let need_heartbeat = matches!(
                inner.config.open_mode,
                OpenMode::Exclusive | OpenMode::Control
            );
            (heartbeat_timeout / 3, need_heartbeat)
        };
        debug!(?heartbeat_period, "starting heartbeat");

        let (event_tx, event_rx) = async_channel::unbounded();
        let (completion_tx, completion_rx) = oneshot::channel();
        let heartbeat = HeartbeatLoop {
            inner: self.inner.clone(),
            period: heartbeat_period,
            event_rx,
            need_heartbeat,
            control_lost: self.control_lost.clone(),
        };

        self.event_tx = Some(event_tx);
        self.completion_rx = Some(completion_rx);

        thread::spawn(|| task::block_on(heartbeat.run(completion_tx)));
        Ok(())
    }

    fn close(&mut self) -> ControlResult<()> {
        self.stop_heartbeat();
        self.inner.lock().unwrap().close()
    }

    fn is_opened(&self) -> bool {
        self.inner.lock().unwrap().is_opened
    }

    fn read(&mut self, address: u64, buf: &mut [u8]) -> ControlResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.assert_open()?;
        inner.read_mem(address, buf)
    }

    fn read_reg(&mut self, address: u64) -> ControlResult<u32> {
        let mut inner = self.inner.lock().unwrap();
        inner.assert_open()?;
        inner.read_reg(address)
    }

    fn write(&mut self, address: u64, data: &[u8]) -> ControlResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.assert_open()?;
        inner.write_mem(address, data)
    }

    fn write_reg(&mut self, address: u64, data: u32) -> ControlResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.assert_open()?;
        inner.write_reg(address, data)
    }

    fn genapi(&mut self) -> ControlResult<String> {
        let mut inner = self.inner.lock().unwrap();
        inner.assert_open()?;
        inner.genapi()
    }

    fn enable_streaming(&mut self) -> ControlResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.assert_open()?;
        inner.enable_streaming()
    }

    fn disable_streaming(&mut self) -> ControlResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.assert_open()?;
        inner.disable_streaming()
    }
}

impl Drop for ControlHandle {
    fn drop(&mut self) {
        self.stop_heartbeat();
        if self.is_opened() {
            // Best effort CCP release.
            self.inner.lock().unwrap().close().ok();
        }
    }
}

impl From<ControlHandle> for Box<dyn DeviceControl> {
    fn from(ctrl: ControlHandle) -> Self {
        Box::new(ctrl)
    }
}

macro_rules! align {
    ($data:expr) => {
        ($data + 3) & !0b11
    };
}

#[derive(Debug, Clone)]
struct ConnectionConfig {
    open_mode: OpenMode,
    /// Timeout of one transaction attempt.
    timeout: time::Duration,
    /// Retransmissions before a transaction fails with `Timeout`.
    retry_count: u16,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            open_mode: OpenMode::default(),
            timeout: INITIAL_TIMEOUT,
            retry_count: DEFAULT_RETRY_COUNT,
        }
    }
}

#[derive(Debug)]
pub(super) struct ControlHandleInner {
    sock: UdpSocket,
    config: ConnectionConfig,
    next_req_id: u16,
    buffer: Vec<u8>,
    capability: Option<GvcpCapability>,
    is_opened: bool,
    disconnected: bool,
    stream_host_port: Option<u16>,
}

impl ControlHandleInner {
    async fn new(addr: std::net::SocketAddr) -> ControlResult<Self> {
        let sock = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|err| ControlError::Io(err.into()))?;
        sock.connect(addr)
            .await
            .map_err(|err| ControlError::Io(err.into()))?;

        Ok(Self {
            sock,
            config: ConnectionConfig::default(),
            next_req_id: 1,
            buffer: vec![0; GVCP_BUFFER_SIZE],
            capability: None,
            is_opened: false,
            disconnected: false,
            stream_host_port: None,
        })
    }

    fn assert_open(&self) -> ControlResult<()> {
        if self.disconnected {
            Err(ControlError::Disconnected)
        } else if !self.is_opened {
            Err(ControlError::NotOpened)
        } else {
            Ok(())
        }
    }

    /// Request id of the next transaction; 0 is reserved and skipped on
    /// wrap.
    fn next_request_id(&mut self) -> u16 {
        let id = self.next_req_id;
        self.next_req_id = self.next_req_id.checked_add(1).unwrap_or(1);
        id
    }

    /// Runs one reliable transaction.
    ///
    /// Retransmissions reuse the request id; answers with a foreign id
    /// are discarded while the attempt's budget keeps running; a pending
    /// ack extends the running attempt's deadline without consuming a
    /// retry.
    fn transaction<'a, T, U>(&'a mut self, command: T) -> ControlResult<U>
    where
        T: CommandData,
        U: ack::ParseAckData<'a>,
    {
        let request_id = self.next_request_id();
        let kind = command.kind();
        let packet = command.finalize(request_id);
        let mut send_buf = Vec::with_capacity(packet.length());
        packet.serialize(&mut send_buf)?;

        let config = self.config.clone();
        let sock = &self.sock;
        let recv_buf = &mut self.buffer;

        let received_len = task::block_on(async move {
            for attempt in 0..=config.retry_count {
                if attempt > 0 {
                    debug!(request_id, attempt, "retransmitting gvcp command");
                }
                sock.send(&send_buf)
                    .await
                    .map_err(|e| ControlError::Io(e.into()))?;

                let mut deadline = time::Instant::now() + config.timeout;
                loop {
                    let remaining = match deadline.checked_duration_since(time::Instant::now()) {
                        Some(remaining) => remaining,
                        None => break,
                    };
                    let len = match future::timeout(remaining, sock.recv(&mut recv_buf[..])).await
                    {
                        Ok(Ok(len)) => len,
                        Ok(Err(e)) => return Err(ControlError::Io(e.into())),
                        Err(_) => break,
                    };

                    let parsed = match ack::AckPacket::parse(&recv_buf[..len]) {
                        Ok(parsed) => parsed,
                        Err(err) => {
                            warn!(%err, "discarding malformed gvcp ack");
                            continue;
                        }
                    };
                    if !parsed.is_ack_for(kind, request_id) {
                        debug!(
                            got = parsed.request_id(),
                            expected = request_id,
                            "discarding ack with foreign request id"
                        );
                        continue;
                    }

                    if parsed.ack_kind() == ack::AckKind::Pending {
                        let pending: ack::Pending = parsed.ack_data_as()?;
                        debug!(waiting_time = ?pending.waiting_time(), "pending ack");
                        deadline = time::Instant::now() + pending.waiting_time();
                        continue;
                    }

                    if !parsed.status().is_success() {
                        return Err(ControlError::Protocol(parsed.status().kind().into()));
                    }

                    return Ok(len);
                }
            }
            Err(ControlError::Timeout)
        })?;

        ack::AckPacket::parse(&self.buffer[..received_len])?
            .ack_data_as()
            .map_err(Into::into)
    }

    fn capability(&mut self) -> ControlResult<GvcpCapability> {
        if let Some(capability) = self.capability {
            Ok(capability)
        } else {
            let capability = Bootstrap::new().gvcp_capability(self)?;
            self.capability = Some(capability);
            Ok(capability)
        }
    }

    fn read_reg_fallback(&mut self, mut address: u64, buf: &mut [u8]) -> ControlResult<()> {
        for buf_chunk in buf.chunks_mut(4) {
            let data = self.read_reg(address)?.to_be_bytes();
            let chunk_len = buf_chunk.len();
            buf_chunk.copy_from_slice(&data[..chunk_len]);
            address += chunk_len as u64;
        }
        Ok(())
    }

    fn write_reg_fallback(&mut self, mut address: u64, data: &[u8]) -> ControlResult<()> {
        for data_chunk in data.chunks(4) {
            let mut aligned = [0; 4];
            aligned[..data_chunk.len()].copy_from_slice(data_chunk);
            self.write_reg(address, u32::from_be_bytes(aligned))?;
            address += data_chunk.len() as u64;
        }
        Ok(())
    }

    fn enable_streaming(&mut self) -> ControlResult<()> {
        if Bootstrap::new().number_of_stream_channels(self)? == 0 {
            return Err(ControlError::NoStreamChannel);
        }
        let host_port = self
            .stream_host_port
            .ok_or(ControlError::NoStreamChannel)?;
        let host_addr = match self
            .sock
            .local_addr()
            .map_err(|e| ControlError::Io(e.into()))?
            .ip()
        {
            std::net::IpAddr::V4(addr) => addr,
            std::net::IpAddr::V6(_) => {
                return Err(ControlError::NotSupported(
                    "GigE Vision streams over IPv4 only".into(),
                ))
            }
        };

        let sr = StreamRegister::new(0);
        sr.set_destination_address(self, host_addr)?;
        sr.set_channel_port(self, host_port)?;
        Ok(())
    }

    fn disable_streaming(&mut self) -> ControlResult<()> {
        StreamRegister::new(0).set_channel_port(self, 0)
    }

    fn open(&mut self) -> ControlResult<()> {
        let bs = Bootstrap::new();
        match self.config.open_mode {
            OpenMode::Exclusive => {
                let ccp = ControlChannelPrivilege::new().enable_exclusive_access();
                bs.set_control_channel_privilege(self, ccp)?;
            }
            OpenMode::Control => {
                let ccp = ControlChannelPrivilege::new().enable_control_access();
                bs.set_control_channel_privilege(self, ccp)?;
            }
            OpenMode::MonitorAccess => {
                let ccp = bs.control_channel_privilege(self)?;
                if ccp.is_exclusive_access_enabled() {
                    return Err(ControlError::Busy);
                }
            }
        }

        let capability = bs.gvcp_capability(self)?;
        if capability.is_pending_ack_supported() {
            // The device tells how long a pending operation may take.
            if let Ok(timeout) = bs.pending_timeout(self) {
                if timeout > self.config.timeout {
                    self.config.timeout = timeout;
                }
            }
        }
        self.capability = Some(capability);

        self.is_opened = true;
        Ok(())
    }

    fn close(&mut self) -> ControlResult<()> {
        if self.is_opened && !self.disconnected {
            match self.config.open_mode {
                OpenMode::Exclusive | OpenMode::Control => {
                    let bs = Bootstrap::new();
                    bs.set_control_channel_privilege(self, ControlChannelPrivilege::new())?;
                }
                OpenMode::MonitorAccess => {}
            }
        }
        self.is_opened = false;
        Ok(())
    }

    fn read_mem(&mut self, mut address: u64, buf: &mut [u8]) -> ControlResult<()> {
        if buf.len() <= 4 {
            return self.read_reg_fallback(address, buf);
        }

        for buf_chunk in buf.chunks_mut(usize::from(cmd::ReadMem::MAXIMUM_READ_LENGTH)) {
            let target_addr: u32 = address.try_into().map_err(|_| {
                ControlError::InvalidData(anyhow::Error::msg(
                    "`ReadMem` addresses are limited to 32 bits",
                ))
            })?;
            let read_len = buf_chunk.len() as u16;
            let aligned_read_len = align!(read_len);

            let command = cmd::ReadMem::new(target_addr, aligned_read_len)?;
            let answer: ack::ReadMem = self.transaction(command)?;
            buf_chunk.copy_from_slice(&answer.data()[..read_len as usize]);

            address += u64::from(read_len);
        }

        Ok(())
    }

    fn read_reg(&mut self, address: u64) -> ControlResult<u32> {
        let address: u32 = address.try_into().map_err(|_| {
            ControlError::InvalidData(anyhow::Error::msg(
                "`ReadReg` addresses are limited to 32 bits",
            ))
        })?;

        let mut command = cmd::ReadReg::new();
        command.add_entry(address)?;
        let answer: ack::ReadReg = self.transaction(command)?;
        answer
            .iter()
            .next()
            .map(|reg| u32::from_be_bytes(*reg))
            .ok_or_else(|| {
                ControlError::Io(anyhow::Error::msg("no entry in a `ReadReg` ack"))
            })
    }

    fn write_mem(&mut self, mut address: u64, data: &[u8]) -> ControlResult<()> {
        let capability = self.capability()?;
        if data.len() <= 4 || !capability.is_write_mem_supported() {
            return self.write_reg_fallback(address, data);
        }

        for data_chunk in data.chunks(cmd::WriteMem::MAXIMUM_DATA_LENGTH) {
            let target_addr: u32 = address.try_into().map_err(|_| {
                ControlError::InvalidData(anyhow::Error::msg(
                    "`WriteMem` addresses are limited to 32 bits",
                ))
            })?;
            let aligned_len = align!(data_chunk.len());

            let _: ack::WriteMem = if aligned_len == data_chunk.len() {
                self.transaction(cmd::WriteMem::new(target_addr, data_chunk)?)?
            } else {
                let mut aligned = vec![0; aligned_len];
                aligned[..data_chunk.len()].copy_from_slice(data_chunk);
                self.transaction(cmd::WriteMem::new(target_addr, &aligned)?)?
            };

            address += data_chunk.len() as u64;
        }

        Ok(())
    }

    fn write_reg(&mut self, address: u64, data: u32) -> ControlResult<()> {
        let address: u32 = address.try_into().map_err(|_| {
            ControlError::InvalidData(anyhow::Error::msg(
                "`WriteReg` addresses are limited to 32 bits",
            ))
        })?;

        let mut command = cmd::WriteReg::new();
        command.add_entry(cmd::WriteRegEntry::new(address, data)?)?;
        let answer: ack::WriteReg = self.transaction(command)?;

        if answer.entry_num() == 1 {
            Ok(())
        } else {
            Err(ControlError::Io(anyhow::Error::msg(
                "`WriteReg` entry count mismatch",
            )))
        }
    }

    fn genapi(&mut self) -> ControlResult<String> {
        let url_string = Bootstrap::new().first_url(self)?;
        if url_string.is_empty() {
            return Err(ControlError::GenICamNotFound);
        }
        tracing::info!(url = %url_string, "retrieving genicam file");

        let (xml, compression_type) = match XmlFileLocation::parse(&url_string)? {
            XmlFileLocation::Device {
                address,
                size,
                compression_type,
            } => {
                let mut buf = vec![0; size as usize];
                self.read_mem(address, &mut buf)?;
                (buf, compression_type)
            }

            XmlFileLocation::Net {
                url,
                compression_type,
            } => {
                let response = ureq::get(&url)
                    .call()
                    .map_err(|err| ControlError::Io(err.into()))?;
                if response.status() == 200 {
                    let mut buf = vec![];
                    response
                        .into_reader()
                        .read_to_end(&mut buf)
                        .map_err(|err| ControlError::Io(err.into()))?;
                    (buf, compression_type)
                } else {
                    return Err(ControlError::Io(anyhow::Error::msg(format!(
                        "can't retrieve the genicam file from `{}`",
                        url
                    ))));
                }
            }
        };

        match compression_type {
            CompressionType::Zip => {
                let xml = unzip_genxml(xml)?;
                Ok(String::from_utf8_lossy(&xml).into())
            }
            CompressionType::Uncompressed => Ok(String::from_utf8_lossy(&xml).into()),
        }
    }
}

// The bootstrap register wrappers are generic over `DeviceControl` and
// drive the inner handle directly, including during `open` itself.
impl DeviceControl for ControlHandleInner {
    fn open(&mut self) -> ControlResult<()> {
        ControlHandleInner::open(self)
    }

    fn close(&mut self) -> ControlResult<()> {
        ControlHandleInner::close(self)
    }

    fn is_opened(&self) -> bool {
        self.is_opened
    }

    fn read(&mut self, address: u64, buf: &mut [u8]) -> ControlResult<()> {
        self.read_mem(address, buf)
    }

    fn read_reg(&mut self, address: u64) -> ControlResult<u32> {
        ControlHandleInner::read_reg(self, address)
    }

    fn write(&mut self, address: u64, data: &[u8]) -> ControlResult<()> {
        self.write_mem(address, data)
    }

    fn write_reg(&mut self, address: u64, data: u32) -> ControlResult<()> {
        ControlHandleInner::write_reg(self, address, data)
    }

    fn genapi(&mut self) -> ControlResult<String> {
        ControlHandleInner::genapi(self)
    }

    fn enable_streaming(&mut self) -> ControlResult<()> {
        ControlHandleInner::enable_streaming(self)
    }

    fn disable_streaming(&mut self) -> ControlResult<()> {
        ControlHandleInner::disable_streaming(self)
    }
}

/// Location of the genicam file, parsed from `FirstURL`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum XmlFileLocation {
    /// `Local:file.xml;A0000;1000` (hex address and size).
    Device {
        address: u64,
        size: u64,
        compression_type: CompressionType,
    },
    /// `http://vendor.example/file.xml`.
    Net {
        url: String,
        compression_type: CompressionType,
    },
}

impl XmlFileLocation {
    fn parse(url: &str) -> ControlResult<Self> {
        let compression_type = if url.to_ascii_lowercase().contains(".zip") {
            CompressionType::Zip
        } else {
            CompressionType::Uncompressed
        };

        if let Some(local) = url.strip_prefix("Local:").or_else(|| url.strip_prefix("local:")) {
            let mut parts = local.split(';');
            let _file_name = parts.next();
            let address = parts.next().ok_or_else(|| {
                ControlError::InvalidData(anyhow::Error::msg("missing address in genicam URL"))
            })?;
            let size = parts.next().ok_or_else(|| {
                ControlError::InvalidData(anyhow::Error::msg("missing size in genicam URL"))
            })?;
            let address = u64::from_str_radix(address.trim_start_matches("0x"), 16)
                .map_err(|e| ControlError::InvalidData(anyhow::Error::msg(e.to_string())))?;
            let size = u64::from_str_radix(size.trim_start_matches("0x"), 16)
                .map_err(|e| ControlError::InvalidData(anyhow::Error::msg(e.to_string())))?;
            Ok(Self::Device {
                address,
                size,
                compression_type,
            })
        } else if let Ok(parsed) = url::Url::parse(url) {
            match parsed.scheme() {
                "http" | "https" => Ok(Self::Net {
                    url: parsed.into(),
                    compression_type,
                }),
                scheme => Err(ControlError::NotSupported(
                    format!("unsupported genicam file location scheme: {}", scheme).into(),
                )),
            }
        } else {
            Err(ControlError::NotSupported(
                format!("unsupported genicam file location: {}", url).into(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genicam_url_forms() {
        let loc = XmlFileLocation::parse("Local:synth.xml;A0000;1FD0").unwrap();
        assert_eq!(
            loc,
            XmlFileLocation::Device {
                address: 0xA0000,
                size: 0x1FD0,
                compression_type: CompressionType::Uncompressed,
            }
        );

        let loc = XmlFileLocation::parse("Local:synth.zip;0x1000;0x200").unwrap();
        assert!(matches!(
            loc,
            XmlFileLocation::Device {
                compression_type: CompressionType::Zip,
                ..
            }
        ));

        let loc = XmlFileLocation::parse("http://vendor.example/genicam/synth.xml").unwrap();
        assert!(matches!(loc, XmlFileLocation::Net { .. }));

        assert!(XmlFileLocation::parse("file:///tmp/synth.xml").is_err());
        assert!(XmlFileLocation::parse("garbage").is_err());
    }
}

struct HeartbeatLoop {
    inner: Arc<Mutex<ControlHandleInner>>,
    period: time::Duration,
    event_rx: async_channel::Receiver<HeartbeatEvent>,
    need_heartbeat: bool,
    control_lost: Arc<Mutex<Option<ControlLostHandler>>>,
}

impl HeartbeatLoop {
    async fn run(mut self, _completion_tx: oneshot::Sender<()>) {
        if !self.need_heartbeat {
            // Monitors don't own the channel; just wait for shutdown.
            while let Ok(event) = self.event_rx.recv().await {
                if matches!(event, HeartbeatEvent::ChannelClosed) {
                    return;
                }
            }
            return;
        }

        let mut failures = 0_u32;
        loop {
            select! {
                _ = task::sleep(self.period).fuse() => {
                    // Any acknowledged transaction resets the device's
                    // heartbeat timer; CCP is a benign read.
                    let res = Bootstrap::new()
                        .control_channel_privilege(&mut *self.inner.lock().unwrap());
                    match res {
                        Ok(_) => failures = 0,
                        Err(err) => {
                            failures += 1;
                            warn!(%err, failures, "heartbeat failed");
                            if failures >= HEARTBEAT_FAILURE_LIMIT {
                                error!("control lost: heartbeat failure limit reached");
                                self.inner.lock().unwrap().disconnected = true;
                                if let Some(handler) =
                                    self.control_lost.lock().unwrap().as_mut()
                                {
                                    handler();
                                }
                                return;
                            }
                        }
                    }
                }
                event = self.event_rx.recv().fuse() => {
                    match event {
                        Ok(HeartbeatEvent::PeriodChanged(period)) => self.period = period,
                        Ok(HeartbeatEvent::ChannelClosed) | Err(_) => return,
                    }
                }
            }
        }
    }
}

enum HeartbeatEvent {
    PeriodChanged(time::Duration),
    ChannelClosed,
}
