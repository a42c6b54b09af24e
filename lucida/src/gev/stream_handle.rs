/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The GVSP receive pipeline: one background thread per stream
//! reassembles UDP datagrams into image buffers, detecting packet loss,
//! tolerating out-of-order arrival, requesting retransmissions and
//! expiring stalled frames.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    net::SocketAddr,
    sync::mpsc,
    sync::{Arc, Mutex},
    time,
};

use async_std::{future, net::UdpSocket, task};
use tracing::{debug, error, info, warn};

use lucida_device::gev::{
    protocol::{
        cmd::{self, CommandData},
        stream::{Leader, Packet, PacketContent, PayloadKind, Trailer},
    },
    GVCP_PORT,
};

use crate::{
    payload::{
        Buffer, BufferPart, BufferPayloadType, BufferStatus, BufferSupply, StreamCallback,
        StreamEvent, StreamStatistics,
    },
    DeviceControl, PayloadStream, StreamError, StreamResult,
};

use super::register_map::StreamRegister;

/// IP + UDP + GVSP header bytes counted by `GevSCPSPacketSize` but not
/// part of the packet's payload data.
const PACKET_PROTOCOL_OVERHEAD: usize = 20 + 8 + 8;

/// IP + UDP header bytes counted by `GevSCPSPacketSize` but invisible to
/// the receiving socket.
const PACKET_IP_UDP_OVERHEAD: usize = 20 + 8;

/// Socket receive buffer applied under [`SocketBufferPolicy::Auto`].
const AUTO_SOCKET_BUFFER_SIZE: usize = 4 << 20;

/// Smallest packet size a conforming device must support.
const MINIMUM_PACKET_SIZE: u16 = 576;
/// Largest packet size worth probing (jumbo frames).
const MAXIMUM_PACKET_SIZE: u16 = 9000;

const TEST_PACKET_TIMEOUT: time::Duration = time::Duration::from_millis(200);

/// Sizing of the data socket's kernel receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketBufferPolicy {
    Fixed(usize),
    Auto,
}

/// Whether lost packets are re-requested from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResendPolicy {
    Never,
    Always,
}

/// When the stream packet size is (re)negotiated before acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketSizeAdjustment {
    /// Keep whatever the device currently uses.
    Disable,
    /// Probe the current size once; negotiate only when the probe fails.
    OnFailureOnce,
    /// Always negotiate.
    Always,
}

#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Silence on a frame longer than this triggers the resend checks.
    pub packet_timeout: time::Duration,
    /// A frame inactive longer than this is expired to the output queue.
    pub frame_retention: time::Duration,
    pub resend_policy: ResendPolicy,
    /// Resend attempts per missing range before the gap is final.
    pub max_resend_retries: u16,
    pub socket_buffer: SocketBufferPolicy,
    pub packet_size_adjustment: PacketSizeAdjustment,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            packet_timeout: time::Duration::from_millis(40),
            frame_retention: time::Duration::from_millis(200),
            resend_policy: ResendPolicy::Always,
            max_resend_retries: 5,
            socket_buffer: SocketBufferPolicy::Auto,
            packet_size_adjustment: PacketSizeAdjustment::OnFailureOnce,
        }
    }
}

/// Per-acquisition parameters, read from the device when the loop starts
/// or injected with [`StreamHandle::set_params`].
#[derive(Debug, Clone)]
pub struct StreamParams {
    /// Payload bytes carried by one GVSP data packet.
    pub packet_data_size: usize,
    /// Control address of the device, target of resend requests.
    pub device_addr: Option<SocketAddr>,
    pub stream_channel_index: u16,
}

impl StreamParams {
    /// Derives the parameters from the device's stream channel
    /// registers.
    pub fn from_control<Ctrl: DeviceControl + ?Sized>(ctrl: &mut Ctrl) -> StreamResult<Self> {
        let packet_size = StreamRegister::new(0)
            .packet_size(ctrl)
            .map_err(|e| StreamError::Io(anyhow::Error::msg(e.to_string())))?;
        let size = usize::from(packet_size.size());
        if size <= PACKET_PROTOCOL_OVERHEAD {
            return Err(StreamError::InvalidPayload(
                "stream packet size is smaller than the protocol overhead".into(),
            ));
        }
        Ok(Self {
            packet_data_size: size - PACKET_PROTOCOL_OVERHEAD,
            device_addr: None,
            stream_channel_index: 0,
        })
    }
}

/// Receives the stream of a `GigE` device.
pub struct StreamHandle {
    sock: Arc<UdpSocket>,
    local_port: u16,
    options: StreamOptions,
    params: Option<StreamParams>,
    device_addr: Option<SocketAddr>,
    statistics: Arc<Mutex<StreamStatistics>>,
    callback: Arc<Mutex<Option<StreamCallback>>>,
    cancellation_tx: Option<mpsc::SyncSender<()>>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl StreamHandle {
    pub fn new() -> StreamResult<Self> {
        Self::with_options(StreamOptions::default())
    }

    pub fn with_options(options: StreamOptions) -> StreamResult<Self> {
        let sock = bind_data_socket(&options)?;
        let local_port = sock
            .local_addr()
            .map_err(|e| StreamError::Io(e.into()))?
            .port();
        Ok(Self {
            sock: Arc::new(sock),
            local_port,
            options,
            params: None,
            device_addr: None,
            statistics: Arc::new(Mutex::new(StreamStatistics::default())),
            callback: Arc::new(Mutex::new(None)),
            cancellation_tx: None,
            join_handle: None,
        })
    }

    /// UDP port the device must target (`GevSCP0StreamChannelPort`).
    #[must_use]
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    #[must_use]
    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    /// Overrides the parameters read from the device at loop start.
    pub fn set_params(&mut self, params: StreamParams) {
        self.params = Some(params);
    }

    /// Control address of the device, used as the resend target when the
    /// parameters are read from the device.
    pub fn set_device_addr(&mut self, addr: SocketAddr) {
        self.device_addr = Some(addr);
    }

    /// Registers the callback invoked on the receive thread for stream
    /// events.
    pub fn set_callback(&mut self, callback: StreamCallback) {
        *self.callback.lock().unwrap() = Some(callback);
    }

    /// Snapshot of the counters since the receive thread last started.
    #[must_use]
    pub fn statistics(&self) -> StreamStatistics {
        *self.statistics.lock().unwrap()
    }

    /// One counter by name, `None` for unknown names.
    #[must_use]
    pub fn statistic(&self, name: &str) -> Option<u64> {
        self.statistics().value_of(name)
    }

    /// Fires one test packet of `size` and reports whether it arrived.
    fn probe_packet_size(
        &self,
        ctrl: &mut dyn DeviceControl,
        size: u16,
    ) -> StreamResult<bool> {
        let control_error =
            |e: crate::ControlError| StreamError::Io(anyhow::Error::msg(e.to_string()));

        let sr = StreamRegister::new(0);
        let word = sr
            .packet_size(ctrl)
            .map_err(control_error)?
            .with_size(size)
            .fire_test_packet();
        sr.set_packet_size(ctrl, word).map_err(control_error)?;
        Ok(self.recv_test_packet(
            usize::from(size) - PACKET_IP_UDP_OVERHEAD,
            TEST_PACKET_TIMEOUT,
        ))
    }

    /// Finds the largest packet size that traverses the network path,
    /// halving on failed probes, and writes it to the packet-size
    /// register. The stream channel must already target this handle's
    /// socket.
    pub fn negotiate_packet_size(&self, ctrl: &mut dyn DeviceControl) -> StreamResult<u16> {
        let control_error =
            |e: crate::ControlError| StreamError::Io(anyhow::Error::msg(e.to_string()));

        let sr = StreamRegister::new(0);
        let current = sr.packet_size(ctrl).map_err(control_error)?.size();
        let mut size = if current == 0 {
            MAXIMUM_PACKET_SIZE
        } else {
            current.clamp(MINIMUM_PACKET_SIZE, MAXIMUM_PACKET_SIZE)
        };

        while size >= MINIMUM_PACKET_SIZE {
            if self.probe_packet_size(ctrl, size)? {
                let word = sr.packet_size(ctrl).map_err(control_error)?.with_size(size);
                sr.set_packet_size(ctrl, word).map_err(control_error)?;
                info!(size, "packet size negotiated");
                return Ok(size);
            }
            size /= 2;
        }

        Err(StreamError::Timeout)
    }

    fn adjust_packet_size(&self, ctrl: &mut dyn DeviceControl) -> StreamResult<()> {
        match self.options.packet_size_adjustment {
            PacketSizeAdjustment::Disable => Ok(()),
            PacketSizeAdjustment::OnFailureOnce => {
                let sr = StreamRegister::new(0);
                let current = sr
                    .packet_size(ctrl)
                    .map_err(|e| StreamError::Io(anyhow::Error::msg(e.to_string())))?
                    .size();
                if current != 0 && self.probe_packet_size(ctrl, current)? {
                    Ok(())
                } else {
                    self.negotiate_packet_size(ctrl).map(|_| ())
                }
            }
            PacketSizeAdjustment::Always => self.negotiate_packet_size(ctrl).map(|_| ()),
        }
    }

    /// Waits for one datagram of at least `min_len` bytes; used by the
    /// packet-size negotiation to observe test packets.
    fn recv_test_packet(&self, min_len: usize, timeout: time::Duration) -> bool {
        let mut buf = vec![0; min_len + 64];
        let deadline = time::Instant::now() + timeout;
        task::block_on(async {
            loop {
                let remaining = match deadline.checked_duration_since(time::Instant::now()) {
                    Some(remaining) => remaining,
                    None => return false,
                };
                match future::timeout(remaining, self.sock.recv(&mut buf)).await {
                    Ok(Ok(len)) if len >= min_len => return true,
                    Ok(Ok(_)) | Ok(Err(_)) => continue,
                    Err(_) => return false,
                }
            }
        })
    }
}

fn bind_data_socket(options: &StreamOptions) -> StreamResult<UdpSocket> {
    let sock = socket2::Socket::new(
        socket2::Domain::IPV4,
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP),
    )
    .map_err(|e| StreamError::Io(e.into()))?;

    let buffer_size = match options.socket_buffer {
        SocketBufferPolicy::Fixed(size) => size,
        SocketBufferPolicy::Auto => AUTO_SOCKET_BUFFER_SIZE,
    };
    if let Err(err) = sock.set_recv_buffer_size(buffer_size) {
        warn!(%err, "couldn't size the stream socket receive buffer");
    }

    let addr: SocketAddr = "0.0.0.0:0".parse().unwrap();
    sock.bind(&addr.into()).map_err(|e| StreamError::Io(e.into()))?;
    let std_sock: std::net::UdpSocket = sock.into();
    std_sock
        .set_nonblocking(true)
        .map_err(|e| StreamError::Io(e.into()))?;
    Ok(UdpSocket::from(std_sock))
}

impl PayloadStream for StreamHandle {
    fn open(&mut self) -> StreamResult<()> {
        Ok(())
    }

    fn close(&mut self) -> StreamResult<()> {
        if self.is_loop_running() {
            self.stop_streaming_loop()?;
        }
        Ok(())
    }

    fn start_streaming_loop(
        &mut self,
        supply: BufferSupply,
        ctrl: &mut dyn DeviceControl,
    ) -> StreamResult<()> {
        if self.is_loop_running() {
            return Err(StreamError::InStreaming);
        }

        let mut params = match self.params.clone() {
            Some(params) => params,
            None => {
                // Settle the packet size before deriving the per-packet
                // data size from it.
                self.adjust_packet_size(ctrl)?;
                StreamParams::from_control(ctrl)?
            }
        };
        if params.device_addr.is_none() {
            params.device_addr = self.device_addr;
        }

        *self.statistics.lock().unwrap() = StreamStatistics::default();

        // Capacity 0 makes the channel a rendezvous: a send blocks until
        // the loop observes it, bounding the shutdown latency to one
        // poll period.
        let (cancellation_tx, cancellation_rx) = mpsc::sync_channel(0);
        self.cancellation_tx = Some(cancellation_tx);

        let receive_loop = ReceiveLoop {
            sock: self.sock.clone(),
            supply,
            params,
            options: self.options.clone(),
            statistics: self.statistics.clone(),
            callback: self.callback.clone(),
            cancellation_rx,
        };
        self.join_handle = Some(std::thread::spawn(|| receive_loop.run()));

        info!("started gvsp receive loop");
        Ok(())
    }

    fn stop_streaming_loop(&mut self) -> StreamResult<()> {
        if let Some(cancellation_tx) = self.cancellation_tx.take() {
            cancellation_tx.send(()).map_err(|_| {
                StreamError::Poisoned("the receive loop vanished without being stopped".into())
            })?;
        }
        if let Some(join_handle) = self.join_handle.take() {
            join_handle
                .join()
                .map_err(|_| StreamError::Poisoned("the receive loop panicked".into()))?;
        }

        info!("stopped gvsp receive loop");
        Ok(())
    }

    fn is_loop_running(&self) -> bool {
        self.cancellation_tx.is_some()
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            error!(%err);
        }
    }
}

impl From<StreamHandle> for Box<dyn PayloadStream> {
    fn from(strm: StreamHandle) -> Self {
        Box::new(strm)
    }
}

/// Reassembly state of one in-flight frame.
struct FrameState {
    buffer: Buffer,
    leader_seen: bool,
    trailer_seen: bool,
    payload_kind: Option<PayloadKind>,
    timestamp: u64,
    image: Option<lucida_device::gev::protocol::stream::ImageInfo>,
    trailer_parts: Vec<lucida_device::gev::protocol::stream::PartInfo>,
    declared_payload_size: Option<u64>,
    expected_packet_count: Option<u32>,
    received_packet_count: u32,
    highest_packet_id: u32,
    bytes_high_water: usize,
    missing: BTreeSet<u32>,
    /// `(first, last) -> (last request tick, request count)`.
    resend_requested: HashMap<(u32, u32), (time::Instant, u16)>,
    last_activity: time::Instant,
    error_status: Option<BufferStatus>,
}

impl FrameState {
    fn new(buffer: Buffer) -> Self {
        Self {
            buffer,
            leader_seen: false,
            trailer_seen: false,
            payload_kind: None,
            timestamp: 0,
            image: None,
            trailer_parts: Vec::new(),
            declared_payload_size: None,
            expected_packet_count: None,
            received_packet_count: 0,
            highest_packet_id: 0,
            bytes_high_water: 0,
            missing: BTreeSet::new(),
            resend_requested: HashMap::new(),
            last_activity: time::Instant::now(),
            error_status: None,
        }
    }

    fn is_complete(&self) -> bool {
        self.leader_seen
            && self.trailer_seen
            && self.missing.is_empty()
            && self
                .expected_packet_count
                .map_or(true, |expected| self.highest_packet_id >= expected)
    }
}

struct ReceiveLoop {
    sock: Arc<UdpSocket>,
    supply: BufferSupply,
    params: StreamParams,
    options: StreamOptions,
    statistics: Arc<Mutex<StreamStatistics>>,
    callback: Arc<Mutex<Option<StreamCallback>>>,
    cancellation_rx: mpsc::Receiver<()>,
}

impl ReceiveLoop {
    fn run(mut self) {
        self.emit(StreamEvent::Init, None);

        let resend_sock = self.open_resend_socket();
        let mut frames: BTreeMap<u64, FrameState> = BTreeMap::new();
        let mut last_completed: Option<u64> = None;
        let mut datagram =
            vec![0; self.params.packet_data_size + lucida_device::gev::protocol::stream::EXTENDED_HEADER_LEN + 64];

        loop {
            // Stop when signalled or when the handle was dropped.
            match self.cancellation_rx.try_recv() {
                Ok(()) | Err(mpsc::TryRecvError::Disconnected) => break,
                Err(mpsc::TryRecvError::Empty) => {}
            }

            let poll_timeout = self.next_poll_timeout(&frames);
            let received =
                task::block_on(future::timeout(poll_timeout, self.sock.recv(&mut datagram)));
            match received {
                Err(_elapsed) => {}
                Ok(Err(err)) => {
                    error!(%err, "stream socket failed; receive loop exits");
                    self.supply.send(Err(StreamError::Io(err.into()))).ok();
                    break;
                }
                Ok(Ok(len)) => {
                    self.handle_datagram(
                        &datagram[..len],
                        &mut frames,
                        &mut last_completed,
                        resend_sock.as_ref(),
                    );
                }
            }

            self.run_timers(&mut frames, &mut last_completed, resend_sock.as_ref());
        }

        // Frames still in flight are aborted back to the caller.
        for (_, mut frame) in std::mem::take(&mut frames) {
            frame.buffer.status = BufferStatus::Aborted;
            self.statistics.lock().unwrap().n_aborted += 1;
            self.deliver(frame.buffer);
        }

        self.emit(StreamEvent::Exit, None);
    }

    fn open_resend_socket(&self) -> Option<std::net::UdpSocket> {
        if self.options.resend_policy == ResendPolicy::Never {
            return None;
        }
        self.params.device_addr?;
        match std::net::UdpSocket::bind("0.0.0.0:0") {
            Ok(sock) => Some(sock),
            Err(err) => {
                warn!(%err, "couldn't open the resend socket; resend disabled");
                None
            }
        }
    }

    /// Poll timeout: the nearest of one packet timeout and the earliest
    /// frame-retention deadline.
    fn next_poll_timeout(&self, frames: &BTreeMap<u64, FrameState>) -> time::Duration {
        let now = time::Instant::now();
        let mut timeout = self.options.packet_timeout;
        for frame in frames.values() {
            let deadline = frame.last_activity + self.options.frame_retention;
            let remaining = deadline
                .checked_duration_since(now)
                .unwrap_or(time::Duration::from_millis(1));
            timeout = timeout.min(remaining);
        }
        timeout.max(time::Duration::from_millis(1))
    }

    fn handle_datagram(
        &mut self,
        data: &[u8],
        frames: &mut BTreeMap<u64, FrameState>,
        last_completed: &mut Option<u64>,
        resend_sock: Option<&std::net::UdpSocket>,
    ) {
        let packet = match Packet::parse(data) {
            Ok(packet) => packet,
            Err(err) => {
                debug!(%err, "ignoring malformed gvsp datagram");
                self.statistics.lock().unwrap().n_ignored_bytes += data.len() as u64;
                return;
            }
        };
        self.statistics.lock().unwrap().n_received_packets += 1;

        let block_id = packet.header.block_id;

        // Blocks older than anything already delivered are late
        // stragglers; drop them.
        if !frames.contains_key(&block_id)
            && last_completed.map_or(false, |last| block_id <= last)
        {
            self.statistics.lock().unwrap().n_ignored_bytes += data.len() as u64;
            return;
        }

        if !frames.contains_key(&block_id) {
            let buffer = match self.supply.try_pop_empty() {
                Some(buffer) => buffer,
                None => {
                    let mut stats = self.statistics.lock().unwrap();
                    stats.n_underruns += 1;
                    stats.n_ignored_bytes += data.len() as u64;
                    return;
                }
            };
            self.emit(StreamEvent::StartBuffer, Some(&buffer));
            frames.insert(block_id, FrameState::new(buffer));
        }
        let frame = frames.get_mut(&block_id).unwrap();
        frame.last_activity = time::Instant::now();

        if packet.header.flags.is_packet_resend() {
            self.statistics.lock().unwrap().n_resent_packets += 1;
        }

        match packet.content {
            PacketContent::Leader(leader) => Self::apply_leader(frame, &leader),
            PacketContent::Payload(data) => {
                self.apply_payload(frame, block_id, packet.header.packet_id, data, resend_sock);
            }
            PacketContent::Trailer(trailer) => {
                self.apply_trailer(frame, block_id, &trailer, resend_sock);
            }
            PacketContent::AllIn {
                leader,
                data,
                trailer,
            } => {
                Self::apply_leader(frame, &leader);
                self.apply_payload(frame, block_id, 1, data, resend_sock);
                self.apply_trailer(frame, block_id, &trailer, resend_sock);
            }
        }

        if frame.is_complete() || frame.error_status.is_some() {
            let frame = frames.remove(&block_id).unwrap();
            self.complete_frame(block_id, frame, last_completed);
        }
    }

    fn apply_leader(frame: &mut FrameState, leader: &Leader) {
        frame.leader_seen = true;
        frame.payload_kind = Some(leader.payload_kind);
        frame.timestamp = leader.timestamp;
        frame.image = leader.image;
    }

    fn apply_payload(
        &self,
        frame: &mut FrameState,
        block_id: u64,
        packet_id: u32,
        data: &[u8],
        resend_sock: Option<&std::net::UdpSocket>,
    ) {
        if packet_id == 0 {
            frame.error_status = Some(BufferStatus::WrongPacketId);
            return;
        }
        if let Some(expected) = frame.expected_packet_count {
            if packet_id > expected {
                frame.error_status = Some(BufferStatus::WrongPacketId);
                return;
            }
        }

        let offset = (packet_id as usize - 1) * self.params.packet_data_size;
        let end = offset + data.len();
        if end > frame.buffer.allocated_size() {
            // The caller's buffer can't hold the frame.
            frame.error_status = Some(BufferStatus::SizeMismatch);
            return;
        }
        frame.buffer.raw_mut()[offset..end].copy_from_slice(data);
        frame.bytes_high_water = frame.bytes_high_water.max(end);
        frame.received_packet_count += 1;
        self.statistics.lock().unwrap().n_transferred_bytes += data.len() as u64;

        if frame.missing.remove(&packet_id) {
            debug!(block_id, packet_id, "gap filled");
        } else if packet_id > frame.highest_packet_id + 1 {
            let first = frame.highest_packet_id + 1;
            let last = packet_id - 1;
            for id in first..=last {
                frame.missing.insert(id);
            }
            self.request_resend(frame, block_id, first, last, resend_sock);
        }
        frame.highest_packet_id = frame.highest_packet_id.max(packet_id);
    }

    fn apply_trailer(
        &self,
        frame: &mut FrameState,
        block_id: u64,
        trailer: &Trailer,
        resend_sock: Option<&std::net::UdpSocket>,
    ) {
        frame.trailer_seen = true;
        frame.declared_payload_size = Some(trailer.payload_size);
        frame.trailer_parts = trailer.parts.clone();
        if frame.payload_kind.is_none() {
            frame.payload_kind = Some(trailer.payload_kind);
        }

        let expected = if trailer.payload_size == 0 {
            0
        } else {
            ((trailer.payload_size - 1) / self.params.packet_data_size as u64 + 1) as u32
        };
        frame.expected_packet_count = Some(expected);

        // Packets lost at the tail never produced a gap; claim them now.
        if frame.highest_packet_id < expected {
            let first = frame.highest_packet_id + 1;
            for id in first..=expected {
                frame.missing.insert(id);
            }
            self.request_resend(frame, block_id, first, expected, resend_sock);
        }
    }

    fn request_resend(
        &self,
        frame: &mut FrameState,
        block_id: u64,
        first: u32,
        last: u32,
        resend_sock: Option<&std::net::UdpSocket>,
    ) {
        let sock = match resend_sock {
            Some(sock) if self.options.resend_policy == ResendPolicy::Always => sock,
            _ => return,
        };
        // One outstanding request per range.
        if frame.resend_requested.contains_key(&(first, last)) {
            return;
        }
        frame
            .resend_requested
            .insert((first, last), (time::Instant::now(), 1));
        self.send_resend(block_id, first, last, sock);
    }

    fn send_resend(&self, block_id: u64, first: u32, last: u32, sock: &std::net::UdpSocket) {
        let device_addr = match self.params.device_addr {
            Some(addr) => addr,
            None => return,
        };
        let command = if block_id > u64::from(u16::MAX) {
            cmd::PacketResend::with_extended_id(
                self.params.stream_channel_index,
                first,
                last,
                block_id,
            )
        } else {
            match cmd::PacketResend::with_unextended_id(
                self.params.stream_channel_index,
                first,
                last,
                block_id as u16,
            ) {
                Ok(command) => command,
                Err(err) => {
                    warn!(%err, "can't express the resend range");
                    return;
                }
            }
        };

        let packet = command.finalize(0);
        let mut buf = Vec::with_capacity(packet.length());
        if packet.serialize(&mut buf).is_ok() {
            let target = SocketAddr::new(device_addr.ip(), GVCP_PORT);
            match sock.send_to(&buf, target) {
                Ok(_) => {
                    debug!(block_id, first, last, "resend requested");
                    self.statistics.lock().unwrap().n_resend_requests += 1;
                }
                Err(err) => warn!(%err, "failed to send a resend request"),
            }
        }
    }

    /// Retention expiry and resend retries with backoff.
    fn run_timers(
        &mut self,
        frames: &mut BTreeMap<u64, FrameState>,
        last_completed: &mut Option<u64>,
        resend_sock: Option<&std::net::UdpSocket>,
    ) {
        let now = time::Instant::now();

        // Resend retries: a range still missing one packet-timeout after
        // its last request is asked for again, with a growing interval.
        if let Some(sock) = resend_sock {
            let mut retries = Vec::new();
            for (block_id, frame) in frames.iter_mut() {
                for (&(first, last), (requested_at, count)) in &mut frame.resend_requested {
                    let any_missing = (first..=last).any(|id| frame.missing.contains(&id));
                    if !any_missing || *count > self.options.max_resend_retries {
                        continue;
                    }
                    let backoff = self.options.packet_timeout * u32::from(*count);
                    if now.duration_since(*requested_at) >= backoff {
                        *requested_at = now;
                        *count += 1;
                        retries.push((*block_id, first, last));
                    }
                }
            }
            for (block_id, first, last) in retries {
                self.send_resend(block_id, first, last, sock);
            }
        }

        // Retention expiry.
        let expired: Vec<u64> = frames
            .iter()
            .filter(|(_, frame)| {
                now.duration_since(frame.last_activity) >= self.options.frame_retention
            })
            .map(|(block_id, _)| *block_id)
            .collect();
        for block_id in expired {
            let mut frame = frames.remove(&block_id).unwrap();
            frame.error_status = Some(if frame.missing.is_empty() {
                BufferStatus::Timeout
            } else {
                BufferStatus::MissingPackets
            });
            self.complete_frame(block_id, frame, last_completed);
        }
    }

    fn complete_frame(
        &self,
        block_id: u64,
        mut frame: FrameState,
        last_completed: &mut Option<u64>,
    ) {
        let declared = frame.declared_payload_size.unwrap_or(0) as usize;
        frame.buffer.received_size = if frame.trailer_seen {
            declared.min(frame.bytes_high_water)
        } else {
            frame.bytes_high_water
        };
        frame.buffer.frame_id = block_id;
        frame.buffer.timestamp_ns = frame.timestamp;
        frame.buffer.system_timestamp_ns = system_time_ns();
        frame.buffer.payload_type = frame
            .payload_kind
            .map_or(BufferPayloadType::NoData, BufferPayloadType::from_gvsp);

        let status = if let Some(error) = frame.error_status {
            error
        } else if !frame.leader_seen || !frame.trailer_seen {
            BufferStatus::MissingPackets
        } else if frame.bytes_high_water != declared {
            BufferStatus::SizeMismatch
        } else {
            BufferStatus::Success
        };
        frame.buffer.status = status;

        if matches!(status, BufferStatus::Success | BufferStatus::SizeMismatch) {
            frame.buffer.parts = build_parts(&frame);
        }

        {
            let mut stats = self.statistics.lock().unwrap();
            stats.n_missing_packets += frame.missing.len() as u64;
            if status == BufferStatus::Success {
                stats.n_completed_buffers += 1;
            } else {
                stats.n_failures += 1;
            }
        }

        *last_completed = Some(last_completed.map_or(block_id, |last| last.max(block_id)));

        debug!(block_id, ?status, "frame completed");
        self.emit(StreamEvent::BufferDone, Some(&frame.buffer));
        self.deliver(frame.buffer);
    }

    fn deliver(&self, buffer: Buffer) {
        if self.supply.send(Ok(buffer)).is_err() {
            warn!("output queue full; buffer dropped from circulation");
        }
    }

    fn emit(&self, event: StreamEvent, buffer: Option<&Buffer>) {
        if let Some(callback) = self.callback.lock().unwrap().as_mut() {
            callback(event, buffer);
        }
    }
}

/// Builds the parts table at frame completion.
fn build_parts(frame: &FrameState) -> Vec<BufferPart> {
    let declared = frame.declared_payload_size.unwrap_or(0) as usize;

    if !frame.trailer_parts.is_empty() {
        return frame
            .trailer_parts
            .iter()
            .map(|part| BufferPart {
                offset: part.offset as usize,
                size: part.size as usize,
                pixel_format: Some(part.pixel_format),
                width: part.width,
                height: part.height,
                x_offset: part.x_offset,
                y_offset: part.y_offset,
                x_padding: u32::from(part.x_padding),
                y_padding: u32::from(part.y_padding),
                data_type: part.data_type,
                component_id: part.component_id,
            })
            .collect();
    }

    if let Some(image) = &frame.image {
        return vec![BufferPart {
            offset: 0,
            size: declared,
            pixel_format: Some(image.pixel_format),
            width: image.width,
            height: image.height,
            x_offset: image.x_offset,
            y_offset: image.y_offset,
            x_padding: u32::from(image.x_padding),
            y_padding: u32::from(image.y_padding),
            data_type: 0,
            component_id: 0,
        }];
    }

    // GenDC containers carry their own two-level descriptor; expose the
    // parts it declares.
    if frame.payload_kind == Some(PayloadKind::GenDcContainer) {
        if let Ok(descriptor) = lucida_device::gendc::ContainerDescriptor::parse(
            &frame.buffer.raw()[..frame.buffer.received_size],
        ) {
            let mut parts = Vec::new();
            for component in &descriptor.components {
                for part in &component.parts {
                    parts.push(BufferPart {
                        offset: part.data_offset as usize,
                        size: part.data_size as usize,
                        pixel_format: std::convert::TryInto::try_into(part.format).ok(),
                        width: part.width,
                        height: part.height,
                        x_offset: 0,
                        y_offset: 0,
                        x_padding: u32::from(part.x_padding),
                        y_padding: u32::from(part.y_padding),
                        data_type: part.data_type,
                        component_id: component.component_id,
                    });
                }
            }
            return parts;
        }
    }

    Vec::new()
}

fn system_time_ns() -> u64 {
    time::SystemTime::now()
        .duration_since(time::UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64)
}
