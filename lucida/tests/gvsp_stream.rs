/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! GVSP reassembly against synthesized datagrams on the loopback
//! interface: complete frames, out-of-order arrival, packet loss and
//! shutdown latency.

mod common;

use std::net::UdpSocket;
use std::time::{Duration, Instant};

use common::MemoryDevice;

use lucida::gev::stream_handle::{
    PacketSizeAdjustment, ResendPolicy, SocketBufferPolicy, StreamOptions,
};
use lucida::gev::{StreamHandle, StreamParams};
use lucida::payload::{buffer_channel, Buffer, BufferQueue};
use lucida::{BufferStatus, PayloadStream};
use lucida_device::gev::protocol::stream::{
    ImageInfo, Leader, PacketWriter, PayloadKind, Trailer,
};
use lucida_device::PixelFormat;

const PACKET_DATA_SIZE: usize = 64;

struct Feeder {
    sock: UdpSocket,
    target: std::net::SocketAddr,
}

impl Feeder {
    fn new(stream_port: u16) -> Self {
        Self {
            sock: UdpSocket::bind("127.0.0.1:0").unwrap(),
            target: ([127, 0, 0, 1], stream_port).into(),
        }
    }

    fn leader(&self, block_id: u64, payload_len: usize) -> Vec<u8> {
        let leader = Leader {
            field_id: 0,
            field_count: 0,
            payload_kind: PayloadKind::Image,
            timestamp: 1000 + block_id,
            image: Some(ImageInfo {
                pixel_format: PixelFormat::Mono8,
                width: payload_len as u32,
                height: 1,
                x_offset: 0,
                y_offset: 0,
                x_padding: 0,
                y_padding: 0,
            }),
        };
        PacketWriter::new(block_id, false).leader(0, &leader).unwrap()
    }

    fn payload(&self, block_id: u64, packet_id: u32, data: &[u8]) -> Vec<u8> {
        PacketWriter::new(block_id, false)
            .payload(packet_id, data)
            .unwrap()
    }

    fn trailer(&self, block_id: u64, payload_len: usize) -> Vec<u8> {
        let trailer = Trailer {
            payload_kind: PayloadKind::Image,
            payload_size: payload_len as u64,
            parts: vec![],
        };
        let packet_id = (payload_len / PACKET_DATA_SIZE) as u32 + 1;
        PacketWriter::new(block_id, false)
            .trailer(packet_id, &trailer)
            .unwrap()
    }

    fn send(&self, datagram: &[u8]) {
        self.sock.send_to(datagram, self.target).unwrap();
    }

    /// Sends one complete frame in order.
    fn send_frame(&self, block_id: u64, payload: &[u8]) {
        self.send(&self.leader(block_id, payload.len()));
        for (i, chunk) in payload.chunks(PACKET_DATA_SIZE).enumerate() {
            self.send(&self.payload(block_id, i as u32 + 1, chunk));
        }
        self.send(&self.trailer(block_id, payload.len()));
    }
}

fn options() -> StreamOptions {
    StreamOptions {
        packet_timeout: Duration::from_millis(20),
        frame_retention: Duration::from_millis(100),
        resend_policy: ResendPolicy::Never,
        max_resend_retries: 2,
        socket_buffer: SocketBufferPolicy::Fixed(1 << 20),
        packet_size_adjustment: PacketSizeAdjustment::Disable,
    }
}

fn start_stream(n_buffers: usize) -> (StreamHandle, BufferQueue, Feeder) {
    let mut handle = StreamHandle::with_options(options()).unwrap();
    handle.set_params(StreamParams {
        packet_data_size: PACKET_DATA_SIZE,
        device_addr: None,
        stream_channel_index: 0,
    });

    let (supply, queue) = buffer_channel(n_buffers.max(1));
    for _ in 0..n_buffers {
        queue.push_buffer(Buffer::new_allocate(4096)).unwrap();
    }

    let feeder = Feeder::new(handle.local_port());
    handle
        .start_streaming_loop(supply, &mut MemoryDevice::new())
        .unwrap();
    (handle, queue, feeder)
}

fn frame_payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_add(seed)).collect()
}

#[test]
fn complete_frames_are_delivered() {
    let (mut handle, queue, feeder) = start_stream(8);

    for block_id in 1..=3_u64 {
        feeder.send_frame(block_id, &frame_payload(256, block_id as u8));
    }

    let mut frame_ids = Vec::new();
    for _ in 0..3 {
        let buffer = queue.timeout_pop_buffer(Duration::from_secs(2)).unwrap();
        assert_eq!(buffer.status(), BufferStatus::Success);
        assert_eq!(buffer.received_size(), 256);
        let expected = frame_payload(256, buffer.frame_id() as u8);
        assert_eq!(buffer.image_data().unwrap(), expected.as_slice());
        assert_eq!(buffer.timestamp().as_nanos() as u64, 1000 + buffer.frame_id());
        frame_ids.push(buffer.frame_id());
    }
    // Frame ids are non-decreasing on the output queue.
    let mut sorted = frame_ids.clone();
    sorted.sort_unstable();
    assert_eq!(frame_ids, sorted);

    handle.stop_streaming_loop().unwrap();
    let stats = handle.statistics();
    assert_eq!(stats.n_completed_buffers, 3);
    assert_eq!(stats.n_failures, 0);
    assert_eq!(stats.n_underruns, 0);
}

#[test]
fn out_of_order_packets_reassemble() {
    let (mut handle, queue, feeder) = start_stream(4);

    let payload = frame_payload(4 * PACKET_DATA_SIZE, 7);
    let chunks: Vec<&[u8]> = payload.chunks(PACKET_DATA_SIZE).collect();

    feeder.send(&feeder.leader(1, payload.len()));
    // 3, 1, 4, 2: every packet lands at its id-derived offset.
    feeder.send(&feeder.payload(1, 3, chunks[2]));
    feeder.send(&feeder.payload(1, 1, chunks[0]));
    feeder.send(&feeder.payload(1, 4, chunks[3]));
    feeder.send(&feeder.payload(1, 2, chunks[1]));
    feeder.send(&feeder.trailer(1, payload.len()));

    let buffer = queue.timeout_pop_buffer(Duration::from_secs(2)).unwrap();
    assert_eq!(buffer.status(), BufferStatus::Success);
    assert_eq!(buffer.image_data().unwrap(), payload.as_slice());

    handle.stop_streaming_loop().unwrap();
}

#[test]
fn trailer_before_last_payload_still_completes() {
    let (mut handle, queue, feeder) = start_stream(4);

    let payload = frame_payload(2 * PACKET_DATA_SIZE, 3);
    let chunks: Vec<&[u8]> = payload.chunks(PACKET_DATA_SIZE).collect();

    feeder.send(&feeder.leader(1, payload.len()));
    feeder.send(&feeder.payload(1, 1, chunks[0]));
    feeder.send(&feeder.trailer(1, payload.len()));
    // The gap claimed by the trailer closes when the packet arrives.
    feeder.send(&feeder.payload(1, 2, chunks[1]));

    let buffer = queue.timeout_pop_buffer(Duration::from_secs(2)).unwrap();
    assert_eq!(buffer.status(), BufferStatus::Success);
    assert_eq!(buffer.image_data().unwrap(), payload.as_slice());

    handle.stop_streaming_loop().unwrap();
}

#[test]
fn lost_packets_expire_to_missing_packets() {
    let (mut handle, queue, feeder) = start_stream(4);

    let payload = frame_payload(4 * PACKET_DATA_SIZE, 9);
    let chunks: Vec<&[u8]> = payload.chunks(PACKET_DATA_SIZE).collect();

    feeder.send(&feeder.leader(1, payload.len()));
    feeder.send(&feeder.payload(1, 1, chunks[0]));
    // Packet 2 is lost.
    feeder.send(&feeder.payload(1, 3, chunks[2]));
    feeder.send(&feeder.payload(1, 4, chunks[3]));
    feeder.send(&feeder.trailer(1, payload.len()));

    let buffer = queue.timeout_pop_buffer(Duration::from_secs(2)).unwrap();
    assert_eq!(buffer.status(), BufferStatus::MissingPackets);
    assert_eq!(buffer.frame_id(), 1);

    handle.stop_streaming_loop().unwrap();
    let stats = handle.statistics();
    assert_eq!(stats.n_failures, 1);
    assert!(stats.n_missing_packets >= 1);
}

#[test]
fn silence_expires_to_timeout() {
    let (mut handle, queue, feeder) = start_stream(4);

    // A leader with no payload at all.
    feeder.send(&feeder.leader(1, 256));

    let buffer = queue.timeout_pop_buffer(Duration::from_secs(2)).unwrap();
    assert_eq!(buffer.status(), BufferStatus::Timeout);

    handle.stop_streaming_loop().unwrap();
}

#[test]
fn underrun_discards_datagrams() {
    let (mut handle, queue, feeder) = start_stream(0);

    feeder.send_frame(1, &frame_payload(128, 1));

    assert!(queue
        .timeout_pop_buffer(Duration::from_millis(300))
        .is_err());

    handle.stop_streaming_loop().unwrap();
    assert!(handle.statistics().n_underruns >= 1);
}

#[test]
fn all_in_one_datagram_completes_a_frame() {
    let (mut handle, queue, feeder) = start_stream(2);

    let payload = frame_payload(48, 5);
    let leader = Leader {
        field_id: 0,
        field_count: 0,
        payload_kind: PayloadKind::Image,
        timestamp: 77,
        image: Some(ImageInfo {
            pixel_format: PixelFormat::Mono8,
            width: 48,
            height: 1,
            x_offset: 0,
            y_offset: 0,
            x_padding: 0,
            y_padding: 0,
        }),
    };
    let trailer = Trailer {
        payload_kind: PayloadKind::Image,
        payload_size: payload.len() as u64,
        parts: vec![],
    };
    let datagram = PacketWriter::new(4, false)
        .all_in(&leader, &payload, &trailer)
        .unwrap();
    feeder.send(&datagram);

    let buffer = queue.timeout_pop_buffer(Duration::from_secs(2)).unwrap();
    assert_eq!(buffer.status(), BufferStatus::Success);
    assert_eq!(buffer.frame_id(), 4);
    assert_eq!(buffer.image_data().unwrap(), payload.as_slice());

    handle.stop_streaming_loop().unwrap();
}

#[test]
fn stop_returns_within_one_poll_period() {
    let (mut handle, queue, feeder) = start_stream(4);

    // Keep a frame in flight so the loop has state to abort.
    feeder.send(&feeder.leader(1, 256));
    std::thread::sleep(Duration::from_millis(30));

    let started = Instant::now();
    handle.stop_streaming_loop().unwrap();
    // One poll period plus scheduling slack.
    assert!(started.elapsed() < Duration::from_millis(500));

    // The in-flight buffer came back aborted; nothing is written after
    // the stop returned.
    let buffer = queue.timeout_pop_buffer(Duration::from_millis(200)).unwrap();
    assert_eq!(buffer.status(), BufferStatus::Aborted);
    assert!(queue.try_pop_buffer().is_err());
}
