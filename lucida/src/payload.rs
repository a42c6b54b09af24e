/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Image buffers and the queues that move them between the caller and a
//! stream's receive thread.
//!
//! The caller keeps the stream supplied with empty buffers through
//! [`BufferQueue::push_buffer`]; the receive thread fills them and hands
//! them back on the output side, where [`BufferQueue::pop_buffer`] and
//! friends collect them. Both queues are bounded by the number of
//! buffers the caller put in circulation.

use std::{convert::TryInto, time};

use async_channel::{Receiver, Sender};
use async_std::task;

use lucida_device::{gendc, gev::protocol::stream as gvsp, PixelFormat};

use super::{StreamError, StreamResult};

/// Delivery state of a buffer returned on the output queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferStatus {
    /// The frame is complete; all view accessors are defined.
    Success,
    /// The buffer was flushed before any data arrived.
    Cleared,
    /// The frame stalled and was expired by the retention timer.
    Timeout,
    /// The frame completed with unfilled gaps.
    MissingPackets,
    /// A packet id fell outside the expected range.
    WrongPacketId,
    /// The trailer's declared size disagrees with the received bytes.
    SizeMismatch,
    /// The frame is still being filled by the receive thread.
    Filling,
    /// The stream was stopped while the frame was in flight.
    Aborted,
    /// The device sent a payload kind the library can't represent.
    PayloadNotSupported,
}

/// Payload classification of a delivered buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferPayloadType {
    NoData,
    Image,
    ChunkData,
    ExtendedChunkData,
    Multipart,
    GenDcContainer,
    GenDcComponentData,
    Jpeg,
    H264,
    Raw,
}

impl BufferPayloadType {
    pub(crate) fn from_gvsp(kind: gvsp::PayloadKind) -> Self {
        match kind {
            gvsp::PayloadKind::Image | gvsp::PayloadKind::MultiZoneImage => Self::Image,
            gvsp::PayloadKind::ChunkData => Self::ChunkData,
            gvsp::PayloadKind::ExtendedChunkData => Self::ExtendedChunkData,
            gvsp::PayloadKind::Multipart => Self::Multipart,
            gvsp::PayloadKind::GenDcContainer => Self::GenDcContainer,
            gvsp::PayloadKind::GenDcComponentData => Self::GenDcComponentData,
            gvsp::PayloadKind::Jpeg | gvsp::PayloadKind::Jpeg2000 => Self::Jpeg,
            gvsp::PayloadKind::H264 => Self::H264,
            _ => Self::Raw,
        }
    }

    fn has_image(self) -> bool {
        matches!(
            self,
            Self::Image | Self::ExtendedChunkData | Self::Multipart
        )
    }

    fn has_chunks(self) -> bool {
        matches!(self, Self::ChunkData | Self::ExtendedChunkData)
    }
}

/// One part of a delivered frame. Single-part images have exactly one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferPart {
    pub offset: usize,
    pub size: usize,
    pub pixel_format: Option<PixelFormat>,
    pub width: u32,
    pub height: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    pub x_padding: u32,
    pub y_padding: u32,
    pub data_type: u16,
    pub component_id: u16,
}

/// Backing memory of a buffer.
pub trait BufferMemory: AsRef<[u8]> + AsMut<[u8]> + Send {}

impl<T> BufferMemory for T where T: AsRef<[u8]> + AsMut<[u8]> + Send {}

enum BufferStorage {
    /// Library-allocated memory, freed on drop.
    Allocated(Vec<u8>),
    /// Caller-supplied memory with an optional release hook, invoked
    /// exactly once when the buffer is dropped.
    External {
        data: Box<dyn BufferMemory>,
        on_release: Option<Box<dyn FnOnce() + Send>>,
    },
}

impl std::fmt::Debug for BufferStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allocated(data) => f.debug_tuple("Allocated").field(&data.len()).finish(),
            Self::External { data, .. } => f
                .debug_struct("External")
                .field("len", &data.as_ref().as_ref().len())
                .finish(),
        }
    }
}

/// A byte region plus the per-frame metadata filled in by a stream.
#[derive(Debug)]
pub struct Buffer {
    storage: BufferStorage,
    pub(crate) received_size: usize,
    pub(crate) status: BufferStatus,
    pub(crate) payload_type: BufferPayloadType,
    pub(crate) timestamp_ns: u64,
    pub(crate) system_timestamp_ns: u64,
    pub(crate) frame_id: u64,
    pub(crate) parts: Vec<BufferPart>,
}

impl Buffer {
    /// Allocates a buffer of `size` bytes owned by the library.
    #[must_use]
    pub fn new_allocate(size: usize) -> Self {
        Self::from_storage(BufferStorage::Allocated(vec![0; size]))
    }

    /// Wraps caller-supplied memory. `on_release` is called exactly once
    /// when the buffer is dropped, letting the caller reclaim or unpin
    /// the memory.
    pub fn new_full(
        data: impl BufferMemory + 'static,
        on_release: Option<Box<dyn FnOnce() + Send>>,
    ) -> Self {
        Self::from_storage(BufferStorage::External {
            data: Box::new(data),
            on_release,
        })
    }

    fn from_storage(storage: BufferStorage) -> Self {
        Self {
            storage,
            received_size: 0,
            status: BufferStatus::Cleared,
            payload_type: BufferPayloadType::NoData,
            timestamp_ns: 0,
            system_timestamp_ns: 0,
            frame_id: 0,
            parts: Vec::new(),
        }
    }

    #[must_use]
    pub fn allocated_size(&self) -> usize {
        match &self.storage {
            BufferStorage::Allocated(data) => data.len(),
            BufferStorage::External { data, .. } => data.as_ref().as_ref().len(),
        }
    }

    #[must_use]
    pub fn received_size(&self) -> usize {
        self.received_size
    }

    #[must_use]
    pub fn status(&self) -> BufferStatus {
        self.status
    }

    #[must_use]
    pub fn payload_type(&self) -> BufferPayloadType {
        self.payload_type
    }

    /// Device timestamp of the frame in nanoseconds.
    #[must_use]
    pub fn timestamp(&self) -> time::Duration {
        time::Duration::from_nanos(self.timestamp_ns)
    }

    /// Host clock timestamp taken when the frame completed, nanoseconds
    /// since the UNIX epoch.
    #[must_use]
    pub fn system_timestamp(&self) -> u64 {
        self.system_timestamp_ns
    }

    /// Frame id, monotonic per stream within the protocol's id width.
    #[must_use]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    /// Received payload bytes. Defined regardless of status; incomplete
    /// frames expose whatever arrived.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.raw()[..self.received_size]
    }

    pub(crate) fn raw(&self) -> &[u8] {
        match &self.storage {
            BufferStorage::Allocated(data) => data,
            BufferStorage::External { data, .. } => data.as_ref().as_ref(),
        }
    }

    pub(crate) fn raw_mut(&mut self) -> &mut [u8] {
        match &mut self.storage {
            BufferStorage::Allocated(data) => data,
            BufferStorage::External { data, .. } => data.as_mut().as_mut(),
        }
    }

    /// Resets delivery metadata before the buffer is recycled.
    pub(crate) fn clear(&mut self) {
        self.received_size = 0;
        self.status = BufferStatus::Cleared;
        self.payload_type = BufferPayloadType::NoData;
        self.timestamp_ns = 0;
        self.system_timestamp_ns = 0;
        self.frame_id = 0;
        self.parts.clear();
    }

    #[must_use]
    pub fn n_parts(&self) -> usize {
        self.parts.len()
    }

    pub fn part(&self, index: usize) -> Option<&BufferPart> {
        if self.status != BufferStatus::Success {
            return None;
        }
        self.parts.get(index)
    }

    /// Bytes of the part at `index`.
    pub fn part_data(&self, index: usize) -> Option<&[u8]> {
        let part = self.part(index)?;
        self.data().get(part.offset..part.offset + part.size)
    }

    /// Returns the index of the first part with the given component id.
    pub fn find_component(&self, component_id: u16) -> Option<usize> {
        self.parts
            .iter()
            .position(|part| part.component_id == component_id)
    }

    fn image_part(&self) -> Option<&BufferPart> {
        if self.status != BufferStatus::Success || !self.payload_type.has_image() {
            return None;
        }
        self.parts.first()
    }

    /// Bytes of the image region.
    pub fn image_data(&self) -> Option<&[u8]> {
        let part = self.image_part()?;
        self.data().get(part.offset..part.offset + part.size)
    }

    pub fn image_pixel_format(&self) -> Option<PixelFormat> {
        self.image_part()?.pixel_format
    }

    pub fn image_width(&self) -> Option<u32> {
        Some(self.image_part()?.width)
    }

    pub fn image_height(&self) -> Option<u32> {
        Some(self.image_part()?.height)
    }

    /// `(x offset, y offset, width, height)` of the image region.
    pub fn image_region(&self) -> Option<(u32, u32, u32, u32)> {
        let part = self.image_part()?;
        Some((part.x_offset, part.y_offset, part.width, part.height))
    }

    /// `(x padding, y padding)` of the image region.
    pub fn image_padding(&self) -> Option<(u32, u32)> {
        let part = self.image_part()?;
        Some((part.x_padding, part.y_padding))
    }

    #[must_use]
    pub fn has_chunks(&self) -> bool {
        self.status == BufferStatus::Success && self.payload_type.has_chunks()
    }

    /// Finds a chunk section by id. Chunk records trail the payload and
    /// are walked from the last byte backwards: `[data][id u32][size u32]`.
    pub fn chunk_data(&self, chunk_id: u32) -> Option<&[u8]> {
        if !self.has_chunks() {
            return None;
        }

        let data = self.data();
        let mut cursor = data.len();
        while cursor >= 8 {
            let size =
                u32::from_be_bytes(data[cursor - 4..cursor].try_into().ok()?) as usize;
            let id = u32::from_be_bytes(data[cursor - 8..cursor - 4].try_into().ok()?);
            let data_end = cursor.checked_sub(8)?;
            let data_start = data_end.checked_sub(size)?;
            if id == chunk_id {
                return data.get(data_start..data_end);
            }
            cursor = data_start;
        }
        None
    }

    #[must_use]
    pub fn has_gendc(&self) -> bool {
        self.status == BufferStatus::Success
            && matches!(self.payload_type, BufferPayloadType::GenDcContainer)
    }

    /// Bytes of the GenDC data region, descriptor excluded.
    pub fn gendc_data(&self) -> Option<&[u8]> {
        let descriptor = self.gendc_descriptor()?;
        self.data().get(descriptor.descriptor_len()..)
    }

    /// Parses the GenDC container descriptor at the payload start.
    pub fn gendc_descriptor(&self) -> Option<gendc::ContainerDescriptor> {
        if !self.has_gendc() {
            return None;
        }
        gendc::ContainerDescriptor::parse(self.data()).ok()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let BufferStorage::External { on_release, .. } = &mut self.storage {
            if let Some(release) = on_release.take() {
                release();
            }
        }
    }
}

/// Events reported to the stream callback on the receive thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// The receive thread started.
    Init,
    /// The receive thread is about to exit.
    Exit,
    /// A buffer left the input queue to receive a new frame.
    StartBuffer,
    /// A buffer completed and was pushed to the output queue.
    BufferDone,
}

pub type StreamCallback = Box<dyn FnMut(StreamEvent, Option<&Buffer>) + Send>;

/// Counters of a stream since the receive thread last started.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStatistics {
    pub n_completed_buffers: u64,
    pub n_failures: u64,
    pub n_underruns: u64,
    pub n_transferred_bytes: u64,
    pub n_ignored_bytes: u64,
    pub n_received_packets: u64,
    pub n_missing_packets: u64,
    pub n_resent_packets: u64,
    pub n_resend_requests: u64,
    pub n_aborted: u64,
}

impl StreamStatistics {
    /// Looks a counter up by name, mirroring the struct fields.
    pub fn value_of(&self, name: &str) -> Option<u64> {
        Some(match name {
            "n_completed_buffers" => self.n_completed_buffers,
            "n_failures" => self.n_failures,
            "n_underruns" => self.n_underruns,
            "n_transferred_bytes" => self.n_transferred_bytes,
            "n_ignored_bytes" => self.n_ignored_bytes,
            "n_received_packets" => self.n_received_packets,
            "n_missing_packets" => self.n_missing_packets,
            "n_resent_packets" => self.n_resent_packets,
            "n_resend_requests" => self.n_resend_requests,
            "n_aborted" => self.n_aborted,
            _ => return None,
        })
    }
}

/// Caller-side handle of the buffer queues.
#[derive(Debug, Clone)]
pub struct BufferQueue {
    /// Sends empty buffers to the receive thread.
    tx: Sender<Buffer>,
    /// Receives filled buffers from the receive thread.
    rx: Receiver<StreamResult<Buffer>>,
}

impl BufferQueue {
    /// Queues an empty buffer for the receive thread. The buffer's
    /// delivery metadata is reset.
    pub fn push_buffer(&self, mut buffer: Buffer) -> StreamResult<()> {
        buffer.clear();
        self.tx
            .try_send(buffer)
            .map_err(|_| StreamError::QueueError("input queue is full or closed".into()))
    }

    /// Blocks until a filled buffer is available.
    pub fn pop_buffer(&self) -> StreamResult<Buffer> {
        self.rx
            .recv_blocking()
            .map_err(|_| StreamError::QueueError("output queue is closed".into()))?
    }

    /// Returns immediately, with `QueueError` when no buffer is ready.
    pub fn try_pop_buffer(&self) -> StreamResult<Buffer> {
        self.rx
            .try_recv()
            .map_err(|_| StreamError::QueueError("output queue is empty".into()))?
    }

    /// Waits up to `timeout` for a filled buffer.
    pub fn timeout_pop_buffer(&self, timeout: time::Duration) -> StreamResult<Buffer> {
        task::block_on(async {
            async_std::future::timeout(timeout, self.rx.recv())
                .await
                .map_err(|_| StreamError::Timeout)?
                .map_err(|_| StreamError::QueueError("output queue is closed".into()))?
        })
    }

    /// Number of buffers currently waiting on the output queue.
    #[must_use]
    pub fn n_ready_buffers(&self) -> usize {
        self.rx.len()
    }

    /// Number of empty buffers waiting to be consumed by the stream.
    #[must_use]
    pub fn n_queued_buffers(&self) -> usize {
        self.tx.len()
    }
}

/// Receive-thread side of the buffer queues.
#[derive(Debug, Clone)]
pub struct BufferSupply {
    /// Receives empty buffers from the caller.
    rx: Receiver<Buffer>,
    /// Sends filled buffers to the caller.
    tx: Sender<StreamResult<Buffer>>,
}

impl BufferSupply {
    /// Takes an empty buffer from the input queue if one is available.
    pub fn try_pop_empty(&self) -> Option<Buffer> {
        self.rx.try_recv().ok()
    }

    /// Hands a filled buffer (or a stream-level failure) to the caller.
    pub fn send(&self, item: StreamResult<Buffer>) -> StreamResult<()> {
        self.tx
            .try_send(item)
            .map_err(|_| StreamError::QueueError("output queue is full or closed".into()))
    }
}

/// Creates the connected queue pair. `cap` bounds both queues.
#[must_use]
pub fn buffer_channel(cap: usize) -> (BufferSupply, BufferQueue) {
    let (input_tx, input_rx) = async_channel::bounded(cap);
    let (output_tx, output_rx) = async_channel::bounded(cap);
    (
        BufferSupply {
            rx: input_rx,
            tx: output_tx,
        },
        BufferQueue {
            tx: input_tx,
            rx: output_rx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn allocated_buffer_views() {
        let mut buffer = Buffer::new_allocate(16);
        buffer.raw_mut().copy_from_slice(&[7; 16]);
        buffer.received_size = 16;
        buffer.status = BufferStatus::Success;
        buffer.payload_type = BufferPayloadType::Image;
        buffer.parts.push(BufferPart {
            offset: 0,
            size: 16,
            pixel_format: Some(PixelFormat::Mono8),
            width: 4,
            height: 4,
            x_offset: 0,
            y_offset: 0,
            x_padding: 0,
            y_padding: 0,
            data_type: 0,
            component_id: 0,
        });

        assert_eq!(buffer.allocated_size(), 16);
        assert_eq!(buffer.image_data().unwrap(), &[7; 16]);
        assert_eq!(buffer.image_region().unwrap(), (0, 0, 4, 4));
        assert_eq!(buffer.image_pixel_format().unwrap(), PixelFormat::Mono8);
    }

    #[test]
    fn views_are_undefined_unless_success() {
        let mut buffer = Buffer::new_allocate(16);
        buffer.payload_type = BufferPayloadType::Image;
        buffer.status = BufferStatus::MissingPackets;
        assert!(buffer.image_data().is_none());
        assert!(buffer.part(0).is_none());
    }

    #[test]
    fn release_hook_runs_exactly_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let hook_counter = Arc::clone(&counter);
        let buffer = Buffer::new_full(
            vec![0_u8; 64],
            Some(Box::new(move || {
                hook_counter.fetch_add(1, Ordering::SeqCst);
            })),
        );
        assert_eq!(buffer.allocated_size(), 64);
        drop(buffer);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn chunk_walk_finds_sections() {
        // Layout: [chunk A data (4)][id][size] [chunk B data (2)][id][size]
        let mut data = Vec::new();
        data.extend_from_slice(&[1, 2, 3, 4]);
        data.extend_from_slice(&0x1122_3344_u32.to_be_bytes());
        data.extend_from_slice(&4_u32.to_be_bytes());
        data.extend_from_slice(&[5, 6]);
        data.extend_from_slice(&0x5566_7788_u32.to_be_bytes());
        data.extend_from_slice(&2_u32.to_be_bytes());

        let mut buffer = Buffer::new_allocate(data.len());
        buffer.raw_mut().copy_from_slice(&data);
        buffer.received_size = data.len();
        buffer.status = BufferStatus::Success;
        buffer.payload_type = BufferPayloadType::ChunkData;

        assert_eq!(buffer.chunk_data(0x1122_3344).unwrap(), &[1, 2, 3, 4]);
        assert_eq!(buffer.chunk_data(0x5566_7788).unwrap(), &[5, 6]);
        assert!(buffer.chunk_data(0xdead_beef).is_none());
    }

    #[test]
    fn queue_round_trip() {
        let (supply, queue) = buffer_channel(2);
        queue.push_buffer(Buffer::new_allocate(8)).unwrap();

        let mut buffer = supply.try_pop_empty().unwrap();
        buffer.status = BufferStatus::Success;
        supply.send(Ok(buffer)).unwrap();

        let popped = queue.pop_buffer().unwrap();
        assert_eq!(popped.status(), BufferStatus::Success);
        assert!(queue.try_pop_buffer().is_err());
    }

    #[test]
    fn timeout_pop_respects_deadline() {
        let (_supply, queue) = buffer_channel(1);
        let started = std::time::Instant::now();
        let res = queue.timeout_pop_buffer(time::Duration::from_millis(50));
        assert!(matches!(res, Err(StreamError::Timeout)));
        assert!(started.elapsed() >= time::Duration::from_millis(50));
    }
}
