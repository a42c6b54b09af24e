/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The UVSP stream handle: a leader / payload / trailer state machine
//! over a bulk stream endpoint.

use std::{
    sync::mpsc,
    sync::{Arc, Mutex},
    time,
};

use tracing::{error, info, warn};

use lucida_device::u3v::protocol::stream as uvsp;

use crate::{
    payload::{
        Buffer, BufferPart, BufferPayloadType, BufferStatus, BufferSupply, StreamCallback,
        StreamEvent, StreamStatistics,
    },
    DeviceControl, PayloadStream, StreamError, StreamResult,
};

use super::{register_map::Abrm, StreamPipe};

/// Transfer sizing of one frame, read from the SIRM block.
#[derive(Debug, Clone)]
pub struct StreamParams {
    pub leader_size: usize,
    pub trailer_size: usize,
    pub payload_size: usize,
    pub payload_count: usize,
    pub payload_final1_size: usize,
    pub payload_final2_size: usize,
    /// Timeout of each bulk transfer.
    pub timeout: time::Duration,
}

impl StreamParams {
    /// Upper bound of one frame's payload under the current settings.
    #[must_use]
    pub fn maximum_payload_size(&self) -> usize {
        self.payload_size * self.payload_count
            + self.payload_final1_size
            + self.payload_final2_size
    }

    pub fn from_control<Ctrl: DeviceControl + ?Sized>(ctrl: &mut Ctrl) -> StreamResult<Self> {
        let io_err = |e: crate::ControlError| StreamError::Io(anyhow::Error::msg(e.to_string()));

        let abrm = Abrm::new();
        let sirm = abrm
            .sbrm(ctrl)
            .map_err(io_err)?
            .sirm(ctrl)
            .map_err(io_err)?
            .ok_or_else(|| StreamError::InvalidPayload("the device exposes no SIRM".into()))?;

        Ok(Self {
            leader_size: sirm.maximum_leader_size(ctrl).map_err(io_err)? as usize,
            trailer_size: sirm.maximum_trailer_size(ctrl).map_err(io_err)? as usize,
            payload_size: sirm.payload_transfer_size(ctrl).map_err(io_err)? as usize,
            payload_count: sirm.payload_transfer_count(ctrl).map_err(io_err)? as usize,
            payload_final1_size: sirm.payload_final_transfer1_size(ctrl).map_err(io_err)?
                as usize,
            payload_final2_size: sirm.payload_final_transfer2_size(ctrl).map_err(io_err)?
                as usize,
            timeout: abrm
                .maximum_device_response_time(ctrl)
                .unwrap_or(time::Duration::from_millis(500)),
        })
    }
}

/// Receives the stream of a USB3 Vision device through a [`StreamPipe`].
pub struct StreamHandle<P> {
    pipe: Arc<Mutex<P>>,
    params: Option<StreamParams>,
    statistics: Arc<Mutex<StreamStatistics>>,
    callback: Arc<Mutex<Option<StreamCallback>>>,
    cancellation_tx: Option<mpsc::SyncSender<()>>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl<P: StreamPipe + 'static> StreamHandle<P> {
    pub fn new(pipe: P) -> Self {
        Self {
            pipe: Arc::new(Mutex::new(pipe)),
            params: None,
            statistics: Arc::new(Mutex::new(StreamStatistics::default())),
            callback: Arc::new(Mutex::new(None)),
            cancellation_tx: None,
            join_handle: None,
        }
    }

    pub fn set_params(&mut self, params: StreamParams) {
        self.params = Some(params);
    }

    pub fn set_callback(&mut self, callback: StreamCallback) {
        *self.callback.lock().unwrap() = Some(callback);
    }

    #[must_use]
    pub fn statistics(&self) -> StreamStatistics {
        *self.statistics.lock().unwrap()
    }
}

impl<P: StreamPipe + 'static> PayloadStream for StreamHandle<P> {
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

        let params = match self.params.clone() {
            Some(params) => params,
            None => StreamParams::from_control(ctrl)?,
        };

        *self.statistics.lock().unwrap() = StreamStatistics::default();

        let (cancellation_tx, cancellation_rx) = mpsc::sync_channel(0);
        self.cancellation_tx = Some(cancellation_tx);

        let receive_loop = ReceiveLoop {
            pipe: self.pipe.clone(),
            supply,
            params,
            statistics: self.statistics.clone(),
            callback: self.callback.clone(),
            cancellation_rx,
        };
        self.join_handle = Some(std::thread::spawn(|| receive_loop.run()));

        info!("started uvsp receive loop");
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
        info!("stopped uvsp receive loop");
        Ok(())
    }

    fn is_loop_running(&self) -> bool {
        self.cancellation_tx.is_some()
    }
}

struct ReceiveLoop<P> {
    pipe: Arc<Mutex<P>>,
    supply: BufferSupply,
    params: StreamParams,
    statistics: Arc<Mutex<StreamStatistics>>,
    callback: Arc<Mutex<Option<StreamCallback>>>,
    cancellation_rx: mpsc::Receiver<()>,
}

impl<P: StreamPipe> ReceiveLoop<P> {
    fn run(mut self) {
        self.emit(StreamEvent::Init, None);

        let mut leader_buf = vec![0; self.params.leader_size.max(64)];
        let mut trailer_buf = vec![0; self.params.trailer_size.max(64)];

        loop {
            match self.cancellation_rx.try_recv() {
                Ok(()) | Err(mpsc::TryRecvError::Disconnected) => break,
                Err(mpsc::TryRecvError::Empty) => {}
            }

            // Leader first: resynchronization point of the state machine.
            let leader = {
                let mut pipe = self.pipe.lock().unwrap();
                match pipe.recv(&mut leader_buf, self.params.timeout) {
                    Ok(len) => match uvsp::Leader::parse(&leader_buf[..len]) {
                        Ok(leader) => leader,
                        Err(err) => {
                            warn!(%err, "skipping transfer while seeking a leader");
                            self.statistics.lock().unwrap().n_ignored_bytes += len as u64;
                            continue;
                        }
                    },
                    Err(StreamError::Timeout) => continue,
                    Err(err) => {
                        error!(%err, "stream pipe failed; receive loop exits");
                        self.supply.send(Err(err)).ok();
                        break;
                    }
                }
            };
            self.statistics.lock().unwrap().n_received_packets += 1;

            let mut buffer = match self.supply.try_pop_empty() {
                Some(buffer) => buffer,
                None => {
                    self.statistics.lock().unwrap().n_underruns += 1;
                    continue;
                }
            };
            self.emit(StreamEvent::StartBuffer, Some(&buffer));

            match self.receive_frame(&leader, &mut buffer, &mut trailer_buf) {
                Ok(()) => {}
                Err(err) => {
                    warn!(%err, "frame reception failed");
                    buffer.status = BufferStatus::Aborted;
                    self.statistics.lock().unwrap().n_failures += 1;
                }
            }

            {
                let mut stats = self.statistics.lock().unwrap();
                match buffer.status {
                    BufferStatus::Success => stats.n_completed_buffers += 1,
                    BufferStatus::Aborted => {}
                    _ => stats.n_failures += 1,
                }
            }
            self.emit(StreamEvent::BufferDone, Some(&buffer));
            if self.supply.send(Ok(buffer)).is_err() {
                warn!("output queue full; buffer dropped from circulation");
            }
        }

        self.emit(StreamEvent::Exit, None);
    }

    fn receive_frame(
        &self,
        leader: &uvsp::Leader,
        buffer: &mut Buffer,
        trailer_buf: &mut [u8],
    ) -> StreamResult<()> {
        let mut pipe = self.pipe.lock().unwrap();

        // Payload transfers: `payload_count` full transfers plus up to
        // two final ones.
        let mut cursor = 0_usize;
        let mut receive_chunk = |pipe: &mut P, len: usize, cursor: &mut usize| -> StreamResult<()> {
            if len == 0 {
                return Ok(());
            }
            let capacity = buffer.allocated_size();
            let end = (*cursor + len).min(capacity);
            if *cursor >= end {
                // Oversized frame; drain and drop the transfer.
                let mut sink = vec![0; len];
                pipe.recv(&mut sink, self.params.timeout)?;
                return Ok(());
            }
            let received = pipe.recv(&mut buffer.raw_mut()[*cursor..end], self.params.timeout)?;
            *cursor += received;
            self.statistics.lock().unwrap().n_transferred_bytes += received as u64;
            Ok(())
        };

        for _ in 0..self.params.payload_count {
            receive_chunk(&mut pipe, self.params.payload_size, &mut cursor)?;
        }
        receive_chunk(&mut pipe, self.params.payload_final1_size, &mut cursor)?;
        receive_chunk(&mut pipe, self.params.payload_final2_size, &mut cursor)?;

        let trailer_len = pipe.recv(trailer_buf, self.params.timeout)?;
        let trailer = uvsp::Trailer::parse(&trailer_buf[..trailer_len])
            .map_err(|e| StreamError::InvalidPayload(e.to_string().into()))?;

        buffer.frame_id = leader.block_id;
        buffer.timestamp_ns = leader.timestamp;
        buffer.system_timestamp_ns = time::SystemTime::now()
            .duration_since(time::UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos() as u64);
        buffer.received_size = (trailer.valid_payload_size as usize).min(cursor);
        buffer.payload_type = match leader.payload_kind {
            uvsp::PayloadKind::Image => BufferPayloadType::Image,
            uvsp::PayloadKind::ImageExtendedChunk => BufferPayloadType::ExtendedChunkData,
            uvsp::PayloadKind::Chunk => BufferPayloadType::ChunkData,
        };

        buffer.status = if trailer.block_id != leader.block_id {
            BufferStatus::WrongPacketId
        } else if trailer.status != uvsp::PayloadStatus::Success {
            BufferStatus::Aborted
        } else if (trailer.valid_payload_size as usize) > cursor {
            BufferStatus::SizeMismatch
        } else {
            BufferStatus::Success
        };

        if buffer.status == BufferStatus::Success {
            if let Some(image) = &leader.image {
                buffer.parts = vec![BufferPart {
                    offset: 0,
                    size: buffer.received_size,
                    pixel_format: Some(image.pixel_format),
                    width: image.width,
                    height: trailer.actual_height,
                    x_offset: image.x_offset,
                    y_offset: image.y_offset,
                    x_padding: u32::from(image.x_padding),
                    y_padding: 0,
                    data_type: 0,
                    component_id: 0,
                }];
            }
        }

        Ok(())
    }

    fn emit(&self, event: StreamEvent, buffer: Option<&Buffer>) {
        if let Some(callback) = self.callback.lock().unwrap().as_mut() {
            callback(event, buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::buffer_channel;
    use lucida_device::PixelFormat;
    use std::collections::VecDeque;

    /// A pipe that replays canned transfers.
    struct ReplayPipe {
        transfers: Arc<Mutex<VecDeque<Vec<u8>>>>,
    }

    impl StreamPipe for ReplayPipe {
        fn recv(&mut self, buf: &mut [u8], _: time::Duration) -> StreamResult<usize> {
            match self.transfers.lock().unwrap().pop_front() {
                Some(transfer) => {
                    let len = transfer.len().min(buf.len());
                    buf[..len].copy_from_slice(&transfer[..len]);
                    Ok(len)
                }
                None => Err(StreamError::Timeout),
            }
        }
    }

    struct NullControl;

    impl DeviceControl for NullControl {
        fn open(&mut self) -> crate::ControlResult<()> {
            Ok(())
        }
        fn close(&mut self) -> crate::ControlResult<()> {
            Ok(())
        }
        fn is_opened(&self) -> bool {
            true
        }
        fn read(&mut self, _: u64, _: &mut [u8]) -> crate::ControlResult<()> {
            Err(crate::ControlError::NotSupported("test control".into()))
        }
        fn read_reg(&mut self, _: u64) -> crate::ControlResult<u32> {
            Err(crate::ControlError::NotSupported("test control".into()))
        }
        fn write(&mut self, _: u64, _: &[u8]) -> crate::ControlResult<()> {
            Err(crate::ControlError::NotSupported("test control".into()))
        }
        fn write_reg(&mut self, _: u64, _: u32) -> crate::ControlResult<()> {
            Err(crate::ControlError::NotSupported("test control".into()))
        }
        fn genapi(&mut self) -> crate::ControlResult<String> {
            Err(crate::ControlError::NotSupported("test control".into()))
        }
        fn enable_streaming(&mut self) -> crate::ControlResult<()> {
            Ok(())
        }
        fn disable_streaming(&mut self) -> crate::ControlResult<()> {
            Ok(())
        }
    }

    fn frame_transfers(block_id: u64, payload: &[u8]) -> Vec<Vec<u8>> {
        let leader = uvsp::Leader {
            block_id,
            payload_kind: uvsp::PayloadKind::Image,
            timestamp: 42,
            image: Some(uvsp::ImageInfo {
                pixel_format: PixelFormat::Mono8,
                width: payload.len() as u32,
                height: 1,
                x_offset: 0,
                y_offset: 0,
                x_padding: 0,
            }),
        };
        let trailer = uvsp::Trailer {
            block_id,
            status: uvsp::PayloadStatus::Success,
            valid_payload_size: payload.len() as u64,
            actual_height: 1,
        };

        let mut leader_buf = Vec::new();
        leader.serialize(&mut leader_buf).unwrap();
        let mut trailer_buf = Vec::new();
        trailer.serialize(&mut trailer_buf).unwrap();
        vec![leader_buf, payload.to_vec(), trailer_buf]
    }

    #[test]
    fn single_frame_round_trip() {
        let payload: Vec<u8> = (0..64).collect();
        let transfers = Arc::new(Mutex::new(VecDeque::from(frame_transfers(7, &payload))));

        let mut handle = StreamHandle::new(ReplayPipe {
            transfers: transfers.clone(),
        });
        handle.set_params(StreamParams {
            leader_size: 64,
            trailer_size: 64,
            payload_size: 64,
            payload_count: 1,
            payload_final1_size: 0,
            payload_final2_size: 0,
            timeout: time::Duration::from_millis(20),
        });

        let (supply, queue) = buffer_channel(2);
        queue.push_buffer(Buffer::new_allocate(64)).unwrap();

        handle
            .start_streaming_loop(supply, &mut NullControl)
            .unwrap();

        let buffer = queue
            .timeout_pop_buffer(time::Duration::from_secs(2))
            .unwrap();
        assert_eq!(buffer.status(), BufferStatus::Success);
        assert_eq!(buffer.frame_id(), 7);
        assert_eq!(buffer.image_data().unwrap(), payload.as_slice());
        assert_eq!(buffer.image_width().unwrap(), 64);

        handle.stop_streaming_loop().unwrap();
        assert_eq!(handle.statistics().n_completed_buffers, 1);
    }

    #[test]
    fn truncated_frame_reports_size_mismatch() {
        let payload: Vec<u8> = (0..32).collect();
        let mut transfers = frame_transfers(1, &payload);
        // Claim 64 bytes in the trailer while only 32 were delivered.
        let trailer = uvsp::Trailer {
            block_id: 1,
            status: uvsp::PayloadStatus::Success,
            valid_payload_size: 64,
            actual_height: 1,
        };
        let mut trailer_buf = Vec::new();
        trailer.serialize(&mut trailer_buf).unwrap();
        transfers[2] = trailer_buf;

        let mut handle = StreamHandle::new(ReplayPipe {
            transfers: Arc::new(Mutex::new(VecDeque::from(transfers))),
        });
        handle.set_params(StreamParams {
            leader_size: 64,
            trailer_size: 64,
            payload_size: 32,
            payload_count: 1,
            payload_final1_size: 0,
            payload_final2_size: 0,
            timeout: time::Duration::from_millis(20),
        });

        let (supply, queue) = buffer_channel(2);
        queue.push_buffer(Buffer::new_allocate(64)).unwrap();
        handle
            .start_streaming_loop(supply, &mut NullControl)
            .unwrap();

        let buffer = queue
            .timeout_pop_buffer(time::Duration::from_secs(2))
            .unwrap();
        assert_eq!(buffer.status(), BufferStatus::SizeMismatch);

        handle.stop_streaming_loop().unwrap();
    }
}
