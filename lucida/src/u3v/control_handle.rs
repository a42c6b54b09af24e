/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The UVCP control handle: the same reliable-transaction contract as
//! the GVCP client, carried over USB bulk transfers.

use std::{convert::TryInto, time};

use tracing::{debug, warn};

use lucida_device::u3v::protocol::{ack, cmd, cmd::CommandScd};

use crate::{
    utils::unzip_genxml, ControlError, ControlResult, DeviceControl,
};

use super::{
    register_map::{Abrm, Sirm},
    ControlPipe,
};

/// Timeout of one transaction attempt until the device's response time
/// is known.
const INITIAL_TIMEOUT: time::Duration = time::Duration::from_millis(500);

const DEFAULT_RETRY_COUNT: u16 = 5;

/// Transfer lengths until the SBRM maxima have been read.
const INITIAL_TRANSFER_LENGTH: usize = 1024;

pub struct ControlHandle<P> {
    pipe: P,
    next_req_id: u16,
    timeout: time::Duration,
    retry_count: u16,
    maximum_cmd_length: usize,
    maximum_ack_length: usize,
    buffer: Vec<u8>,
    is_opened: bool,
}

impl<P: ControlPipe> ControlHandle<P> {
    pub fn new(pipe: P) -> Self {
        Self {
            pipe,
            next_req_id: 1,
            timeout: INITIAL_TIMEOUT,
            retry_count: DEFAULT_RETRY_COUNT,
            maximum_cmd_length: INITIAL_TRANSFER_LENGTH,
            maximum_ack_length: INITIAL_TRANSFER_LENGTH,
            buffer: vec![0; INITIAL_TRANSFER_LENGTH],
            is_opened: false,
        }
    }

    pub fn set_timeout(&mut self, timeout: time::Duration) {
        self.timeout = timeout;
    }

    fn assert_open(&self) -> ControlResult<()> {
        if self.is_opened {
            Ok(())
        } else {
            Err(ControlError::NotOpened)
        }
    }

    /// Request id of the next transaction; 0 is reserved and skipped on
    /// wrap.
    fn next_request_id(&mut self) -> u16 {
        let id = self.next_req_id;
        self.next_req_id = self.next_req_id.checked_add(1).unwrap_or(1);
        id
    }

    /// One reliable transaction: retransmissions reuse the request id,
    /// foreign ids are discarded, a pending ack extends the running
    /// attempt without consuming a retry.
    fn transaction<'a, T, U>(&'a mut self, command: T) -> ControlResult<U>
    where
        T: CommandScd,
        U: ack::ParseScd<'a>,
    {
        let request_id = self.next_request_id();
        let packet = command.finalize(request_id);
        let mut send_buf = Vec::with_capacity(packet.cmd_len());
        packet.serialize(&mut send_buf)?;

        let mut received_len = None;
        'attempts: for attempt in 0..=self.retry_count {
            if attempt > 0 {
                debug!(request_id, attempt, "retransmitting uvcp command");
            }
            self.pipe.send(&send_buf, self.timeout)?;

            let mut deadline = time::Instant::now() + self.timeout;
            loop {
                let remaining = match deadline.checked_duration_since(time::Instant::now()) {
                    Some(remaining) => remaining,
                    None => break,
                };
                let len = match self.pipe.recv(&mut self.buffer, remaining) {
                    Ok(len) => len,
                    Err(ControlError::Timeout) => break,
                    Err(err) => return Err(err),
                };

                let parsed = match ack::AckPacket::parse(&self.buffer[..len]) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        warn!(%err, "discarding malformed uvcp ack");
                        continue;
                    }
                };
                if parsed.request_id() != request_id {
                    continue;
                }

                if parsed.scd_kind() == ack::AckScdKind::Pending {
                    let pending: ack::Pending = parsed.scd_as()?;
                    deadline = time::Instant::now() + pending.timeout();
                    continue;
                }

                if !parsed.status().is_success() {
                    return Err(ControlError::Protocol(parsed.status().kind().into()));
                }

                received_len = Some(len);
                break 'attempts;
            }
        }

        let received_len = received_len.ok_or(ControlError::Timeout)?;
        ack::AckPacket::parse(&self.buffer[..received_len])?
            .scd_as()
            .map_err(Into::into)
    }

    fn read_mem(&mut self, mut address: u64, buf: &mut [u8]) -> ControlResult<()> {
        let max_read = usize::from(cmd::ReadMem::maximum_read_length(self.maximum_ack_length));
        for chunk in buf.chunks_mut(max_read) {
            let command = cmd::ReadMem::new(address, chunk.len() as u16);
            let answer: ack::ReadMem = self.transaction(command)?;
            if answer.data().len() < chunk.len() {
                return Err(ControlError::Io(anyhow::Error::msg(
                    "`ReadMem` ack is shorter than requested",
                )));
            }
            chunk.copy_from_slice(&answer.data()[..chunk.len()]);
            address += chunk.len() as u64;
        }
        Ok(())
    }

    fn write_mem(&mut self, mut address: u64, data: &[u8]) -> ControlResult<()> {
        let max_write = cmd::WriteMem::maximum_data_length(self.maximum_cmd_length);
        for chunk in data.chunks(max_write) {
            let command = cmd::WriteMem::new(address, chunk)?;
            let answer: ack::WriteMem = self.transaction(command)?;
            if usize::from(answer.length_written()) != chunk.len() {
                return Err(ControlError::Io(anyhow::Error::msg(
                    "`WriteMem` length mismatch",
                )));
            }
            address += chunk.len() as u64;
        }
        Ok(())
    }

    fn sirm(&mut self) -> ControlResult<Sirm> {
        Abrm::new()
            .sbrm(self)?
            .sirm(self)?
            .ok_or(ControlError::NoStreamChannel)
    }
}

impl<P: ControlPipe> DeviceControl for ControlHandle<P> {
    fn open(&mut self) -> ControlResult<()> {
        self.is_opened = true;

        // Learn the device's pacing before any longer transfer.
        let abrm = Abrm::new();
        if let Ok(response_time) = abrm.maximum_device_response_time(self) {
            if response_time > self.timeout {
                self.timeout = response_time;
            }
        }
        let sbrm = abrm.sbrm(self)?;
        if let Ok(max_cmd) = sbrm.maximum_command_transfer_length(self) {
            self.maximum_cmd_length = max_cmd as usize;
        }
        if let Ok(max_ack) = sbrm.maximum_acknowledge_transfer_length(self) {
            self.maximum_ack_length = max_ack as usize;
            if self.buffer.len() < self.maximum_ack_length {
                self.buffer.resize(self.maximum_ack_length, 0);
            }
        }
        Ok(())
    }

    fn close(&mut self) -> ControlResult<()> {
        self.is_opened = false;
        Ok(())
    }

    fn is_opened(&self) -> bool {
        self.is_opened
    }

    fn read(&mut self, address: u64, buf: &mut [u8]) -> ControlResult<()> {
        self.assert_open()?;
        self.read_mem(address, buf)
    }

    fn read_reg(&mut self, address: u64) -> ControlResult<u32> {
        let mut buf = [0; 4];
        self.read(address, &mut buf)?;
        // GenCP register payloads are little endian.
        Ok(u32::from_le_bytes(buf))
    }

    fn write(&mut self, address: u64, data: &[u8]) -> ControlResult<()> {
        self.assert_open()?;
        self.write_mem(address, data)
    }

    fn write_reg(&mut self, address: u64, data: u32) -> ControlResult<()> {
        self.write(address, &data.to_le_bytes())
    }

    fn genapi(&mut self) -> ControlResult<String> {
        self.assert_open()?;

        let table = Abrm::new().manifest_table_address(self)?;
        if table == 0 {
            return Err(ControlError::GenICamNotFound);
        }

        let mut count_buf = [0; 8];
        self.read_mem(table, &mut count_buf)?;
        if u64::from_le_bytes(count_buf) == 0 {
            return Err(ControlError::GenICamNotFound);
        }

        // First manifest entry: file version, format word, address, size.
        let mut entry = [0; 24];
        self.read_mem(table + 8, &mut entry)?;
        let format = u32::from_le_bytes(entry[4..8].try_into().unwrap());
        let address = u64::from_le_bytes(entry[8..16].try_into().unwrap());
        let size = u64::from_le_bytes(entry[16..24].try_into().unwrap());

        let mut xml = vec![0; size as usize];
        self.read_mem(address, &mut xml)?;

        // Bits 10..16 of the format word carry the compression scheme:
        // 0 is plain XML, 1 a ZIP archive.
        let xml = match (format >> 10) & 0x3f {
            0 => xml,
            1 => unzip_genxml(xml)?,
            other => {
                return Err(ControlError::NotSupported(
                    format!("unknown genicam compression scheme {}", other).into(),
                ))
            }
        };
        Ok(String::from_utf8_lossy(&xml).into())
    }

    fn enable_streaming(&mut self) -> ControlResult<()> {
        self.assert_open()?;
        let sirm = self.sirm()?;
        sirm.enable_stream(self)
    }

    fn disable_streaming(&mut self) -> ControlResult<()> {
        self.assert_open()?;
        let sirm = self.sirm()?;
        sirm.disable_stream(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lucida_device::u3v::protocol::{ack::AckSerialize, Status};
    use std::collections::VecDeque;

    /// A scripted pipe: pops one canned answer per received command.
    struct ScriptedPipe {
        sent: Vec<Vec<u8>>,
        answers: VecDeque<Vec<u8>>,
    }

    impl ControlPipe for ScriptedPipe {
        fn send(&mut self, buf: &[u8], _: time::Duration) -> ControlResult<usize> {
            self.sent.push(buf.to_vec());
            Ok(buf.len())
        }

        fn recv(&mut self, buf: &mut [u8], _: time::Duration) -> ControlResult<usize> {
            match self.answers.pop_front() {
                Some(answer) => {
                    buf[..answer.len()].copy_from_slice(&answer);
                    Ok(answer.len())
                }
                None => Err(ControlError::Timeout),
            }
        }
    }

    fn handle_with(answers: Vec<Vec<u8>>) -> ControlHandle<ScriptedPipe> {
        let mut handle = ControlHandle::new(ScriptedPipe {
            sent: Vec::new(),
            answers: answers.into(),
        });
        handle.is_opened = true;
        handle
    }

    #[test]
    fn read_mem_round_trip() {
        let answer = ack::ReadMemData(vec![1, 2, 3, 4]).finalize(Status::SUCCESS, 1).unwrap();
        let mut handle = handle_with(vec![answer]);

        let mut buf = [0; 4];
        handle.read(0x1000, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn foreign_request_id_is_discarded() {
        let foreign = ack::ReadMemData(vec![9; 4]).finalize(Status::SUCCESS, 99).unwrap();
        let expected = ack::ReadMemData(vec![1, 2, 3, 4]).finalize(Status::SUCCESS, 1).unwrap();
        let mut handle = handle_with(vec![foreign, expected]);

        let mut buf = [0; 4];
        handle.read(0x1000, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn pending_ack_extends_the_attempt() {
        let pending = ack::Pending::new(time::Duration::from_millis(100))
            .finalize(Status::SUCCESS, 1)
            .unwrap();
        let answer = ack::WriteMem::new(4).finalize(Status::SUCCESS, 1).unwrap();
        let mut handle = handle_with(vec![pending, answer]);

        handle.write(0x2000, &[0xa, 0xb, 0xc, 0xd]).unwrap();
    }

    #[test]
    fn exhausted_retries_time_out() {
        let mut handle = handle_with(vec![]);
        let mut buf = [0; 4];
        assert!(matches!(
            handle.read(0x1000, &mut buf),
            Err(ControlError::Timeout)
        ));
    }
}
