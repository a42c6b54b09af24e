/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Chunk-data parsing: evaluates `Chunk*` features of the genicam
//! document against the chunk payload of a delivered buffer.
//!
//! Chunk features are ordinary register nodes whose port addresses into
//! the buffer's payload; the parser binds such a port for the duration
//! of one access.

use thiserror::Error;

use crate::{
    genapi::{GenApiCtxt, ParamsCtxt},
    payload::Buffer,
    LucidaError,
};

#[derive(Debug, Error)]
pub enum ChunkParserError {
    /// The named feature exists but can't produce the requested type.
    #[error("invalid feature type: {0}")]
    InvalidFeatureType(String),

    /// The buffer carries no chunk data.
    #[error("buffer has no chunk data")]
    BufferNotFound,

    /// The named chunk feature is absent from the document.
    #[error("chunk not found: {0}")]
    ChunkNotFound(String),

    #[error("genapi error: {0}")]
    GenApi(#[from] lucida_genapi::GenApiError),
}

pub type ChunkParserResult<T> = std::result::Result<T, ChunkParserError>;

/// Reads chunk features out of buffers using a genicam context.
///
/// The context is typically built from the same XML as the device's, or
/// from the dedicated chunk XML when the device provides one.
pub struct ChunkParser<Ctxt> {
    ctxt: Ctxt,
}

impl<Ctxt: GenApiCtxt> ChunkParser<Ctxt> {
    pub fn new(ctxt: Ctxt) -> Self {
        Self { ctxt }
    }

    pub fn into_ctxt(self) -> Ctxt {
        self.ctxt
    }

    pub fn get_integer_value(
        &mut self,
        buffer: &Buffer,
        chunk_feature: &str,
    ) -> ChunkParserResult<i64> {
        let mut ctxt = self.bind(buffer)?;
        let node = lookup(&ctxt, chunk_feature)?;
        node.as_integer(&ctxt)
            .ok_or_else(|| ChunkParserError::InvalidFeatureType(chunk_feature.into()))?
            .value(&mut ctxt)
            .map_err(into_chunk_error)
    }

    pub fn get_float_value(
        &mut self,
        buffer: &Buffer,
        chunk_feature: &str,
    ) -> ChunkParserResult<f64> {
        let mut ctxt = self.bind(buffer)?;
        let node = lookup(&ctxt, chunk_feature)?;
        node.as_float(&ctxt)
            .ok_or_else(|| ChunkParserError::InvalidFeatureType(chunk_feature.into()))?
            .value(&mut ctxt)
            .map_err(into_chunk_error)
    }

    pub fn get_string_value(
        &mut self,
        buffer: &Buffer,
        chunk_feature: &str,
    ) -> ChunkParserResult<String> {
        let mut ctxt = self.bind(buffer)?;
        let node = lookup(&ctxt, chunk_feature)?;
        node.as_string(&ctxt)
            .ok_or_else(|| ChunkParserError::InvalidFeatureType(chunk_feature.into()))?
            .value(&mut ctxt)
            .map_err(into_chunk_error)
    }

    pub fn get_boolean_value(
        &mut self,
        buffer: &Buffer,
        chunk_feature: &str,
    ) -> ChunkParserResult<bool> {
        let mut ctxt = self.bind(buffer)?;
        let node = lookup(&ctxt, chunk_feature)?;
        node.as_boolean(&ctxt)
            .ok_or_else(|| ChunkParserError::InvalidFeatureType(chunk_feature.into()))?
            .value(&mut ctxt)
            .map_err(into_chunk_error)
    }

    fn bind<'a>(
        &'a mut self,
        buffer: &'a Buffer,
    ) -> ChunkParserResult<ParamsCtxt<ChunkDevice<'a>, &'a mut Ctxt>> {
        if !buffer.has_chunks() {
            return Err(ChunkParserError::BufferNotFound);
        }
        Ok(ParamsCtxt {
            ctrl: ChunkDevice {
                data: buffer.data(),
            },
            ctxt: &mut self.ctxt,
        })
    }
}

fn lookup<Ctrl, Ctxt: GenApiCtxt>(
    ctxt: &ParamsCtxt<Ctrl, Ctxt>,
    chunk_feature: &str,
) -> ChunkParserResult<crate::genapi::Node> {
    ctxt.node(chunk_feature)
        .ok_or_else(|| ChunkParserError::ChunkNotFound(chunk_feature.into()))
}

fn into_chunk_error(err: LucidaError) -> ChunkParserError {
    match err {
        LucidaError::GenApi(err) => ChunkParserError::GenApi(err),
        other => ChunkParserError::InvalidFeatureType(other.to_string()),
    }
}

/// A read-only device over the chunk payload of one buffer.
pub struct ChunkDevice<'a> {
    data: &'a [u8],
}

impl crate::DeviceControl for ChunkDevice<'_> {
    fn open(&mut self) -> crate::ControlResult<()> {
        Ok(())
    }

    fn close(&mut self) -> crate::ControlResult<()> {
        Ok(())
    }

    fn is_opened(&self) -> bool {
        true
    }

    fn read(&mut self, address: u64, buf: &mut [u8]) -> crate::ControlResult<()> {
        let start = address as usize;
        let end = start + buf.len();
        let slice = self.data.get(start..end).ok_or_else(|| {
            crate::ControlError::InvalidData(anyhow::Error::msg(
                "chunk register read outside the chunk payload",
            ))
        })?;
        buf.copy_from_slice(slice);
        Ok(())
    }

    fn read_reg(&mut self, address: u64) -> crate::ControlResult<u32> {
        let mut buf = [0; 4];
        self.read(address, &mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    fn write(&mut self, _: u64, _: &[u8]) -> crate::ControlResult<()> {
        Err(crate::ControlError::NotSupported(
            "chunk data is read only".into(),
        ))
    }

    fn write_reg(&mut self, _: u64, _: u32) -> crate::ControlResult<()> {
        Err(crate::ControlError::NotSupported(
            "chunk data is read only".into(),
        ))
    }

    fn genapi(&mut self) -> crate::ControlResult<String> {
        Err(crate::ControlError::NotSupported(
            "chunk data carries no genicam file".into(),
        ))
    }

    fn enable_streaming(&mut self) -> crate::ControlResult<()> {
        Err(crate::ControlError::NotSupported(
            "chunk data is not a transport".into(),
        ))
    }

    fn disable_streaming(&mut self) -> crate::ControlResult<()> {
        Err(crate::ControlError::NotSupported(
            "chunk data is not a transport".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genapi::{DefaultGenApiCtxt, FromXml};
    use crate::payload::{BufferPayloadType, BufferStatus};

    const CHUNK_XML: &str = r#"
        <RegisterDescription ModelName="Synth" VendorName="Lucida"
            StandardNameSpace="GEV" SchemaMajorVersion="1" SchemaMinorVersion="1"
            SchemaSubMinorVersion="0" MajorVersion="1" MinorVersion="0"
            SubMinorVersion="0" ProductGuid="1" VersionGuid="1"
            xmlns="http://www.genicam.org/GenApi/Version_1_1">

            <IntReg Name="ChunkExposureTime">
                <Address>0x0</Address>
                <Length>4</Length>
                <AccessMode>RO</AccessMode>
                <pPort>ChunkPort</pPort>
                <Endianess>BigEndian</Endianess>
            </IntReg>

            <Port Name="ChunkPort">
                <ChunkID>1</ChunkID>
            </Port>
        </RegisterDescription>
        "#;

    fn chunk_buffer() -> Buffer {
        let mut buffer = Buffer::new_allocate(16);
        buffer.raw_mut()[..4].copy_from_slice(&1234_u32.to_be_bytes());
        buffer.received_size = 16;
        buffer.status = BufferStatus::Success;
        buffer.payload_type = BufferPayloadType::ChunkData;
        buffer
    }

    #[test]
    fn chunk_integer_is_read_from_buffer_memory() {
        let ctxt = DefaultGenApiCtxt::from_xml(&CHUNK_XML).unwrap();
        let mut parser = ChunkParser::new(ctxt);
        let buffer = chunk_buffer();

        let value = parser
            .get_integer_value(&buffer, "ChunkExposureTime")
            .unwrap();
        assert_eq!(value, 1234);
    }

    #[test]
    fn missing_chunk_feature_is_reported() {
        let ctxt = DefaultGenApiCtxt::from_xml(&CHUNK_XML).unwrap();
        let mut parser = ChunkParser::new(ctxt);
        let buffer = chunk_buffer();

        assert!(matches!(
            parser.get_integer_value(&buffer, "ChunkGain"),
            Err(ChunkParserError::ChunkNotFound(_))
        ));
    }

    #[test]
    fn buffer_without_chunks_is_rejected() {
        let ctxt = DefaultGenApiCtxt::from_xml(&CHUNK_XML).unwrap();
        let mut parser = ChunkParser::new(ctxt);
        let buffer = Buffer::new_allocate(16);

        assert!(matches!(
            parser.get_integer_value(&buffer, "ChunkExposureTime"),
            Err(ChunkParserError::BufferNotFound)
        ));
    }
}
