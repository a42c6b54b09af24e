/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! GenDC (Generic Data Container) descriptor codec.
//!
//! A GenDC payload starts with a little-endian two-level descriptor: a
//! container header holding a table of component offsets, each component
//! holding a table of part offsets, each part locating its data region
//! inside the payload. All offsets are relative to the container start.

use std::{borrow::Cow, io};

use lucida_impl::byte_io::{ReadBytes, WriteBytes};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GenDcError>;

#[derive(Debug, Error)]
pub enum GenDcError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("descriptor is broken: {0}")]
    InvalidDescriptor(Cow<'static, str>),
}

/// `GNDC`, little-endian.
pub const SIGNATURE: u32 = u32::from_le_bytes(*b"GNDC");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDescriptor {
    /// Total size of the data region following the descriptor.
    pub data_size: u64,
    pub components: Vec<ComponentDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescriptor {
    /// Component identifier (e.g. intensity, confidence, metadata).
    pub component_id: u16,
    pub parts: Vec<PartDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartDescriptor {
    /// PFNC format code of the part data.
    pub format: u32,
    pub data_type: u16,
    pub width: u32,
    pub height: u32,
    pub x_padding: u16,
    pub y_padding: u16,
    /// Offset of the part data, relative to the container start.
    pub data_offset: u64,
    pub data_size: u64,
}

impl PartDescriptor {
    const WIRE_LEN: u64 = 36;

    fn parse(cursor: &mut io::Cursor<&[u8]>) -> Result<Self> {
        let format = cursor.read_bytes_le()?;
        let data_type = cursor.read_bytes_le()?;
        let _reserved: u16 = cursor.read_bytes_le()?;
        let width = cursor.read_bytes_le()?;
        let height = cursor.read_bytes_le()?;
        let x_padding = cursor.read_bytes_le()?;
        let y_padding = cursor.read_bytes_le()?;
        let data_offset = cursor.read_bytes_le()?;
        let data_size = cursor.read_bytes_le()?;
        Ok(Self {
            format,
            data_type,
            width,
            height,
            x_padding,
            y_padding,
            data_offset,
            data_size,
        })
    }

    fn serialize(&self, mut buf: impl io::Write) -> Result<()> {
        buf.write_bytes_le(self.format)?;
        buf.write_bytes_le(self.data_type)?;
        buf.write_bytes_le(0_u16)?;
        buf.write_bytes_le(self.width)?;
        buf.write_bytes_le(self.height)?;
        buf.write_bytes_le(self.x_padding)?;
        buf.write_bytes_le(self.y_padding)?;
        buf.write_bytes_le(self.data_offset)?;
        buf.write_bytes_le(self.data_size)?;
        Ok(())
    }
}

impl ContainerDescriptor {
    /// Parses the descriptor found at the start of `payload`.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut cursor = io::Cursor::new(payload);
        let signature: u32 = cursor.read_bytes_le()?;
        if signature != SIGNATURE {
            return Err(GenDcError::InvalidDescriptor(
                "invalid GenDC signature".into(),
            ));
        }
        let _descriptor_size: u32 = cursor.read_bytes_le()?;
        let data_size = cursor.read_bytes_le()?;
        let component_count: u16 = cursor.read_bytes_le()?;
        let _reserved: u16 = cursor.read_bytes_le()?;

        let mut component_offsets = Vec::with_capacity(component_count as usize);
        for _ in 0..component_count {
            component_offsets.push(cursor.read_bytes_le::<u64>()?);
        }

        let mut components = Vec::with_capacity(component_count as usize);
        for offset in component_offsets {
            let mut comp_cursor = io::Cursor::new(payload);
            comp_cursor.set_position(offset);
            components.push(Self::parse_component(payload, &mut comp_cursor)?);
        }

        Ok(Self {
            data_size,
            components,
        })
    }

    fn parse_component(
        payload: &[u8],
        cursor: &mut io::Cursor<&[u8]>,
    ) -> Result<ComponentDescriptor> {
        let component_id = cursor.read_bytes_le()?;
        let part_count: u16 = cursor.read_bytes_le()?;
        let mut part_offsets = Vec::with_capacity(part_count as usize);
        for _ in 0..part_count {
            part_offsets.push(cursor.read_bytes_le::<u64>()?);
        }

        let mut parts = Vec::with_capacity(part_count as usize);
        for offset in part_offsets {
            let mut part_cursor = io::Cursor::new(payload);
            part_cursor.set_position(offset);
            parts.push(PartDescriptor::parse(&mut part_cursor)?);
        }

        Ok(ComponentDescriptor {
            component_id,
            parts,
        })
    }

    /// Serializes the descriptor. The returned length equals
    /// [`Self::descriptor_len`], so data regions can be appended directly.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let container_fixed = 20 + 8 * self.components.len() as u64;

        buf.write_bytes_le(SIGNATURE)?;
        buf.write_bytes_le(self.descriptor_len() as u32)?;
        buf.write_bytes_le(self.data_size)?;
        buf.write_bytes_le(self.components.len() as u16)?;
        buf.write_bytes_le(0_u16)?;

        // Component offset table.
        let mut offset = container_fixed;
        for comp in &self.components {
            buf.write_bytes_le(offset)?;
            offset += 4 + 8 * comp.parts.len() as u64 + PartDescriptor::WIRE_LEN * comp.parts.len() as u64;
        }

        // Components, each followed by its parts.
        let mut comp_base = container_fixed;
        for comp in &self.components {
            buf.write_bytes_le(comp.component_id)?;
            buf.write_bytes_le(comp.parts.len() as u16)?;
            let parts_base = comp_base + 4 + 8 * comp.parts.len() as u64;
            for (i, _) in comp.parts.iter().enumerate() {
                buf.write_bytes_le(parts_base + PartDescriptor::WIRE_LEN * i as u64)?;
            }
            for part in &comp.parts {
                part.serialize(&mut buf)?;
            }
            comp_base = parts_base + PartDescriptor::WIRE_LEN * comp.parts.len() as u64;
        }

        Ok(buf)
    }

    /// Byte length of the serialized descriptor.
    #[must_use]
    pub fn descriptor_len(&self) -> usize {
        let mut len = 20 + 8 * self.components.len();
        for comp in &self.components {
            len += 4 + (8 + PartDescriptor::WIRE_LEN as usize) * comp.parts.len();
        }
        len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ContainerDescriptor {
        ContainerDescriptor {
            data_size: 2048,
            components: vec![
                ComponentDescriptor {
                    component_id: 1,
                    parts: vec![PartDescriptor {
                        format: 0x0108_0001,
                        data_type: 1,
                        width: 32,
                        height: 32,
                        x_padding: 0,
                        y_padding: 0,
                        data_offset: 256,
                        data_size: 1024,
                    }],
                },
                ComponentDescriptor {
                    component_id: 4,
                    parts: vec![
                        PartDescriptor {
                            format: 0x0110_0007,
                            data_type: 1,
                            width: 16,
                            height: 16,
                            x_padding: 0,
                            y_padding: 0,
                            data_offset: 1280,
                            data_size: 512,
                        },
                        PartDescriptor {
                            format: 0x0108_0001,
                            data_type: 2,
                            width: 16,
                            height: 16,
                            x_padding: 2,
                            y_padding: 0,
                            data_offset: 1792,
                            data_size: 256,
                        },
                    ],
                },
            ],
        }
    }

    #[test]
    fn descriptor_round_trip() {
        let desc = descriptor();
        let buf = desc.serialize().unwrap();
        assert_eq!(buf.len(), desc.descriptor_len());

        let parsed = ContainerDescriptor::parse(&buf).unwrap();
        assert_eq!(parsed, desc);
    }

    #[test]
    fn bad_signature_is_rejected() {
        let mut buf = descriptor().serialize().unwrap();
        buf[0] = b'X';
        assert!(ContainerDescriptor::parse(&buf).is_err());
    }

    #[test]
    fn truncated_descriptor_is_rejected() {
        let buf = descriptor().serialize().unwrap();
        assert!(ContainerDescriptor::parse(&buf[..16]).is_err());
    }
}
