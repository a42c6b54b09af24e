/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Endianness-explicit scalar I/O over `io::Read`/`io::Write`.
//!
//! The wire codecs in `lucida-device` are a mixture of big-endian (GVCP,
//! GVSP) and little-endian (UVCP, UVSP, GenDC) layouts, so every access
//! names its byte order at the call site.

use std::io;

pub trait ReadBytes {
    fn read_bytes_be<T>(&mut self) -> io::Result<T>
    where
        T: ByteOrdered;

    fn read_bytes_le<T>(&mut self) -> io::Result<T>
    where
        T: ByteOrdered;

    /// Reads a 24-bit big-endian unsigned value, widened to `u32`.
    fn read_u24_be(&mut self) -> io::Result<u32>;
}

pub trait WriteBytes {
    fn write_bytes_be<T>(&mut self, value: T) -> io::Result<()>
    where
        T: ByteOrdered;

    fn write_bytes_le<T>(&mut self, value: T) -> io::Result<()>
    where
        T: ByteOrdered;

    /// Writes the low 24 bits of `value` big-endian.
    fn write_u24_be(&mut self, value: u32) -> io::Result<()>;
}

impl<R> ReadBytes for R
where
    R: io::Read,
{
    fn read_bytes_be<T>(&mut self) -> io::Result<T>
    where
        T: ByteOrdered,
    {
        T::read_be(self)
    }

    fn read_bytes_le<T>(&mut self) -> io::Result<T>
    where
        T: ByteOrdered,
    {
        T::read_le(self)
    }

    fn read_u24_be(&mut self) -> io::Result<u32> {
        let mut buf = [0_u8; 3];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes([0, buf[0], buf[1], buf[2]]))
    }
}

impl<W> WriteBytes for W
where
    W: io::Write,
{
    fn write_bytes_be<T>(&mut self, value: T) -> io::Result<()>
    where
        T: ByteOrdered,
    {
        value.write_be(self)
    }

    fn write_bytes_le<T>(&mut self, value: T) -> io::Result<()>
    where
        T: ByteOrdered,
    {
        value.write_le(self)
    }

    fn write_u24_be(&mut self, value: u32) -> io::Result<()> {
        let bytes = value.to_be_bytes();
        self.write_all(&bytes[1..])
    }
}

pub trait ByteOrdered {
    fn read_be<R>(buf: &mut R) -> io::Result<Self>
    where
        Self: Sized,
        R: io::Read + ?Sized;

    fn read_le<R>(buf: &mut R) -> io::Result<Self>
    where
        Self: Sized,
        R: io::Read + ?Sized;

    fn write_be<W>(self, buf: &mut W) -> io::Result<()>
    where
        Self: Sized,
        W: io::Write + ?Sized;

    fn write_le<W>(self, buf: &mut W) -> io::Result<()>
    where
        Self: Sized,
        W: io::Write + ?Sized;
}

macro_rules! impl_byte_ordered {
    ($($ty:ty,)*) => {
        $(
            impl ByteOrdered for $ty {
                fn read_be<R>(buf: &mut R) -> io::Result<Self>
                where
                    R: io::Read + ?Sized,
                {
                    let mut tmp = [0; std::mem::size_of::<$ty>()];
                    buf.read_exact(&mut tmp)?;
                    Ok(<$ty>::from_be_bytes(tmp))
                }

                fn read_le<R>(buf: &mut R) -> io::Result<Self>
                where
                    R: io::Read + ?Sized,
                {
                    let mut tmp = [0; std::mem::size_of::<$ty>()];
                    buf.read_exact(&mut tmp)?;
                    Ok(<$ty>::from_le_bytes(tmp))
                }

                fn write_be<W>(self, buf: &mut W) -> io::Result<()>
                where
                    W: io::Write + ?Sized,
                {
                    buf.write_all(&self.to_be_bytes())
                }

                fn write_le<W>(self, buf: &mut W) -> io::Result<()>
                where
                    W: io::Write + ?Sized,
                {
                    buf.write_all(&self.to_le_bytes())
                }
            }
        )*
    };
}

impl_byte_ordered! {
    u8,
    u16,
    u32,
    u64,
    i8,
    i16,
    i32,
    i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn scalar_round_trip() {
        let mut buf = Vec::new();
        buf.write_bytes_be(0xdead_beef_u32).unwrap();
        buf.write_bytes_le(0x1234_u16).unwrap();
        assert_eq!(buf, [0xde, 0xad, 0xbe, 0xef, 0x34, 0x12]);

        let mut cursor = Cursor::new(buf.as_slice());
        assert_eq!(cursor.read_bytes_be::<u32>().unwrap(), 0xdead_beef);
        assert_eq!(cursor.read_bytes_le::<u16>().unwrap(), 0x1234);
    }

    #[test]
    fn u24_round_trip() {
        let mut buf = Vec::new();
        buf.write_u24_be(0x00ab_cdef).unwrap();
        assert_eq!(buf, [0xab, 0xcd, 0xef]);
        assert_eq!(Cursor::new(&buf).read_u24_be().unwrap(), 0x00ab_cdef);
    }

    #[test]
    fn short_read_is_error() {
        let mut cursor = Cursor::new([0_u8; 2].as_ref());
        assert!(cursor.read_bytes_be::<u32>().is_err());
    }
}
