/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::convert::TryFrom;

#[allow(clippy::enum_glob_use)]
use PixelFormat::*;

/// Pixel format of an image, following the PFNC (Pixel Format Naming
/// Convention) 32-bit codes shared by GigE Vision and USB3 Vision.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Monochrome 8-bit.
    Mono8,

    /// Monochrome 8-bit signed.
    Mono8s,

    /// Monochrome 10-bit unpacked.
    Mono10,

    /// Monochrome 10-bit packed.
    Mono10Packed,

    /// Monochrome 12-bit unpacked.
    Mono12,

    /// Monochrome 12-bit packed.
    Mono12Packed,

    /// Monochrome 14-bit unpacked.
    Mono14,

    /// Monochrome 16-bit.
    Mono16,

    /// Bayer Green-Red 8-bit.
    BayerGR8,

    /// Bayer Red-Green 8-bit.
    BayerRG8,

    /// Bayer Green-Blue 8-bit.
    BayerGB8,

    /// Bayer Blue-Green 8-bit.
    BayerBG8,

    /// Bayer Green-Red 10-bit unpacked.
    BayerGR10,

    /// Bayer Red-Green 10-bit unpacked.
    BayerRG10,

    /// Bayer Green-Blue 10-bit unpacked.
    BayerGB10,

    /// Bayer Blue-Green 10-bit unpacked.
    BayerBG10,

    /// Bayer Green-Red 12-bit unpacked.
    BayerGR12,

    /// Bayer Red-Green 12-bit unpacked.
    BayerRG12,

    /// Bayer Green-Blue 12-bit unpacked.
    BayerGB12,

    /// Bayer Blue-Green 12-bit unpacked.
    BayerBG12,

    /// Bayer Green-Red 16-bit.
    BayerGR16,

    /// Bayer Red-Green 16-bit.
    BayerRG16,

    /// Bayer Green-Blue 16-bit.
    BayerGB16,

    /// Bayer Blue-Green 16-bit.
    BayerBG16,

    /// Red-Green-Blue 8-bit.
    RGB8,

    /// Blue-Green-Red 8-bit.
    BGR8,

    /// Red-Green-Blue-alpha 8-bit.
    RGBa8,

    /// Blue-Green-Red-alpha 8-bit.
    BGRa8,

    /// Red-Green-Blue 10-bit unpacked.
    RGB10,

    /// Blue-Green-Red 10-bit unpacked.
    BGR10,

    /// Red-Green-Blue 12-bit unpacked.
    RGB12,

    /// Blue-Green-Red 12-bit unpacked.
    BGR12,

    /// Red-Green-Blue 16-bit.
    RGB16,

    /// YUV 4:2:2 8-bit.
    YUV422_8,

    /// YCbCr 4:2:2 8-bit.
    YCbCr422_8,

    /// YUV 4:4:4 8-bit.
    YUV8_UYV,

    /// Coordinate 3D A 32-bit floating point.
    Coord3D_A32f,

    /// Confidence 1-bit unpacked.
    Confidence1,

    /// Confidence 8-bit.
    Confidence8,
}

impl PixelFormat {
    /// Returns the PFNC 32-bit code of the format.
    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            Mono8 => 0x0108_0001,
            Mono8s => 0x0108_0002,
            Mono10 => 0x0110_0003,
            Mono10Packed => 0x010C_0004,
            Mono12 => 0x0110_0005,
            Mono12Packed => 0x010C_0006,
            Mono14 => 0x0110_0025,
            Mono16 => 0x0110_0007,
            BayerGR8 => 0x0108_0008,
            BayerRG8 => 0x0108_0009,
            BayerGB8 => 0x0108_000A,
            BayerBG8 => 0x0108_000B,
            BayerGR10 => 0x0110_000C,
            BayerRG10 => 0x0110_000D,
            BayerGB10 => 0x0110_000E,
            BayerBG10 => 0x0110_000F,
            BayerGR12 => 0x0110_0010,
            BayerRG12 => 0x0110_0011,
            BayerGB12 => 0x0110_0012,
            BayerBG12 => 0x0110_0013,
            BayerGR16 => 0x0110_002E,
            BayerRG16 => 0x0110_002F,
            BayerGB16 => 0x0110_0030,
            BayerBG16 => 0x0110_0031,
            RGB8 => 0x0218_0014,
            BGR8 => 0x0218_0015,
            RGBa8 => 0x0220_0016,
            BGRa8 => 0x0220_0017,
            RGB10 => 0x0230_0018,
            BGR10 => 0x0230_0019,
            RGB12 => 0x0230_001A,
            BGR12 => 0x0230_001B,
            RGB16 => 0x0230_0033,
            YUV422_8 => 0x0210_0032,
            YCbCr422_8 => 0x0210_003B,
            YUV8_UYV => 0x0218_0020,
            Coord3D_A32f => 0x0120_00C2,
            Confidence1 => 0x0108_00C4,
            Confidence8 => 0x0108_00C6,
        }
    }

    /// Bits occupied by one pixel, taken from the PFNC code's size field.
    #[must_use]
    pub fn bits_per_pixel(self) -> u32 {
        (self.code() >> 16) & 0xff
    }
}

impl From<PixelFormat> for u32 {
    fn from(pf: PixelFormat) -> Self {
        pf.code()
    }
}

impl TryFrom<u32> for PixelFormat {
    type Error = String;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        const ALL: &[PixelFormat] = &[
            Mono8,
            Mono8s,
            Mono10,
            Mono10Packed,
            Mono12,
            Mono12Packed,
            Mono14,
            Mono16,
            BayerGR8,
            BayerRG8,
            BayerGB8,
            BayerBG8,
            BayerGR10,
            BayerRG10,
            BayerGB10,
            BayerBG10,
            BayerGR12,
            BayerRG12,
            BayerGB12,
            BayerBG12,
            BayerGR16,
            BayerRG16,
            BayerGB16,
            BayerBG16,
            RGB8,
            BGR8,
            RGBa8,
            BGRa8,
            RGB10,
            BGR10,
            RGB12,
            BGR12,
            RGB16,
            YUV422_8,
            YCbCr422_8,
            YUV8_UYV,
            Coord3D_A32f,
            Confidence1,
            Confidence8,
        ];

        ALL.iter()
            .find(|pf| pf.code() == code)
            .copied()
            .ok_or_else(|| format!("unknown pixel format code: {:#010x}", code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::TryInto;

    #[allow(clippy::enum_glob_use)]
    use PixelFormat::*;

    #[test]
    fn code_round_trip() {
        let formats = [Mono8, Mono16, BayerRG10, RGB8, BGRa8, YCbCr422_8];
        for pf in formats {
            let code: u32 = pf.into();
            let back: PixelFormat = code.try_into().unwrap();
            assert_eq!(back, pf);
        }
    }

    #[test]
    fn bits_per_pixel_from_code() {
        assert_eq!(Mono8.bits_per_pixel(), 8);
        assert_eq!(Mono12.bits_per_pixel(), 16);
        assert_eq!(Mono12Packed.bits_per_pixel(), 12);
        assert_eq!(RGB8.bits_per_pixel(), 24);
        assert_eq!(RGBa8.bits_per_pixel(), 32);
        assert_eq!(YUV422_8.bits_per_pixel(), 16);
    }

    #[test]
    fn unknown_code_is_rejected() {
        let res: Result<PixelFormat, _> = 0xdead_beef_u32.try_into();
        assert!(res.is_err());
    }
}
