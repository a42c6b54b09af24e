/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Bit accessors for register-map flag words.
//!
//! The GigE Vision and USB3 Vision specifications number bits from the
//! MSB, so positions here are MSB-relative.

pub trait BitField: Sized {
    /// `pos` is the distance from the MSB.
    fn set_bit(self, pos: u8) -> Self;
    /// `pos` is the distance from the MSB.
    fn clear_bit(self, pos: u8) -> Self;
    /// `pos` is the distance from the MSB.
    fn is_set(self, pos: u8) -> bool;
}

macro_rules! impl_bit_field {
    ($($ty:ty,)*) => {
        $(
            impl BitField for $ty {
                fn set_bit(self, pos: u8) -> Self {
                    let num_bits = (std::mem::size_of::<Self>() * 8) as u8;
                    debug_assert!(pos < num_bits);
                    self | (1 << (num_bits - 1 - pos))
                }

                fn clear_bit(self, pos: u8) -> Self {
                    let num_bits = (std::mem::size_of::<Self>() * 8) as u8;
                    debug_assert!(pos < num_bits);
                    self & !(1 << (num_bits - 1 - pos))
                }

                fn is_set(self, pos: u8) -> bool {
                    let num_bits = (std::mem::size_of::<Self>() * 8) as u8;
                    debug_assert!(pos < num_bits);
                    (self >> (num_bits - 1 - pos)) & 1 == 1
                }
            }
        )*
    };
}

impl_bit_field! {
    u8,
    u16,
    u32,
    u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msb_relative_positions() {
        assert!(0x8000_0000_u32.is_set(0));
        assert!(!0x8000_0000_u32.is_set(31));
        assert_eq!(0_u32.set_bit(0), 0x8000_0000);
        assert_eq!(0_u16.set_bit(15), 1);
        assert_eq!(0xffff_u16.clear_bit(15), 0xfffe);
    }
}
