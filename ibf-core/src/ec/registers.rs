//! Named bitfields for the EC mode-select registers
//!
//! The handshake code never masks raw bytes; every flag it touches is
//! decoded and re-encoded through one of these accessors. Bits outside the
//! named flag are carried through unchanged on write-back.

use bitfield::bitfield;

use crate::constants::registers;

/// A single-flag mode-select register
pub trait ModeRegister: Copy {
    /// EC RAM address of the register
    const ADDR: u16;
    /// Human-readable name used in logs
    const NAME: &'static str;

    fn from_bits(bits: u8) -> Self;
    fn bits(self) -> u8;
    fn flag(self) -> bool;
    fn with_flag(self, on: bool) -> Self;
}

bitfield! {
    /// 0x0727: bit 6 selects the custom fan profile
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct CustomProfileReg(u8);
    impl Debug;
    pub custom_profile, set_custom_profile: 6;
}

bitfield! {
    /// 0x0751: bit 6 is the EC's "full automatic" fan mode
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct FanModeReg(u8);
    impl Debug;
    pub full_auto, set_full_auto: 6;
}

bitfield! {
    /// 0x07c5: bit 7 separates the CPU and GPU custom fan tables
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct CustomTable0Reg(u8);
    impl Debug;
    pub table_enabled, set_table_enabled: 7;
}

bitfield! {
    /// 0x07c6: bit 2 makes the EC follow the custom fan tables
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct CustomTable1Reg(u8);
    impl Debug;
    pub table_enabled, set_table_enabled: 2;
}

macro_rules! mode_register {
    ($ty:ident, $addr:expr, $name:literal, $get:ident, $set:ident) => {
        impl ModeRegister for $ty {
            const ADDR: u16 = $addr;
            const NAME: &'static str = $name;

            fn from_bits(bits: u8) -> Self {
                $ty(bits)
            }

            fn bits(self) -> u8 {
                self.0
            }

            fn flag(self) -> bool {
                self.$get()
            }

            fn with_flag(mut self, on: bool) -> Self {
                self.$set(on);
                self
            }
        }
    };
}

mode_register!(CustomProfileReg, registers::CUSTOM_PROFILE, "custom_profile", custom_profile, set_custom_profile);
mode_register!(FanModeReg, registers::FAN_MODE, "fan_mode", full_auto, set_full_auto);
mode_register!(CustomTable0Reg, registers::CUSTOM_TABLE_0, "custom_table_0", table_enabled, set_table_enabled);
mode_register!(CustomTable1Reg, registers::CUSTOM_TABLE_1, "custom_table_1", table_enabled, set_table_enabled);
