#![allow(non_camel_case_types)]

// Uinput ioctl requests and structures
pub const UI_SET_EVBIT: libc::c_ulong = 0x40045564;
pub const UI_SET_KEYBIT: libc::c_ulong = 0x40045565;
pub const UI_SET_RELBIT: libc::c_ulong = 0x40045566;
pub const UI_SET_ABSBIT: libc::c_ulong = 0x40045567;
pub const UI_SET_PROPBIT: libc::c_ulong = 0x4004556e;
pub const UI_DEV_SETUP: libc::c_ulong = 0x405c5503;
pub const UI_ABS_SETUP: libc::c_ulong = 0x401c5504;
pub const UI_DEV_CREATE: libc::c_ulong = 0x5501;
pub const UI_DEV_DESTROY: libc::c_ulong = 0x5502;

/// Length of `uinput_setup::name`, including the terminating NUL.
pub const UINPUT_MAX_NAME_SIZE: usize = 80;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct input_id {
    pub bustype: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

#[repr(C)]
#[derive(Debug)]
pub struct uinput_setup {
    pub id: input_id,
    pub name: [u8; UINPUT_MAX_NAME_SIZE],
    pub ff_effects_max: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct input_absinfo {
    pub value: i32,
    pub minimum: i32,
    pub maximum: i32,
    pub fuzz: i32,
    pub flat: i32,
    pub resolution: i32,
}

#[repr(C)]
#[derive(Debug)]
pub struct uinput_abs_setup {
    pub code: u16,
    pub absinfo: input_absinfo,
}
