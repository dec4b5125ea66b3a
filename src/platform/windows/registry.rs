//! Typed reads of single registry values.

use super::{from_wide, wide};
use std::io;
use windows::core::PCWSTR;
use windows::Win32::System::Registry::{
    RegGetValueW, HKEY, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, RRF_RT_REG_DWORD, RRF_RT_REG_SZ,
};

/// Read a `REG_SZ` value under `HKEY_LOCAL_MACHINE`.
pub fn read_local_machine_string(key: &str, value: &str) -> io::Result<String> {
    read_string(HKEY_LOCAL_MACHINE, key, value)
}

/// Read a `REG_DWORD` value under `HKEY_LOCAL_MACHINE`.
pub fn read_local_machine_dword(key: &str, value: &str) -> io::Result<u32> {
    read_dword(HKEY_LOCAL_MACHINE, key, value)
}

/// Read a `REG_DWORD` value under `HKEY_CURRENT_USER`.
pub fn read_current_user_dword(key: &str, value: &str) -> io::Result<u32> {
    read_dword(HKEY_CURRENT_USER, key, value)
}

fn read_dword(root: HKEY, key: &str, value: &str) -> io::Result<u32> {
    let key = wide(key);
    let value = wide(value);
    let mut data = 0u32;
    let mut size = std::mem::size_of::<u32>() as u32;
    let status = unsafe {
        RegGetValueW(
            root,
            PCWSTR(key.as_ptr()),
            PCWSTR(value.as_ptr()),
            RRF_RT_REG_DWORD,
            None,
            Some(&mut data as *mut u32 as *mut _),
            Some(&mut size),
        )
    };
    status.ok().map_err(io::Error::from)?;
    Ok(data)
}

fn read_string(root: HKEY, key: &str, value: &str) -> io::Result<String> {
    let key = wide(key);
    let value = wide(value);

    let mut size = 0u32;
    let status = unsafe {
        RegGetValueW(
            root,
            PCWSTR(key.as_ptr()),
            PCWSTR(value.as_ptr()),
            RRF_RT_REG_SZ,
            None,
            None,
            Some(&mut size),
        )
    };
    status.ok().map_err(io::Error::from)?;

    let mut buf = vec![0u16; (size as usize).div_ceil(2)];
    let status = unsafe {
        RegGetValueW(
            root,
            PCWSTR(key.as_ptr()),
            PCWSTR(value.as_ptr()),
            RRF_RT_REG_SZ,
            None,
            Some(buf.as_mut_ptr() as *mut _),
            Some(&mut size),
        )
    };
    status.ok().map_err(io::Error::from)?;
    Ok(from_wide(&buf))
}
