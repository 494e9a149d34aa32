// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Code Related Host Functions
//!
//! Access to the code of any account known to the host:
//!
//! - [`get_code_size`] - Code length in bytes
//! - [`get_code_hash`] - Hash of the code (zero for unknown accounts)
//! - [`copy_code`] - Copy a window of the code into a VM buffer

use super::with_host;
use crate::qrvmc::ffi;
use crate::qrvmc::utils::{read_address, write_buffer};

pub(crate) unsafe extern "C" fn get_code_size(
    context: *mut ffi::qrvmc_host_context,
    address: *const ffi::qrvmc_address,
) -> usize {
    with_host(context, "get_code_size", 0, |host| {
        let address = read_address(address, "address", "get_code_size")?;
        Ok(host.get_code_size(&address))
    })
}

pub(crate) unsafe extern "C" fn get_code_hash(
    context: *mut ffi::qrvmc_host_context,
    address: *const ffi::qrvmc_address,
) -> ffi::qrvmc_bytes32 {
    with_host(context, "get_code_hash", ffi::qrvmc_bytes32::default(), |host| {
        let address = read_address(address, "address", "get_code_hash")?;
        Ok(host.get_code_hash(&address).into())
    })
}

/// Code copy callback
///
/// Copies `min(buffer_size, code_size - code_offset)` bytes and returns the
/// number of bytes written; 0 when `code_offset` is past the end.
pub(crate) unsafe extern "C" fn copy_code(
    context: *mut ffi::qrvmc_host_context,
    address: *const ffi::qrvmc_address,
    code_offset: usize,
    buffer_data: *mut u8,
    buffer_size: usize,
) -> usize {
    with_host(context, "copy_code", 0, |host| {
        let address = read_address(address, "address", "copy_code")?;
        let buffer = write_buffer(buffer_data, buffer_size, "buffer_data", "copy_code")?;
        let written = host.copy_code(&address, code_offset, buffer);
        // Never report more than the VM's buffer holds
        Ok(written.min(buffer_size))
    })
}
