// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! QRVMC Utilities - Native Argument Access and Debug Tools
//!
//! Callbacks receive raw pointers from the VM. The helpers here turn them
//! into owned values or borrowed slices, rejecting null pointers instead of
//! dereferencing them.
//!
//! # Usage
//!
//! ```rust
//! use qrvmc_rust::qrvmc::utils::format_hex;
//!
//! let data = vec![0x12, 0x34, 0x56, 0x78];
//! assert_eq!(format_hex(&data), "12345678");
//! ```

use crate::qrvmc::error::{null_pointer_error, HostCallbackResult};
use crate::qrvmc::ffi;
use crate::qrvmc::types::{Address, Hash};

/// Hex string (no prefix) for logs and error messages
pub fn format_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Read a 20-byte address passed by pointer
///
/// # Safety
/// A non-null `ptr` must point to a readable `qrvmc_address`.
pub unsafe fn read_address(
    ptr: *const ffi::qrvmc_address,
    param: &str,
    function: &str,
) -> HostCallbackResult<Address> {
    match ptr.as_ref() {
        Some(address) => Ok((*address).into()),
        None => Err(null_pointer_error(param, function)),
    }
}

/// Read a 32-byte word passed by pointer
///
/// # Safety
/// A non-null `ptr` must point to a readable `qrvmc_bytes32`.
pub unsafe fn read_bytes32(
    ptr: *const ffi::qrvmc_bytes32,
    param: &str,
    function: &str,
) -> HostCallbackResult<Hash> {
    match ptr.as_ref() {
        Some(word) => Ok((*word).into()),
        None => Err(null_pointer_error(param, function)),
    }
}

/// Borrow a `(pointer, length)` pair as a slice. A null pointer is accepted
/// only together with a zero length.
///
/// # Safety
/// A non-null `ptr` must point to `len` readable bytes that stay valid for `'a`.
pub unsafe fn read_bytes<'a>(
    ptr: *const u8,
    len: usize,
    param: &str,
    function: &str,
) -> HostCallbackResult<&'a [u8]> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(null_pointer_error(param, function));
    }
    Ok(std::slice::from_raw_parts(ptr, len))
}

/// Borrow a writable `(pointer, length)` pair as a slice.
///
/// # Safety
/// A non-null `ptr` must point to `len` writable bytes that stay valid for
/// `'a` and are not aliased.
pub unsafe fn write_buffer<'a>(
    ptr: *mut u8,
    len: usize,
    param: &str,
    function: &str,
) -> HostCallbackResult<&'a mut [u8]> {
    if len == 0 {
        return Ok(&mut []);
    }
    if ptr.is_null() {
        return Err(null_pointer_error(param, function));
    }
    Ok(std::slice::from_raw_parts_mut(ptr, len))
}

/// Borrow an array of `count` words.
///
/// # Safety
/// A non-null `ptr` must point to `count` readable `qrvmc_bytes32` values.
pub unsafe fn read_words<'a>(
    ptr: *const ffi::qrvmc_bytes32,
    count: usize,
    param: &str,
    function: &str,
) -> HostCallbackResult<&'a [ffi::qrvmc_bytes32]> {
    if count == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(null_pointer_error(param, function));
    }
    Ok(std::slice::from_raw_parts(ptr, count))
}
