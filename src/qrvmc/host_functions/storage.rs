// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Storage Related Host Functions
//!
//! Contract storage is a key-value store of 32-byte words owned by the host.
//! The binding only moves the words across the boundary.
//!
//! # Functions
//!
//! - [`get_storage`] - Load a word (SLOAD); unknown slots read as zero
//! - [`set_storage`] - Store a word (SSTORE) and report the effect
//! - [`access_storage`] - Mark a slot as accessed, report warm/cold

use super::with_host;
use crate::qrvmc::ffi;
use crate::qrvmc::types::{AccessStatus, StorageStatus};
use crate::qrvmc::utils::{read_address, read_bytes32};

/// Storage load callback
///
/// Answers the zero word if the handle or a pointer argument is invalid.
pub(crate) unsafe extern "C" fn get_storage(
    context: *mut ffi::qrvmc_host_context,
    address: *const ffi::qrvmc_address,
    key: *const ffi::qrvmc_bytes32,
) -> ffi::qrvmc_bytes32 {
    with_host(context, "get_storage", ffi::qrvmc_bytes32::default(), |host| {
        let address = read_address(address, "address", "get_storage")?;
        let key = read_bytes32(key, "key", "get_storage")?;
        Ok(host.get_storage(&address, &key).into())
    })
}

/// Storage store callback
///
/// Answers `Assigned` (a no-op write) if the store could not be delivered.
pub(crate) unsafe extern "C" fn set_storage(
    context: *mut ffi::qrvmc_host_context,
    address: *const ffi::qrvmc_address,
    key: *const ffi::qrvmc_bytes32,
    value: *const ffi::qrvmc_bytes32,
) -> ffi::qrvmc_storage_status {
    with_host(context, "set_storage", StorageStatus::Assigned.raw(), |host| {
        let address = read_address(address, "address", "set_storage")?;
        let key = read_bytes32(key, "key", "set_storage")?;
        let value = read_bytes32(value, "value", "set_storage")?;
        Ok(host.set_storage(&address, &key, &value).raw())
    })
}

pub(crate) unsafe extern "C" fn access_storage(
    context: *mut ffi::qrvmc_host_context,
    address: *const ffi::qrvmc_address,
    key: *const ffi::qrvmc_bytes32,
) -> ffi::qrvmc_access_status {
    with_host(context, "access_storage", AccessStatus::Cold.raw(), |host| {
        let address = read_address(address, "address", "access_storage")?;
        let key = read_bytes32(key, "key", "access_storage")?;
        Ok(host.access_storage(&address, &key).raw())
    })
}
