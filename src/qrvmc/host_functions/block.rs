// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Block and Transaction Information Host Functions
//!
//! - [`get_tx_context`] - Gas price, origin, coinbase, block number and friends
//! - [`get_block_hash`] - Hash of a recent block, zero when unavailable

use super::with_host;
use crate::qrvmc::ffi;

pub(crate) unsafe extern "C" fn get_tx_context(
    context: *mut ffi::qrvmc_host_context,
) -> ffi::qrvmc_tx_context {
    with_host(context, "get_tx_context", ffi::qrvmc_tx_context::default(), |host| {
        Ok(host.get_tx_context().into())
    })
}

pub(crate) unsafe extern "C" fn get_block_hash(
    context: *mut ffi::qrvmc_host_context,
    number: i64,
) -> ffi::qrvmc_bytes32 {
    with_host(context, "get_block_hash", ffi::qrvmc_bytes32::default(), |host| {
        Ok(host.get_block_hash(number).into())
    })
}
