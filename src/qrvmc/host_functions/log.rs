// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Event Logging Host Functions
//!
//! A log carries the emitting address, arbitrary data and a list of 32-byte
//! topics. Both buffers are borrowed from the VM for the duration of the
//! callback and copied into an owned [`LogEvent`].

use super::with_host;
use crate::qrvmc::ffi;
use crate::qrvmc::traits::LogEvent;
use crate::qrvmc::types::Hash;
use crate::qrvmc::utils::{read_address, read_bytes, read_words};

pub(crate) unsafe extern "C" fn emit_log(
    context: *mut ffi::qrvmc_host_context,
    address: *const ffi::qrvmc_address,
    data: *const u8,
    data_size: usize,
    topics: *const ffi::qrvmc_bytes32,
    topics_count: usize,
) {
    with_host(context, "emit_log", (), |host| {
        let address = read_address(address, "address", "emit_log")?;
        let data = read_bytes(data, data_size, "data", "emit_log")?;
        let topics = read_words(topics, topics_count, "topics", "emit_log")?;

        host.emit_log(LogEvent {
            address,
            data: data.to_vec(),
            topics: topics.iter().map(|topic| Hash::from(*topic)).collect(),
        });
        Ok(())
    })
}
