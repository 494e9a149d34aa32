// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! QRVMC Host Functions Implementation
//!
//! This module contains the `extern "C"` callbacks the binding hands to a VM,
//! organized by functional categories:
//!
//! - **Account**: Existence, balance and access tracking of accounts
//! - **Storage**: Contract storage reads, writes and access tracking
//! - **Code**: Code size, hash and copy of other accounts
//! - **Contract**: Nested calls and contract creation
//! - **Control**: Self-destruct
//! - **Block**: Transaction context and block hashes
//! - **Log**: Event logging
//!
//! Every callback receives the registry handle in place of the host context
//! pointer. [`with_host`] resolves it, runs the callback body against the
//! registered [`HostContext`] and turns every failure into the ABI default
//! answer for that callback: nothing unwinds into native code.

pub mod account;
pub mod block;
pub mod code;
pub mod contract;
pub mod control;
pub mod log;
pub mod storage;

use crate::qrvmc::error::{context_not_found_error, host_panicked_error, HostCallbackResult};
use crate::qrvmc::ffi;
use crate::qrvmc::registry;
use crate::qrvmc::traits::HostContext;
use std::panic::{self, AssertUnwindSafe};

/// The callback table passed to every `execute` call, in ABI order.
pub static HOST_INTERFACE: ffi::qrvmc_host_interface = ffi::qrvmc_host_interface {
    account_exists: Some(account::account_exists),
    get_storage: Some(storage::get_storage),
    set_storage: Some(storage::set_storage),
    get_balance: Some(account::get_balance),
    get_code_size: Some(code::get_code_size),
    get_code_hash: Some(code::get_code_hash),
    copy_code: Some(code::copy_code),
    selfdestruct: Some(control::selfdestruct),
    call: Some(contract::call),
    get_tx_context: Some(block::get_tx_context),
    get_block_hash: Some(block::get_block_hash),
    emit_log: Some(self::log::emit_log),
    access_account: Some(account::access_account),
    access_storage: Some(storage::access_storage),
};

/// Registry handle carried in the context pointer.
pub(crate) fn handle_of(context: *mut ffi::qrvmc_host_context) -> usize {
    context as usize
}

/// Context pointer handed to the VM for a registry handle.
pub(crate) fn context_of(handle: usize) -> *mut ffi::qrvmc_host_context {
    handle as *mut ffi::qrvmc_host_context
}

/// Run `body` against the host context registered under `context`.
///
/// Returns `fallback` when the handle is unknown, when `body` reports an
/// error, or when the host panics. A panic payload is parked in the registry
/// entry so the owning `execute` can resume it once native code has returned.
pub(crate) fn with_host<R>(
    context: *mut ffi::qrvmc_host_context,
    function: &'static str,
    fallback: R,
    body: impl FnOnce(&dyn HostContext) -> HostCallbackResult<R>,
) -> R {
    let handle = handle_of(context);
    ::log::trace!("{} (handle {})", function, handle);

    let registry = registry::global();
    let context_ref = match registry.resolve(handle) {
        Some(context_ref) => context_ref,
        None => {
            ::log::error!("{}", context_not_found_error(handle, function));
            return fallback;
        }
    };

    // SAFETY: the handle is registered, so the owning execute call is still
    // on the stack and keeps the context borrowed.
    let host = unsafe { context_ref.get() };

    match panic::catch_unwind(AssertUnwindSafe(|| body(host))) {
        Ok(Ok(value)) => value,
        Ok(Err(error)) => {
            ::log::error!("{}", error);
            fallback
        }
        Err(payload) => {
            ::log::error!("{}", host_panicked_error(payload.as_ref(), function));
            registry.record_panic(handle, payload);
            fallback
        }
    }
}
