// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Contract Interaction Host Functions
//!
//! A single callback serves every call-like instruction (CALL, CALLCODE,
//! DELEGATECALL, CREATE, CREATE2); the kind travels in the message. The host
//! context typically answers it by running another execution, which may
//! re-enter this binding through the same callback table.
//!
//! The result handed back owns its output buffer: it was allocated by the
//! binding and is freed by the result's `release` function, which the VM
//! calls once it is done with the output.

use super::with_host;
use crate::qrvmc::error::{invalid_parameter_error, null_pointer_error};
use crate::qrvmc::ffi;
use crate::qrvmc::types::{ExecutionResult, Message};

pub(crate) unsafe extern "C" fn call(
    context: *mut ffi::qrvmc_host_context,
    msg: *const ffi::qrvmc_message,
) -> ffi::qrvmc_result {
    let fallback = ExecutionResult::internal_error().into_ffi();
    with_host(context, "call", fallback, |host| {
        let msg = msg.as_ref().ok_or_else(|| null_pointer_error("msg", "call"))?;
        let message = Message::from_ffi(msg)
            .map_err(|kind| invalid_parameter_error("kind", &kind.to_string(), "call"))?;

        ::log::debug!(
            "nested call: kind={:?} depth={} gas={}",
            message.kind,
            message.depth,
            message.gas
        );
        let result = host.call(&message);
        Ok(result.into_ffi())
    })
}
