// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Example QRVMC VM
//!
//! A small VM implemented against the raw native ABI and exported as
//! `qrvmc_create_example_vm`. Built as a `cdylib` it can be loaded with
//! [`qrvmc_rust::load`]; as an `rlib` its create function can be handed to
//! [`qrvmc_rust::Vm::from_create_fn`] directly.
//!
//! The VM supports one option, `verbose`, taking a level from `0` to `9`.
//! Level 1 logs each execution and level 2 also traces every command.

pub mod assembler;
pub mod interpreter;
pub mod mock_context;

use interpreter::{Interpreter, Outcome};
use qrvmc_rust::qrvmc::ffi;
use qrvmc_rust::{Capability, LoaderError, Revision, SetOptionResult, StatusCode, ThreadSafeVm, Vm};
use std::cell::Cell;
use std::ffi::{c_char, CStr};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const NAME: &[u8] = b"example_vm\0";
const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

thread_local! {
    static RELEASED: Cell<usize> = const { Cell::new(0) };
}

/// Number of results released on the current thread
pub fn release_count() -> usize {
    RELEASED.with(Cell::get)
}

/// The native instance. `instance` must stay the first field: the host only
/// ever sees a pointer to it.
#[repr(C)]
struct ExampleVm {
    instance: ffi::qrvmc_vm,
    verbosity: AtomicU8,
}

/// Create an instance of the example VM.
#[no_mangle]
pub extern "C" fn qrvmc_create_example_vm() -> *mut ffi::qrvmc_vm {
    let vm = Box::new(ExampleVm {
        instance: ffi::qrvmc_vm {
            abi_version: ffi::QRVMC_ABI_VERSION,
            name: NAME.as_ptr() as *const c_char,
            version: VERSION.as_ptr() as *const c_char,
            destroy: Some(destroy),
            execute: Some(execute),
            get_capabilities: Some(get_capabilities),
            set_option: Some(set_option),
        },
        verbosity: AtomicU8::new(0),
    });
    Box::into_raw(vm) as *mut ffi::qrvmc_vm
}

/// Instantiate the example VM behind a [`Vm`] handle.
pub fn create() -> Result<Vm, LoaderError> {
    unsafe { Vm::from_create_fn(qrvmc_create_example_vm) }
}

/// Instantiate the example VM for use from several threads at once.
pub fn create_shared() -> Result<Arc<ThreadSafeVm>, LoaderError> {
    let vm = create()?;
    // Executions share nothing but the atomic verbosity level
    Ok(Arc::new(unsafe { ThreadSafeVm::new(vm) }))
}

unsafe extern "C" fn destroy(vm: *mut ffi::qrvmc_vm) {
    if !vm.is_null() {
        drop(Box::from_raw(vm as *mut ExampleVm));
    }
}

unsafe extern "C" fn get_capabilities(_vm: *mut ffi::qrvmc_vm) -> ffi::qrvmc_capabilities_flagset {
    Capability::Qrvm1.flag()
}

unsafe extern "C" fn set_option(
    vm: *mut ffi::qrvmc_vm,
    name: *const c_char,
    value: *const c_char,
) -> ffi::qrvmc_set_option_result {
    if vm.is_null() || name.is_null() {
        return SetOptionResult::InvalidName.raw();
    }
    if CStr::from_ptr(name).to_bytes() != b"verbose" {
        return SetOptionResult::InvalidName.raw();
    }
    if value.is_null() {
        return SetOptionResult::InvalidValue.raw();
    }
    match CStr::from_ptr(value).to_bytes() {
        [digit @ b'0'..=b'9'] => {
            let vm = &*(vm as *const ExampleVm);
            vm.verbosity.store(digit - b'0', Ordering::Relaxed);
            SetOptionResult::Success.raw()
        }
        _ => SetOptionResult::InvalidValue.raw(),
    }
}

unsafe extern "C" fn release(result: *const ffi::qrvmc_result) {
    RELEASED.with(|count| count.set(count.get() + 1));
    let result = &*result;
    if !result.output_data.is_null() {
        let output =
            std::ptr::slice_from_raw_parts_mut(result.output_data as *mut u8, result.output_size);
        drop(Box::from_raw(output));
    }
}

fn into_result(outcome: Outcome) -> ffi::qrvmc_result {
    let output_size = outcome.output.len();
    let output_data = if outcome.output.is_empty() {
        std::ptr::null()
    } else {
        Box::into_raw(outcome.output.into_boxed_slice()) as *const u8
    };
    ffi::qrvmc_result {
        status_code: outcome.status.raw(),
        gas_left: outcome.gas_left,
        gas_refund: 0,
        output_data,
        output_size,
        release: Some(release),
        create_address: ffi::qrvmc_address::default(),
        padding: [0u8; 4],
    }
}

unsafe extern "C" fn execute(
    vm: *mut ffi::qrvmc_vm,
    host: *const ffi::qrvmc_host_interface,
    context: *mut ffi::qrvmc_host_context,
    rev: ffi::qrvmc_revision,
    msg: *const ffi::qrvmc_message,
    code: *const u8,
    code_size: usize,
) -> ffi::qrvmc_result {
    if vm.is_null() || host.is_null() || msg.is_null() {
        return into_result(Outcome::error(StatusCode::InternalError));
    }
    if !(0..=Revision::MAX.raw()).contains(&rev) {
        return into_result(Outcome::error(StatusCode::Rejected));
    }

    let vm = &*(vm as *const ExampleVm);
    let msg = &*msg;
    let code: &[u8] = if code.is_null() || code_size == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(code, code_size)
    };
    let verbosity = vm.verbosity.load(Ordering::Relaxed);
    if verbosity > 0 {
        log::debug!(
            "executing {} bytes of code at depth {} with {} gas",
            code.len(),
            msg.depth,
            msg.gas
        );
    }

    let outcome = Interpreter::new(&*host, context, msg, code, verbosity).run();
    if verbosity > 0 {
        log::debug!(
            "execution finished with {} ({} gas left, {} bytes of output)",
            outcome.status,
            outcome.gas_left,
            outcome.output.len()
        );
    }
    into_result(outcome)
}
