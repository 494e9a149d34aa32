// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Native-ABI VM stubs written in Rust
//!
//! Counters and recordings are thread-local: every test drives its stubs from
//! its own thread.
//!
//! The executing stub interprets the first code byte:
//! - none or `e`: return the input
//! - `s`: store the input (padded to a word) under key `0x01..01`, read it back
//!   and return it
//! - `c`: forward the message as a nested call one level deeper and return the
//!   nested result
//! - `r`: revert with the input as output
//! - anything else: invalid instruction

use crate::qrvmc::ffi;
use crate::qrvmc::types::{Capability, SetOptionResult, StatusCode};
use libc::c_char;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::CStr;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ExecuteRecord {
    pub context: usize,
    pub revision: i32,
    pub kind: i32,
    pub flags: u32,
    pub depth: i32,
    pub input_null: bool,
    pub code_null: bool,
}

thread_local! {
    static CREATED: Cell<usize> = const { Cell::new(0) };
    static DESTROYED: Cell<usize> = const { Cell::new(0) };
    static RELEASED: Cell<usize> = const { Cell::new(0) };
    static EXECUTIONS: RefCell<Vec<ExecuteRecord>> = const { RefCell::new(Vec::new()) };
    static RECORDED_OPTIONS: RefCell<Vec<(String, String)>> = const { RefCell::new(Vec::new()) };
    static SUPPORTED_OPTIONS: RefCell<HashMap<String, Vec<String>>> = RefCell::new(HashMap::new());
}

pub const UNKNOWN_ERROR_OPTION: &str = "raise_unknown";

pub fn reset() {
    CREATED.with(|c| c.set(0));
    DESTROYED.with(|c| c.set(0));
    RELEASED.with(|c| c.set(0));
    EXECUTIONS.with(|e| e.borrow_mut().clear());
    RECORDED_OPTIONS.with(|o| o.borrow_mut().clear());
    SUPPORTED_OPTIONS.with(|o| o.borrow_mut().clear());
}

pub fn created() -> usize {
    CREATED.with(Cell::get)
}

pub fn destroyed() -> usize {
    DESTROYED.with(Cell::get)
}

pub fn released() -> usize {
    RELEASED.with(Cell::get)
}

pub fn executions() -> Vec<ExecuteRecord> {
    EXECUTIONS.with(|e| e.borrow().clone())
}

pub fn recorded_options() -> Vec<(String, String)> {
    RECORDED_OPTIONS.with(|o| o.borrow().clone())
}

pub fn clear_recorded_options() {
    RECORDED_OPTIONS.with(|o| o.borrow_mut().clear());
}

pub fn support_option(name: &str, values: &[&str]) {
    SUPPORTED_OPTIONS.with(|o| {
        o.borrow_mut().insert(
            name.to_string(),
            values.iter().map(|value| value.to_string()).collect(),
        )
    });
}

fn new_vm(
    abi_version: i32,
    name: &'static [u8],
    execute: ffi::qrvmc_execute_fn,
    get_capabilities: ffi::qrvmc_get_capabilities_fn,
    set_option: ffi::qrvmc_set_option_fn,
) -> *mut ffi::qrvmc_vm {
    CREATED.with(|c| c.set(c.get() + 1));
    Box::into_raw(Box::new(ffi::qrvmc_vm {
        abi_version,
        name: name.as_ptr() as *const c_char,
        version: b"1.2.3\0".as_ptr() as *const c_char,
        destroy: Some(destroy),
        execute,
        get_capabilities,
        set_option,
    }))
}

unsafe extern "C" fn destroy(vm: *mut ffi::qrvmc_vm) {
    DESTROYED.with(|c| c.set(c.get() + 1));
    drop(Box::from_raw(vm));
}

pub unsafe extern "C" fn create_barebone() -> *mut ffi::qrvmc_vm {
    new_vm(ffi::QRVMC_ABI_VERSION, b"vm_barebone\0", None, None, None)
}

pub unsafe extern "C" fn create_with_set_option() -> *mut ffi::qrvmc_vm {
    new_vm(
        ffi::QRVMC_ABI_VERSION,
        b"vm_with_set_option\0",
        None,
        None,
        Some(set_option),
    )
}

pub unsafe extern "C" fn create_wrong_abi() -> *mut ffi::qrvmc_vm {
    new_vm(1985, b"\0", None, None, None)
}

pub unsafe extern "C" fn create_failure() -> *mut ffi::qrvmc_vm {
    std::ptr::null_mut()
}

pub unsafe extern "C" fn create_executor() -> *mut ffi::qrvmc_vm {
    new_vm(
        ffi::QRVMC_ABI_VERSION,
        b"stub_vm\0",
        Some(execute),
        Some(get_capabilities),
        Some(set_option),
    )
}

unsafe extern "C" fn get_capabilities(_vm: *mut ffi::qrvmc_vm) -> ffi::qrvmc_capabilities_flagset {
    Capability::Qrvm1.flag() | Capability::Precompiles.flag()
}

unsafe extern "C" fn set_option(
    _vm: *mut ffi::qrvmc_vm,
    name: *const c_char,
    value: *const c_char,
) -> ffi::qrvmc_set_option_result {
    let name = CStr::from_ptr(name).to_string_lossy().into_owned();
    let value = CStr::from_ptr(value).to_string_lossy().into_owned();
    RECORDED_OPTIONS.with(|o| o.borrow_mut().push((name.clone(), value.clone())));

    if name == UNKNOWN_ERROR_OPTION {
        return 42;
    }
    SUPPORTED_OPTIONS.with(|o| match o.borrow().get(&name) {
        None => SetOptionResult::InvalidName.raw(),
        Some(values) if values.contains(&value) => SetOptionResult::Success.raw(),
        Some(_) => SetOptionResult::InvalidValue.raw(),
    })
}

unsafe extern "C" fn release(result: *const ffi::qrvmc_result) {
    RELEASED.with(|c| c.set(c.get() + 1));
    let result = &*result;
    let slice = std::ptr::slice_from_raw_parts_mut(result.output_data as *mut u8, result.output_size);
    drop(Box::from_raw(slice));
}

fn make_result(status: StatusCode, gas_left: i64, output: &[u8]) -> ffi::qrvmc_result {
    let (output_data, release_fn): (*const u8, ffi::qrvmc_release_result_fn) = if output.is_empty() {
        (std::ptr::null(), None)
    } else {
        let boxed: Box<[u8]> = output.into();
        (Box::into_raw(boxed) as *const u8, Some(release))
    };
    ffi::qrvmc_result {
        status_code: status.raw(),
        gas_left,
        gas_refund: 0,
        output_data,
        output_size: output.len(),
        release: release_fn,
        create_address: ffi::qrvmc_address::default(),
        padding: [0u8; 4],
    }
}

unsafe fn slice<'a>(data: *const u8, size: usize) -> &'a [u8] {
    if data.is_null() {
        &[]
    } else {
        std::slice::from_raw_parts(data, size)
    }
}

unsafe extern "C" fn execute(
    _vm: *mut ffi::qrvmc_vm,
    host: *const ffi::qrvmc_host_interface,
    context: *mut ffi::qrvmc_host_context,
    rev: ffi::qrvmc_revision,
    msg: *const ffi::qrvmc_message,
    code: *const u8,
    code_size: usize,
) -> ffi::qrvmc_result {
    let host = &*host;
    let msg = &*msg;
    let input = slice(msg.input_data, msg.input_size);
    let code_null = code.is_null();
    let code = slice(code, code_size);

    EXECUTIONS.with(|e| {
        e.borrow_mut().push(ExecuteRecord {
            context: context as usize,
            revision: rev,
            kind: msg.kind,
            flags: msg.flags,
            depth: msg.depth,
            input_null: msg.input_data.is_null(),
            code_null,
        })
    });

    match code.first() {
        None | Some(b'e') => make_result(StatusCode::Success, msg.gas, input),
        Some(b'r') => make_result(StatusCode::Revert, msg.gas / 2, input),
        Some(b's') => {
            let key = ffi::qrvmc_bytes32 { bytes: [1u8; 32] };
            let mut value = ffi::qrvmc_bytes32::default();
            let n = input.len().min(32);
            value.bytes[32 - n..].copy_from_slice(&input[..n]);

            let set_storage = host.set_storage.expect("set_storage");
            let get_storage = host.get_storage.expect("get_storage");
            set_storage(context, &msg.recipient, &key, &value);
            let loaded = get_storage(context, &msg.recipient, &key);
            make_result(StatusCode::Success, msg.gas, &loaded.bytes)
        }
        Some(b'c') => {
            let mut nested = *msg;
            nested.depth += 1;
            let call = host.call.expect("call");
            let nested_result = call(context, &nested);
            let output = slice(nested_result.output_data, nested_result.output_size).to_vec();
            if let Some(release_nested) = nested_result.release {
                release_nested(&nested_result);
            }
            make_result(
                StatusCode::from_raw(nested_result.status_code),
                nested_result.gas_left,
                &output,
            )
        }
        Some(_) => make_result(StatusCode::InvalidInstruction, 0, &[]),
    }
}
