// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Raw QRVMC ABI Definitions
//!
//! `#[repr(C)]` mirrors of the structs, constants and function pointer types
//! declared by `qrvmc.h` (ABI version 10). Names follow the C header so the
//! layout can be checked against it line by line.
//!
//! ABI enums are kept as plain integers here. Values coming from native code
//! are converted into the managed enums in [`crate::qrvmc::types`] with
//! checked conversions.

#![allow(non_camel_case_types)]

use libc::c_char;
use std::mem::size_of;

/// The ABI version implemented by this binding.
pub const QRVMC_ABI_VERSION: i32 = 10;

/// Static call mode flag (`qrvmc_flags::QRVMC_STATIC`).
pub const QRVMC_STATIC: u32 = 1;

/// 32 bytes of arbitrary data, also a big-endian 256-bit integer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct qrvmc_bytes32 {
    pub bytes: [u8; 32],
}

/// Big-endian 256-bit integer.
pub type qrvmc_uint256be = qrvmc_bytes32;

/// 160-bit account address.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct qrvmc_address {
    pub bytes: [u8; 20],
}

// Both sides of the value codec are plain byte arrays of the same length.
// Anything else is an incompatible ABI and must not build.
const _: () = assert!(size_of::<qrvmc_address>() == 20);
const _: () = assert!(size_of::<qrvmc_bytes32>() == 32);

pub type qrvmc_call_kind = i32;
pub type qrvmc_status_code = i32;
pub type qrvmc_revision = i32;
pub type qrvmc_storage_status = i32;
pub type qrvmc_access_status = i32;
pub type qrvmc_set_option_result = i32;
pub type qrvmc_capabilities_flagset = u32;

/// Opaque host context. The binding passes a registry handle in its place.
#[repr(C)]
pub struct qrvmc_host_context {
    _private: [u8; 0],
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct qrvmc_message {
    pub kind: qrvmc_call_kind,
    pub flags: u32,
    pub depth: i32,
    pub gas: i64,
    pub recipient: qrvmc_address,
    pub sender: qrvmc_address,
    pub input_data: *const u8,
    pub input_size: usize,
    pub value: qrvmc_uint256be,
    pub create2_salt: qrvmc_bytes32,
    pub code_address: qrvmc_address,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct qrvmc_tx_context {
    pub tx_gas_price: qrvmc_uint256be,
    pub tx_origin: qrvmc_address,
    pub block_coinbase: qrvmc_address,
    pub block_number: i64,
    pub block_timestamp: i64,
    pub block_gas_limit: i64,
    pub block_prev_randao: qrvmc_uint256be,
    pub chain_id: qrvmc_uint256be,
    pub block_base_fee: qrvmc_uint256be,
}

pub type qrvmc_release_result_fn = Option<unsafe extern "C" fn(result: *const qrvmc_result)>;

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct qrvmc_result {
    pub status_code: qrvmc_status_code,
    pub gas_left: i64,
    pub gas_refund: i64,
    pub output_data: *const u8,
    pub output_size: usize,
    pub release: qrvmc_release_result_fn,
    pub create_address: qrvmc_address,
    pub padding: [u8; 4],
}

pub type qrvmc_account_exists_fn = Option<
    unsafe extern "C" fn(context: *mut qrvmc_host_context, address: *const qrvmc_address) -> bool,
>;

pub type qrvmc_get_storage_fn = Option<
    unsafe extern "C" fn(
        context: *mut qrvmc_host_context,
        address: *const qrvmc_address,
        key: *const qrvmc_bytes32,
    ) -> qrvmc_bytes32,
>;

pub type qrvmc_set_storage_fn = Option<
    unsafe extern "C" fn(
        context: *mut qrvmc_host_context,
        address: *const qrvmc_address,
        key: *const qrvmc_bytes32,
        value: *const qrvmc_bytes32,
    ) -> qrvmc_storage_status,
>;

pub type qrvmc_get_balance_fn = Option<
    unsafe extern "C" fn(
        context: *mut qrvmc_host_context,
        address: *const qrvmc_address,
    ) -> qrvmc_uint256be,
>;

pub type qrvmc_get_code_size_fn = Option<
    unsafe extern "C" fn(context: *mut qrvmc_host_context, address: *const qrvmc_address) -> usize,
>;

pub type qrvmc_get_code_hash_fn = Option<
    unsafe extern "C" fn(
        context: *mut qrvmc_host_context,
        address: *const qrvmc_address,
    ) -> qrvmc_bytes32,
>;

pub type qrvmc_copy_code_fn = Option<
    unsafe extern "C" fn(
        context: *mut qrvmc_host_context,
        address: *const qrvmc_address,
        code_offset: usize,
        buffer_data: *mut u8,
        buffer_size: usize,
    ) -> usize,
>;

pub type qrvmc_selfdestruct_fn = Option<
    unsafe extern "C" fn(
        context: *mut qrvmc_host_context,
        address: *const qrvmc_address,
        beneficiary: *const qrvmc_address,
    ) -> bool,
>;

pub type qrvmc_call_fn = Option<
    unsafe extern "C" fn(context: *mut qrvmc_host_context, msg: *const qrvmc_message) -> qrvmc_result,
>;

pub type qrvmc_get_tx_context_fn =
    Option<unsafe extern "C" fn(context: *mut qrvmc_host_context) -> qrvmc_tx_context>;

pub type qrvmc_get_block_hash_fn =
    Option<unsafe extern "C" fn(context: *mut qrvmc_host_context, number: i64) -> qrvmc_bytes32>;

pub type qrvmc_emit_log_fn = Option<
    unsafe extern "C" fn(
        context: *mut qrvmc_host_context,
        address: *const qrvmc_address,
        data: *const u8,
        data_size: usize,
        topics: *const qrvmc_bytes32,
        topics_count: usize,
    ),
>;

pub type qrvmc_access_account_fn = Option<
    unsafe extern "C" fn(
        context: *mut qrvmc_host_context,
        address: *const qrvmc_address,
    ) -> qrvmc_access_status,
>;

pub type qrvmc_access_storage_fn = Option<
    unsafe extern "C" fn(
        context: *mut qrvmc_host_context,
        address: *const qrvmc_address,
        key: *const qrvmc_bytes32,
    ) -> qrvmc_access_status,
>;

/// The callback table handed to the VM on every execution.
///
/// Fourteen slots with `selfdestruct` between `copy_code` and `call`. Headers
/// that omit `selfdestruct` describe a different, 13-slot layout.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct qrvmc_host_interface {
    pub account_exists: qrvmc_account_exists_fn,
    pub get_storage: qrvmc_get_storage_fn,
    pub set_storage: qrvmc_set_storage_fn,
    pub get_balance: qrvmc_get_balance_fn,
    pub get_code_size: qrvmc_get_code_size_fn,
    pub get_code_hash: qrvmc_get_code_hash_fn,
    pub copy_code: qrvmc_copy_code_fn,
    pub selfdestruct: qrvmc_selfdestruct_fn,
    pub call: qrvmc_call_fn,
    pub get_tx_context: qrvmc_get_tx_context_fn,
    pub get_block_hash: qrvmc_get_block_hash_fn,
    pub emit_log: qrvmc_emit_log_fn,
    pub access_account: qrvmc_access_account_fn,
    pub access_storage: qrvmc_access_storage_fn,
}

pub type qrvmc_destroy_fn = Option<unsafe extern "C" fn(vm: *mut qrvmc_vm)>;

pub type qrvmc_set_option_fn = Option<
    unsafe extern "C" fn(
        vm: *mut qrvmc_vm,
        name: *const c_char,
        value: *const c_char,
    ) -> qrvmc_set_option_result,
>;

pub type qrvmc_execute_fn = Option<
    unsafe extern "C" fn(
        vm: *mut qrvmc_vm,
        host: *const qrvmc_host_interface,
        context: *mut qrvmc_host_context,
        rev: qrvmc_revision,
        msg: *const qrvmc_message,
        code: *const u8,
        code_size: usize,
    ) -> qrvmc_result,
>;

pub type qrvmc_get_capabilities_fn =
    Option<unsafe extern "C" fn(vm: *mut qrvmc_vm) -> qrvmc_capabilities_flagset>;

/// A VM instance as created by a `qrvmc_create_*` function.
#[repr(C)]
#[derive(Debug)]
pub struct qrvmc_vm {
    pub abi_version: i32,
    pub name: *const c_char,
    pub version: *const c_char,
    pub destroy: qrvmc_destroy_fn,
    pub execute: qrvmc_execute_fn,
    pub get_capabilities: qrvmc_get_capabilities_fn,
    pub set_option: qrvmc_set_option_fn,
}

/// Signature of the VM factory exported by a VM library.
pub type qrvmc_create_fn = unsafe extern "C" fn() -> *mut qrvmc_vm;
