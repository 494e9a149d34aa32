// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Managed QRVMC Types and the Value Codec
//!
//! This module defines the Rust-side view of every value that crosses the
//! connector boundary, together with the conversions to and from the raw
//! `#[repr(C)]` structs in [`crate::qrvmc::ffi`].
//!
//! Addresses and words are plain byte arrays on both sides, so the codec is a
//! byte-for-byte copy with no byte-order transformation. Enumerations arrive
//! from native code as raw integers and are converted with checked
//! conversions.

use crate::qrvmc::ffi;
use num_bigint::BigUint;
use std::fmt;

/// 160-bit account address.
pub type Address = [u8; 20];

/// 32 bytes of data: a hash, or a big-endian 256-bit unsigned integer.
pub type Hash = [u8; 32];

impl From<Address> for ffi::qrvmc_address {
    fn from(bytes: Address) -> Self {
        Self { bytes }
    }
}

impl From<ffi::qrvmc_address> for Address {
    fn from(address: ffi::qrvmc_address) -> Self {
        address.bytes
    }
}

impl From<Hash> for ffi::qrvmc_bytes32 {
    fn from(bytes: Hash) -> Self {
        Self { bytes }
    }
}

impl From<ffi::qrvmc_bytes32> for Hash {
    fn from(word: ffi::qrvmc_bytes32) -> Self {
        word.bytes
    }
}

/// Convert a BigUint to a 32-byte big-endian word.
/// Values wider than 256 bits keep their least significant 32 bytes.
pub fn hash_from_biguint(value: &BigUint) -> Hash {
    let mut result = [0u8; 32];
    let bytes = value.to_bytes_be();

    if bytes.len() > 32 {
        result.copy_from_slice(&bytes[bytes.len() - 32..]);
    } else {
        let start_pos = 32 - bytes.len();
        result[start_pos..].copy_from_slice(&bytes);
    }

    result
}

/// Interpret a 32-byte word as a big-endian unsigned integer.
pub fn hash_to_biguint(word: &Hash) -> BigUint {
    BigUint::from_bytes_be(word)
}

/// The kind of call-like instruction that produced a message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CallKind {
    #[default]
    Call,
    DelegateCall,
    CallCode,
    Create,
    Create2,
}

impl CallKind {
    pub fn raw(self) -> ffi::qrvmc_call_kind {
        match self {
            CallKind::Call => 0,
            CallKind::DelegateCall => 1,
            CallKind::CallCode => 2,
            CallKind::Create => 3,
            CallKind::Create2 => 4,
        }
    }

    pub fn is_create(self) -> bool {
        matches!(self, CallKind::Create | CallKind::Create2)
    }
}

impl TryFrom<ffi::qrvmc_call_kind> for CallKind {
    type Error = ffi::qrvmc_call_kind;

    fn try_from(raw: ffi::qrvmc_call_kind) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(CallKind::Call),
            1 => Ok(CallKind::DelegateCall),
            2 => Ok(CallKind::CallCode),
            3 => Ok(CallKind::Create),
            4 => Ok(CallKind::Create2),
            other => Err(other),
        }
    }
}

/// Execution semantics ruleset the VM must honor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Revision {
    #[default]
    Shanghai,
}

impl Revision {
    pub const MAX: Revision = Revision::Shanghai;
    pub const LATEST_STABLE: Revision = Revision::Shanghai;

    pub fn raw(self) -> ffi::qrvmc_revision {
        match self {
            Revision::Shanghai => 0,
        }
    }
}

/// Outcome of an execution.
///
/// Non-negative codes describe what happened to the contract; negative codes
/// are internal errors of the host, the binding or the VM itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Success,
    Failure,
    Revert,
    OutOfGas,
    InvalidInstruction,
    UndefinedInstruction,
    StackOverflow,
    StackUnderflow,
    BadJumpDestination,
    InvalidMemoryAccess,
    CallDepthExceeded,
    StaticModeViolation,
    PrecompileFailure,
    ContractValidationFailure,
    ArgumentOutOfRange,
    WasmUnreachableInstruction,
    WasmTrap,
    InsufficientBalance,
    InternalError,
    Rejected,
    OutOfMemory,
    /// A code this binding does not know, kept verbatim.
    Unknown(ffi::qrvmc_status_code),
}

impl StatusCode {
    pub fn from_raw(raw: ffi::qrvmc_status_code) -> Self {
        match raw {
            0 => StatusCode::Success,
            1 => StatusCode::Failure,
            2 => StatusCode::Revert,
            3 => StatusCode::OutOfGas,
            4 => StatusCode::InvalidInstruction,
            5 => StatusCode::UndefinedInstruction,
            6 => StatusCode::StackOverflow,
            7 => StatusCode::StackUnderflow,
            8 => StatusCode::BadJumpDestination,
            9 => StatusCode::InvalidMemoryAccess,
            10 => StatusCode::CallDepthExceeded,
            11 => StatusCode::StaticModeViolation,
            12 => StatusCode::PrecompileFailure,
            13 => StatusCode::ContractValidationFailure,
            14 => StatusCode::ArgumentOutOfRange,
            15 => StatusCode::WasmUnreachableInstruction,
            16 => StatusCode::WasmTrap,
            17 => StatusCode::InsufficientBalance,
            -1 => StatusCode::InternalError,
            -2 => StatusCode::Rejected,
            -3 => StatusCode::OutOfMemory,
            other => StatusCode::Unknown(other),
        }
    }

    pub fn raw(self) -> ffi::qrvmc_status_code {
        match self {
            StatusCode::Success => 0,
            StatusCode::Failure => 1,
            StatusCode::Revert => 2,
            StatusCode::OutOfGas => 3,
            StatusCode::InvalidInstruction => 4,
            StatusCode::UndefinedInstruction => 5,
            StatusCode::StackOverflow => 6,
            StatusCode::StackUnderflow => 7,
            StatusCode::BadJumpDestination => 8,
            StatusCode::InvalidMemoryAccess => 9,
            StatusCode::CallDepthExceeded => 10,
            StatusCode::StaticModeViolation => 11,
            StatusCode::PrecompileFailure => 12,
            StatusCode::ContractValidationFailure => 13,
            StatusCode::ArgumentOutOfRange => 14,
            StatusCode::WasmUnreachableInstruction => 15,
            StatusCode::WasmTrap => 16,
            StatusCode::InsufficientBalance => 17,
            StatusCode::InternalError => -1,
            StatusCode::Rejected => -2,
            StatusCode::OutOfMemory => -3,
            StatusCode::Unknown(raw) => raw,
        }
    }

    pub fn is_success(self) -> bool {
        self == StatusCode::Success
    }

    /// Negative codes: the problem is in the host, the binding or the VM,
    /// not in the executed contract.
    pub fn is_internal_error(self) -> bool {
        self.raw() < 0
    }

    /// Same strings as `qrvmc_status_code_to_string()`.
    pub fn as_str(self) -> &'static str {
        match self {
            StatusCode::Success => "success",
            StatusCode::Failure => "failure",
            StatusCode::Revert => "revert",
            StatusCode::OutOfGas => "out of gas",
            StatusCode::InvalidInstruction => "invalid instruction",
            StatusCode::UndefinedInstruction => "undefined instruction",
            StatusCode::StackOverflow => "stack overflow",
            StatusCode::StackUnderflow => "stack underflow",
            StatusCode::BadJumpDestination => "bad jump destination",
            StatusCode::InvalidMemoryAccess => "invalid memory access",
            StatusCode::CallDepthExceeded => "call depth exceeded",
            StatusCode::StaticModeViolation => "static mode violation",
            StatusCode::PrecompileFailure => "precompile failure",
            StatusCode::ContractValidationFailure => "contract validation failure",
            StatusCode::ArgumentOutOfRange => "argument out of range",
            StatusCode::WasmUnreachableInstruction => "wasm unreachable instruction",
            StatusCode::WasmTrap => "wasm trap",
            StatusCode::InsufficientBalance => "insufficient balance",
            StatusCode::InternalError => "internal error",
            StatusCode::Rejected => "rejected",
            StatusCode::OutOfMemory => "out of memory",
            StatusCode::Unknown(_) => "<unknown>",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for StatusCode {}

/// Optional VM features.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Executes QRVM1 bytecode.
    Qrvm1,
    /// Executes ZWASM bytecode.
    Zwasm,
    /// Provides precompiled contracts.
    Precompiles,
}

impl Capability {
    pub fn flag(self) -> ffi::qrvmc_capabilities_flagset {
        match self {
            Capability::Qrvm1 => 1 << 0,
            Capability::Zwasm => 1 << 1,
            Capability::Precompiles => 1 << 2,
        }
    }
}

/// Effect of a storage write, as reported by the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StorageStatus {
    #[default]
    Assigned,
    Added,
    Deleted,
    Modified,
    DeletedAdded,
    ModifiedDeleted,
    DeletedRestored,
    AddedDeleted,
    ModifiedRestored,
}

impl StorageStatus {
    pub fn raw(self) -> ffi::qrvmc_storage_status {
        match self {
            StorageStatus::Assigned => 0,
            StorageStatus::Added => 1,
            StorageStatus::Deleted => 2,
            StorageStatus::Modified => 3,
            StorageStatus::DeletedAdded => 4,
            StorageStatus::ModifiedDeleted => 5,
            StorageStatus::DeletedRestored => 6,
            StorageStatus::AddedDeleted => 7,
            StorageStatus::ModifiedRestored => 8,
        }
    }
}

impl TryFrom<ffi::qrvmc_storage_status> for StorageStatus {
    type Error = ffi::qrvmc_storage_status;

    fn try_from(raw: ffi::qrvmc_storage_status) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(StorageStatus::Assigned),
            1 => Ok(StorageStatus::Added),
            2 => Ok(StorageStatus::Deleted),
            3 => Ok(StorageStatus::Modified),
            4 => Ok(StorageStatus::DeletedAdded),
            5 => Ok(StorageStatus::ModifiedDeleted),
            6 => Ok(StorageStatus::DeletedRestored),
            7 => Ok(StorageStatus::AddedDeleted),
            8 => Ok(StorageStatus::ModifiedRestored),
            other => Err(other),
        }
    }
}

/// Warm/cold access status of an account or storage slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AccessStatus {
    #[default]
    Cold,
    Warm,
}

impl AccessStatus {
    pub fn raw(self) -> ffi::qrvmc_access_status {
        match self {
            AccessStatus::Cold => 0,
            AccessStatus::Warm => 1,
        }
    }
}

impl TryFrom<ffi::qrvmc_access_status> for AccessStatus {
    type Error = ffi::qrvmc_access_status;

    fn try_from(raw: ffi::qrvmc_access_status) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(AccessStatus::Cold),
            1 => Ok(AccessStatus::Warm),
            other => Err(other),
        }
    }
}

/// Three-way answer of `set_option`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SetOptionResult {
    Success,
    InvalidName,
    InvalidValue,
}

impl SetOptionResult {
    pub fn raw(self) -> ffi::qrvmc_set_option_result {
        match self {
            SetOptionResult::Success => 0,
            SetOptionResult::InvalidName => 1,
            SetOptionResult::InvalidValue => 2,
        }
    }
}

impl TryFrom<ffi::qrvmc_set_option_result> for SetOptionResult {
    type Error = ffi::qrvmc_set_option_result;

    fn try_from(raw: ffi::qrvmc_set_option_result) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(SetOptionResult::Success),
            1 => Ok(SetOptionResult::InvalidName),
            2 => Ok(SetOptionResult::InvalidValue),
            other => Err(other),
        }
    }
}

/// Transaction and block metadata supplied by the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TxContext {
    pub tx_gas_price: Hash,
    pub tx_origin: Address,
    pub block_coinbase: Address,
    pub block_number: i64,
    pub block_timestamp: i64,
    pub block_gas_limit: i64,
    pub block_prev_randao: Hash,
    pub chain_id: Hash,
    pub block_base_fee: Hash,
}

impl From<TxContext> for ffi::qrvmc_tx_context {
    fn from(ctx: TxContext) -> Self {
        Self {
            tx_gas_price: ctx.tx_gas_price.into(),
            tx_origin: ctx.tx_origin.into(),
            block_coinbase: ctx.block_coinbase.into(),
            block_number: ctx.block_number,
            block_timestamp: ctx.block_timestamp,
            block_gas_limit: ctx.block_gas_limit,
            block_prev_randao: ctx.block_prev_randao.into(),
            chain_id: ctx.chain_id.into(),
            block_base_fee: ctx.block_base_fee.into(),
        }
    }
}

impl From<ffi::qrvmc_tx_context> for TxContext {
    fn from(ctx: ffi::qrvmc_tx_context) -> Self {
        Self {
            tx_gas_price: ctx.tx_gas_price.into(),
            tx_origin: ctx.tx_origin.into(),
            block_coinbase: ctx.block_coinbase.into(),
            block_number: ctx.block_number,
            block_timestamp: ctx.block_timestamp,
            block_gas_limit: ctx.block_gas_limit,
            block_prev_randao: ctx.block_prev_randao.into(),
            chain_id: ctx.chain_id.into(),
            block_base_fee: ctx.block_base_fee.into(),
        }
    }
}

/// One execution request.
///
/// The input is borrowed: a message is built per call and never retained.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Message<'a> {
    pub kind: CallKind,
    pub is_static: bool,
    pub depth: i32,
    pub gas: i64,
    pub recipient: Address,
    pub sender: Address,
    pub input: &'a [u8],
    pub value: Hash,
    pub create2_salt: Hash,
    pub code_address: Address,
}

impl<'a> Message<'a> {
    /// The native view of this message. The returned struct points into
    /// `self.input` and must not outlive the borrow.
    pub(crate) fn to_ffi(&self) -> ffi::qrvmc_message {
        let flags = if self.is_static { ffi::QRVMC_STATIC } else { 0 };
        ffi::qrvmc_message {
            kind: self.kind.raw(),
            flags,
            depth: self.depth,
            gas: self.gas,
            recipient: self.recipient.into(),
            sender: self.sender.into(),
            input_data: if self.input.is_empty() {
                std::ptr::null()
            } else {
                self.input.as_ptr()
            },
            input_size: self.input.len(),
            value: self.value.into(),
            create2_salt: self.create2_salt.into(),
            code_address: self.code_address.into(),
        }
    }

    /// Build a managed message from its native form.
    ///
    /// # Safety
    /// `msg.input_data` must point to `msg.input_size` readable bytes (or be
    /// null with a zero size) for the whole lifetime `'a`.
    pub(crate) unsafe fn from_ffi(msg: &ffi::qrvmc_message) -> Result<Self, ffi::qrvmc_call_kind> {
        let kind = CallKind::try_from(msg.kind)?;
        let input: &'a [u8] = if msg.input_data.is_null() || msg.input_size == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(msg.input_data, msg.input_size)
        };
        Ok(Self {
            kind,
            is_static: msg.flags & ffi::QRVMC_STATIC != 0,
            depth: msg.depth,
            gas: msg.gas,
            recipient: msg.recipient.into(),
            sender: msg.sender.into(),
            input,
            value: msg.value.into(),
            create2_salt: msg.create2_salt.into(),
            code_address: msg.code_address.into(),
        })
    }
}

/// Managed outcome of an execution. The output is always owned by Rust.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionResult {
    pub status_code: StatusCode,
    pub gas_left: i64,
    pub gas_refund: i64,
    pub output: Vec<u8>,
    pub create_address: Option<Address>,
}

impl ExecutionResult {
    pub fn new(status_code: StatusCode, gas_left: i64, output: Vec<u8>) -> Self {
        Self {
            status_code,
            gas_left,
            gas_refund: 0,
            output,
            create_address: None,
        }
    }

    pub fn success(gas_left: i64, output: Vec<u8>) -> Self {
        Self::new(StatusCode::Success, gas_left, output)
    }

    pub fn revert(gas_left: i64, output: Vec<u8>) -> Self {
        Self::new(StatusCode::Revert, gas_left, output)
    }

    pub fn failure() -> Self {
        Self::new(StatusCode::Failure, 0, Vec::new())
    }

    pub fn internal_error() -> Self {
        Self::new(StatusCode::InternalError, 0, Vec::new())
    }

    pub fn with_create_address(mut self, address: Address) -> Self {
        self.create_address = Some(address);
        self
    }

    pub fn with_gas_refund(mut self, gas_refund: i64) -> Self {
        self.gas_refund = gas_refund;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status_code.is_success()
    }

    /// The status code as an error, or `None` on success.
    pub fn error(&self) -> Option<StatusCode> {
        if self.is_success() {
            None
        } else {
            Some(self.status_code)
        }
    }

    /// Hand this result to native code. A non-empty output is moved into a
    /// heap buffer that the result's `release` function frees.
    pub(crate) fn into_ffi(self) -> ffi::qrvmc_result {
        let (output_data, output_size, release): (*const u8, usize, ffi::qrvmc_release_result_fn) =
            if self.output.is_empty() {
                (std::ptr::null(), 0, None)
            } else {
                let boxed = self.output.into_boxed_slice();
                let size = boxed.len();
                let data = Box::into_raw(boxed) as *const u8;
                (data, size, Some(release_owned_output))
            };

        ffi::qrvmc_result {
            status_code: self.status_code.raw(),
            gas_left: self.gas_left,
            gas_refund: self.gas_refund,
            output_data,
            output_size,
            release,
            create_address: self.create_address.unwrap_or_default().into(),
            padding: [0u8; 4],
        }
    }
}

/// Release function attached to results produced by [`ExecutionResult::into_ffi`].
unsafe extern "C" fn release_owned_output(result: *const ffi::qrvmc_result) {
    if result.is_null() {
        return;
    }
    let result = &*result;
    if !result.output_data.is_null() {
        let slice = std::ptr::slice_from_raw_parts_mut(result.output_data as *mut u8, result.output_size);
        drop(Box::from_raw(slice));
    }
}
