// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Test the public module
//! Contains all the functions and tools shared by all tests.

#![allow(unused_imports)]
#![allow(dead_code)]

pub use example_vm::assembler::Assembler;
pub use example_vm::mock_context::{keccak256, Account, CallRecord, MockContext};
pub use qrvmc_rust::{
    Address, CallKind, ExecutionResult, Hash, Message, Revision, StatusCode, ThreadSafeVm, Vm,
};

use std::sync::Arc;

/// Gas handed to top-level messages
pub const TEST_GAS: i64 = 100_000;

/// Route `log` output through the test harness
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Helper function to create a test address
pub fn random_test_address(byte: u8) -> Address {
    let mut addr = [0u8; 20];
    addr[19] = byte; // Set the last byte to distinguish addresses
    addr
}

/// A storage key or value with `value` in its last eight bytes
pub fn word(value: u64) -> Hash {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

pub fn shared_vm() -> Arc<ThreadSafeVm> {
    example_vm::create_shared().expect("example VM is created")
}

/// A call message to `address` executing the code stored there
pub fn call_message(address: Address, input: &[u8]) -> Message<'_> {
    Message {
        kind: CallKind::Call,
        gas: TEST_GAS,
        recipient: address,
        sender: random_test_address(0xca),
        code_address: address,
        input,
        ..Default::default()
    }
}

/// How the example VM reports a nested status in its output
pub fn status_byte(status: StatusCode) -> u8 {
    status.raw() as u8
}
