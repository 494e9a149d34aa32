// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Nested Call Integration Test
//!
//! The mock context runs nested messages through the same shared VM, so a
//! callback re-enters the binding while the outer execution is still live.

mod common;

use common::*;
use num_bigint::BigUint;
use std::panic::{self, AssertUnwindSafe};

const CALLER: u8 = 0x0a;
const CALLEE: u8 = 0x0b;

fn context_with(caller_code: Vec<u8>, callee_code: Vec<u8>) -> MockContext {
    MockContext::builder()
        .with_vm(shared_vm())
        .with_code(random_test_address(CALLER), caller_code)
        .with_code(random_test_address(CALLEE), callee_code)
        .build()
}

#[test]
fn test_one_level_call() {
    init_logger();
    let callee = random_test_address(CALLEE);
    let context = context_with(
        Assembler::new().call(CallKind::Call, &callee, 1000, b"ping").build(),
        Assembler::new().echo().build(),
    );
    let released = example_vm::release_count();

    let result = context.execute(&call_message(random_test_address(CALLER), &[]));
    let mut expected = vec![status_byte(StatusCode::Success)];
    expected.extend_from_slice(b"ping");
    assert!(result.is_success());
    assert_eq!(result.output, expected);
    // One gas for each command on either level
    assert_eq!(result.gas_left, TEST_GAS - 2);

    assert_eq!(
        context.calls(),
        vec![CallRecord {
            kind: CallKind::Call,
            depth: 1,
            recipient: callee,
            code_address: callee,
        }]
    );
    // The nested result and the outer one
    assert_eq!(example_vm::release_count() - released, 2);
}

#[test]
fn test_delegate_call_writes_caller_storage() {
    let caller = random_test_address(CALLER);
    let callee = random_test_address(CALLEE);
    let context = context_with(
        Assembler::new()
            .call(CallKind::DelegateCall, &callee, 1000, &[])
            .build(),
        Assembler::new().sstore(&word(1), &word(99)).build(),
    );

    let result = context.execute(&call_message(caller, &[]));
    assert!(result.is_success());
    assert_eq!(context.storage(&caller, &word(1)), word(99));
    assert_eq!(context.storage(&callee, &word(1)), word(0));
    assert_eq!(context.calls()[0].recipient, caller);
}

#[test]
fn test_value_transfer() {
    let caller = random_test_address(CALLER);
    let callee = random_test_address(CALLEE);
    let code = Assembler::new()
        .call_with(CallKind::Call, &callee, 1000, &word(40), &[0u8; 32], &[])
        .call_with(CallKind::Call, &callee, 1000, &word(500), &[0u8; 32], &[])
        .build();
    let context = MockContext::builder()
        .with_vm(shared_vm())
        .with_account(
            caller,
            Account {
                code,
                ..Account::with_balance(100)
            },
        )
        .build();

    let result = context.execute(&call_message(caller, &[]));
    assert!(result.is_success());
    assert_eq!(
        result.output,
        vec![
            status_byte(StatusCode::Success),
            status_byte(StatusCode::InsufficientBalance),
        ]
    );
    assert_eq!(context.balance(&caller), BigUint::from(60u32));
    assert_eq!(context.balance(&callee), BigUint::from(40u32));
}

#[test]
fn test_failed_call_is_rolled_back() {
    let caller = random_test_address(CALLER);
    let callee = random_test_address(CALLEE);
    let context = context_with(
        Assembler::new()
            .call(CallKind::Call, &callee, 1000, b"data")
            .sstore(&word(2), &word(2))
            .build(),
        Assembler::new()
            .sstore(&word(1), &word(1))
            .log(&[word(7)])
            .echo()
            .revert()
            .build(),
    );

    let result = context.execute(&call_message(caller, &[]));
    // The reverted callee still returns its own store status ahead of the echo
    let mut expected = vec![
        status_byte(StatusCode::Revert),
        qrvmc_rust::StorageStatus::Added.raw() as u8,
    ];
    expected.extend_from_slice(b"data");
    expected.push(qrvmc_rust::StorageStatus::Added.raw() as u8);
    assert_eq!(result.output, expected);

    assert_eq!(context.storage(&callee, &word(1)), word(0));
    assert_eq!(context.storage(&caller, &word(2)), word(2));
    assert!(context.logs().is_empty());
}

#[test]
fn test_create_and_create2() {
    init_logger();
    let caller = random_test_address(CALLER);
    // The init code returns itself, so it also becomes the deployed code
    let init_code = Assembler::new().echo().build();
    let salt = word(0x5a17);
    let code = Assembler::new()
        .call(CallKind::Create, &[0u8; 20], 1000, &init_code)
        .call_with(CallKind::Create2, &[0u8; 20], 1000, &[0u8; 32], &salt, &init_code)
        .build();
    let context = MockContext::builder()
        .with_vm(shared_vm())
        .with_code(caller, code)
        .build();

    let result = context.execute(&call_message(caller, &[]));
    assert!(result.is_success());
    assert_eq!(result.output.len(), 2 * 21);

    let mut preimage = caller.to_vec();
    preimage.extend_from_slice(&0u64.to_be_bytes());
    let created = &keccak256(&preimage)[12..];
    assert_eq!(result.output[0], status_byte(StatusCode::Success));
    assert_eq!(&result.output[1..21], created);

    let mut preimage = vec![0xff];
    preimage.extend_from_slice(&caller);
    preimage.extend_from_slice(&salt);
    preimage.extend_from_slice(&keccak256(&init_code));
    let created2 = &keccak256(&preimage)[12..];
    assert_eq!(result.output[21], status_byte(StatusCode::Success));
    assert_eq!(&result.output[22..], created2);

    let mut address = [0u8; 20];
    address.copy_from_slice(created2);
    assert_eq!(context.code(&address), init_code);
    assert_eq!(context.calls().len(), 2);
    assert!(context.calls().iter().all(|call| call.kind.is_create()));
}

#[test]
fn test_static_flag_is_inherited() {
    let caller = random_test_address(CALLER);
    let callee = random_test_address(CALLEE);
    let context = context_with(
        Assembler::new().call(CallKind::Call, &callee, 1000, &[]).build(),
        Assembler::new().sstore(&word(1), &word(1)).build(),
    );
    let message = Message {
        is_static: true,
        ..call_message(caller, &[])
    };

    let result = context.execute(&message);
    assert!(result.is_success());
    assert_eq!(result.output, vec![status_byte(StatusCode::StaticModeViolation)]);
    assert_eq!(context.storage(&callee, &word(1)), word(0));
}

#[test]
fn test_call_depth_limit() {
    let caller = random_test_address(CALLER);
    let callee = random_test_address(CALLEE);
    let context = context_with(
        Assembler::new().call(CallKind::Call, &callee, 1000, &[]).build(),
        Assembler::new().echo().build(),
    );
    let message = Message {
        depth: example_vm::interpreter::MAX_CALL_DEPTH,
        ..call_message(caller, &[])
    };

    let result = context.execute(&message);
    assert_eq!(result.output, vec![status_byte(StatusCode::CallDepthExceeded)]);
    assert!(context.calls().is_empty());
}

#[test]
fn test_host_panic_propagates_through_nesting() {
    init_logger();
    let caller = random_test_address(CALLER);
    let callee = random_test_address(CALLEE);
    let context = context_with(
        Assembler::new().call(CallKind::Call, &callee, 1000, &[]).build(),
        Assembler::new().balance(&caller).build(),
    );
    context.panic_in("get_balance");
    let released = example_vm::release_count();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        context.execute(&call_message(caller, &[]))
    }));
    let payload = outcome.expect_err("host panic propagates");
    assert_eq!(
        payload.downcast_ref::<String>().map(String::as_str),
        Some("get_balance failed")
    );
    // Both levels finished and released their results before unwinding
    assert_eq!(example_vm::release_count() - released, 2);

    // The shared VM keeps working for other contexts
    let context = context_with(
        Assembler::new().call(CallKind::Call, &callee, 1000, b"ok").build(),
        Assembler::new().echo().build(),
    );
    assert!(context.execute(&call_message(caller, &[])).is_success());
}
