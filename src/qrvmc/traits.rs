// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! QRVMC Host Context Trait
//!
//! This module defines the capability interface an embedding host implements
//! to serve the callbacks a VM makes during execution. The binding never looks
//! at blockchain state itself; every storage read, balance query or nested
//! call is forwarded to a [`HostContext`].

use crate::qrvmc::types::{
    AccessStatus, Address, ExecutionResult, Hash, Message, StorageStatus, TxContext,
};

/// Log event emitted by a contract
#[derive(Clone, Debug, PartialEq)]
pub struct LogEvent {
    /// Address of the contract that emitted the event
    pub address: Address,
    /// Event data (arbitrary bytes)
    pub data: Vec<u8>,
    /// Event topics (at most 4 for QRVM1 code, 32 bytes each)
    pub topics: Vec<Hash>,
}

/// Host-side state and execution engine, as seen by a VM.
///
/// All methods take `&self`; implementations keep mutable state behind
/// interior mutability. Callbacks for one execution run on the thread that
/// called [`crate::Vm::execute`] and may nest: [`HostContext::call`] can run
/// another execution through the same or another VM before returning.
///
/// Failures are expressed through return values (a zero word, `false`, a
/// failed [`ExecutionResult`]), never by unwinding. A panic is caught at the
/// boundary, the VM receives the default answer, and the panic resumes on the
/// Rust side when `execute` returns.
pub trait HostContext {
    /// Check account existence
    fn account_exists(&self, address: &Address) -> bool;

    /// Load a storage value (SLOAD). Missing slots read as zero.
    fn get_storage(&self, address: &Address, key: &Hash) -> Hash;

    /// Store a storage value (SSTORE) and report the effect of the write
    fn set_storage(&self, address: &Address, key: &Hash, value: &Hash) -> StorageStatus;

    /// Get the balance of an account, as a big-endian 256-bit integer
    fn get_balance(&self, address: &Address) -> Hash;

    /// Get the code size of an account
    fn get_code_size(&self, address: &Address) -> usize {
        self.get_code(address).len()
    }

    /// Get the code hash of an account
    fn get_code_hash(&self, address: &Address) -> Hash;

    /// Get the full code of an account
    fn get_code(&self, address: &Address) -> Vec<u8>;

    /// Copy code of an account starting at `offset` into `buffer`.
    /// Returns the number of bytes written.
    fn copy_code(&self, address: &Address, offset: usize, buffer: &mut [u8]) -> usize {
        let code = self.get_code(address);
        if offset >= code.len() {
            return 0;
        }
        let n = buffer.len().min(code.len() - offset);
        buffer[..n].copy_from_slice(&code[offset..offset + n]);
        n
    }

    /// Self-destruct `address`, sending its balance to `beneficiary`.
    /// Returns true if the account had not been registered for destruction yet.
    fn selfdestruct(&self, address: &Address, beneficiary: &Address) -> bool;

    /// Execute a nested message (CALL, CALLCODE, DELEGATECALL, CREATE, CREATE2)
    fn call(&self, message: &Message<'_>) -> ExecutionResult;

    /// Get transaction and block metadata
    fn get_tx_context(&self) -> TxContext;

    /// Get the hash of a block, or zero when unavailable
    fn get_block_hash(&self, number: i64) -> Hash;

    /// Record a log event
    fn emit_log(&self, event: LogEvent);

    /// Mark an account as accessed and report its previous access status
    fn access_account(&self, _address: &Address) -> AccessStatus {
        AccessStatus::Cold
    }

    /// Mark a storage slot as accessed and report its previous access status
    fn access_storage(&self, _address: &Address, _key: &Hash) -> AccessStatus {
        AccessStatus::Cold
    }
}
