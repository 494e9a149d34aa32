// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Mock Host Context Implementation
//!
//! An in-memory world state implementing [`HostContext`], for tests and
//! demos. Nested calls and contract creation are executed through a shared
//! VM handle against the same context, and their state changes are rolled
//! back when they do not succeed. Embedders should write their own context
//! on top of their actual state.

use num_bigint::BigUint;
use num_traits::Zero;
use qrvmc_rust::qrvmc::{hash_from_biguint, hash_to_biguint};
use qrvmc_rust::{
    AccessStatus, Address, CallKind, ExecutionResult, Hash, HostContext, LogEvent, Message,
    Revision, StatusCode, StorageStatus, ThreadSafeVm, TxContext,
};
use sha3::{Digest, Keccak256};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Deepest message depth the context still executes
pub const MAX_DEPTH: i32 = 1024;

/// Number of recent blocks whose hashes are available
const BLOCK_HASH_WINDOW: i64 = 256;

pub fn keccak256(data: &[u8]) -> Hash {
    let mut hash = Hash::default();
    hash.copy_from_slice(&Keccak256::digest(data));
    hash
}

/// Account information stored in the world state
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Account {
    pub balance: Hash,
    pub nonce: u64,
    pub code: Vec<u8>,
    pub storage: HashMap<Hash, Hash>,
}

impl Account {
    pub fn with_balance(balance: u64) -> Self {
        Self {
            balance: hash_from_biguint(&BigUint::from(balance)),
            ..Default::default()
        }
    }

    pub fn with_code(code: Vec<u8>) -> Self {
        Self {
            code,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default)]
struct WorldState {
    accounts: HashMap<Address, Account>,
    destructed: HashSet<Address>,
    warm_accounts: HashSet<Address>,
    warm_slots: HashSet<(Address, Hash)>,
}

/// A nested message as the context saw it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallRecord {
    pub kind: CallKind,
    pub depth: i32,
    pub recipient: Address,
    pub code_address: Address,
}

/// Mock execution context
pub struct MockContext {
    state: RefCell<WorldState>,
    logs: RefCell<Vec<LogEvent>>,
    calls: RefCell<Vec<CallRecord>>,
    tx_context: TxContext,
    revision: Revision,
    vm: Option<Arc<ThreadSafeVm>>,
    panic_in: Cell<Option<&'static str>>,
}

/// Builder for MockContext with fluent interface
pub struct MockContextBuilder {
    accounts: HashMap<Address, Account>,
    tx_context: TxContext,
    revision: Revision,
    vm: Option<Arc<ThreadSafeVm>>,
}

impl Default for MockContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockContextBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        let mut tx_origin = [0u8; 20];
        tx_origin[0] = 0x03; // Mock transaction origin

        let mut block_coinbase = [0u8; 20];
        block_coinbase[0] = 0x02; // Mock coinbase address

        let mut chain_id = [0u8; 32];
        chain_id[31] = 0x07;

        Self {
            accounts: HashMap::new(),
            tx_context: TxContext {
                tx_origin,
                block_coinbase,
                block_number: 12345,
                block_timestamp: 1234567890,
                block_gas_limit: 1000000,
                chain_id,
                ..Default::default()
            },
            revision: Revision::LATEST_STABLE,
            vm: None,
        }
    }

    /// Add or replace an account
    pub fn with_account(mut self, address: Address, account: Account) -> Self {
        self.accounts.insert(address, account);
        self
    }

    /// Set the code of an account, creating it if needed
    pub fn with_code(mut self, address: Address, code: Vec<u8>) -> Self {
        self.accounts.entry(address).or_default().code = code;
        self
    }

    /// Set the balance of an account, creating it if needed
    pub fn with_balance(mut self, address: Address, balance: u64) -> Self {
        self.accounts.entry(address).or_default().balance =
            hash_from_biguint(&BigUint::from(balance));
        self
    }

    /// Set one storage slot of an account, creating it if needed
    pub fn with_storage(mut self, address: Address, key: Hash, value: Hash) -> Self {
        self.accounts
            .entry(address)
            .or_default()
            .storage
            .insert(key, value);
        self
    }

    /// Set block number
    pub fn with_block_number(mut self, number: i64) -> Self {
        self.tx_context.block_number = number;
        self
    }

    /// Set transaction origin
    pub fn with_origin(mut self, origin: Address) -> Self {
        self.tx_context.tx_origin = origin;
        self
    }

    /// Set the VM that executes nested messages
    pub fn with_vm(mut self, vm: Arc<ThreadSafeVm>) -> Self {
        self.vm = Some(vm);
        self
    }

    /// Build the MockContext
    pub fn build(self) -> MockContext {
        MockContext {
            state: RefCell::new(WorldState {
                accounts: self.accounts,
                ..Default::default()
            }),
            logs: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            tx_context: self.tx_context,
            revision: self.revision,
            vm: self.vm,
            panic_in: Cell::new(None),
        }
    }
}

impl MockContext {
    /// Create a new builder for MockContext
    pub fn builder() -> MockContextBuilder {
        MockContextBuilder::new()
    }

    /// Execute a top-level message against the code of its code address
    pub fn execute(&self, message: &Message<'_>) -> ExecutionResult {
        match &self.vm {
            Some(vm) => {
                let code = self.code(&message.code_address);
                vm.execute(self, self.revision, message, &code)
            }
            None => ExecutionResult::internal_error(),
        }
    }

    /// Make the named callback panic from now on
    pub fn panic_in(&self, function: &'static str) {
        self.panic_in.set(Some(function));
    }

    fn check_panic(&self, function: &'static str) {
        if self.panic_in.get() == Some(function) {
            panic!("{} failed", function);
        }
    }

    pub fn code(&self, address: &Address) -> Vec<u8> {
        self.state
            .borrow()
            .accounts
            .get(address)
            .map(|account| account.code.clone())
            .unwrap_or_default()
    }

    pub fn storage(&self, address: &Address, key: &Hash) -> Hash {
        self.state
            .borrow()
            .accounts
            .get(address)
            .and_then(|account| account.storage.get(key).copied())
            .unwrap_or_default()
    }

    pub fn balance(&self, address: &Address) -> BigUint {
        let balance = self
            .state
            .borrow()
            .accounts
            .get(address)
            .map(|account| account.balance)
            .unwrap_or_default();
        hash_to_biguint(&balance)
    }

    pub fn is_destructed(&self, address: &Address) -> bool {
        self.state.borrow().destructed.contains(address)
    }

    pub fn logs(&self) -> Vec<LogEvent> {
        self.logs.borrow().clone()
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.borrow().clone()
    }

    fn transfer(&self, from: &Address, to: &Address, value: &Hash) -> bool {
        let amount = hash_to_biguint(value);
        if amount.is_zero() {
            return true;
        }
        let mut state = self.state.borrow_mut();
        let available = state
            .accounts
            .get(from)
            .map(|account| hash_to_biguint(&account.balance))
            .unwrap_or_default();
        if available < amount {
            return false;
        }
        let sender = state.accounts.entry(*from).or_default();
        sender.balance = hash_from_biguint(&(available - &amount));
        let receiver = state.accounts.entry(*to).or_default();
        receiver.balance = hash_from_biguint(&(hash_to_biguint(&receiver.balance) + amount));
        true
    }

    fn new_address(&self, message: &Message<'_>) -> Address {
        let digest = match message.kind {
            CallKind::Create2 => {
                let mut preimage = Vec::with_capacity(1 + 20 + 32 + 32);
                preimage.push(0xff);
                preimage.extend_from_slice(&message.sender);
                preimage.extend_from_slice(&message.create2_salt);
                preimage.extend_from_slice(&keccak256(message.input));
                keccak256(&preimage)
            }
            _ => {
                let mut state = self.state.borrow_mut();
                let sender = state.accounts.entry(message.sender).or_default();
                let nonce = sender.nonce;
                sender.nonce += 1;
                let mut preimage = message.sender.to_vec();
                preimage.extend_from_slice(&nonce.to_be_bytes());
                keccak256(&preimage)
            }
        };
        let mut address = [0u8; 20];
        address.copy_from_slice(&digest[12..]);
        address
    }

    fn dispatch(&self, vm: &ThreadSafeVm, message: &Message<'_>) -> ExecutionResult {
        if message.kind.is_create() {
            let address = self.new_address(message);
            if !self.transfer(&message.sender, &address, &message.value) {
                return ExecutionResult::new(StatusCode::InsufficientBalance, message.gas, vec![]);
            }
            let nested = Message {
                recipient: address,
                code_address: address,
                ..*message
            };
            // The input is the init code; its output becomes the account code
            let result = vm.execute(self, self.revision, &nested, message.input);
            if result.is_success() {
                self.state
                    .borrow_mut()
                    .accounts
                    .entry(address)
                    .or_default()
                    .code = result.output.clone();
                return result.with_create_address(address);
            }
            return result;
        }

        if message.kind == CallKind::Call
            && !self.transfer(&message.sender, &message.recipient, &message.value)
        {
            return ExecutionResult::new(StatusCode::InsufficientBalance, message.gas, vec![]);
        }
        let code = self.code(&message.code_address);
        vm.execute(self, self.revision, message, &code)
    }
}

impl HostContext for MockContext {
    fn account_exists(&self, address: &Address) -> bool {
        self.check_panic("account_exists");
        self.state.borrow().accounts.contains_key(address)
    }

    fn get_storage(&self, address: &Address, key: &Hash) -> Hash {
        self.check_panic("get_storage");
        self.storage(address, key)
    }

    fn set_storage(&self, address: &Address, key: &Hash, value: &Hash) -> StorageStatus {
        self.check_panic("set_storage");
        let mut state = self.state.borrow_mut();
        let storage = &mut state.accounts.entry(*address).or_default().storage;
        let current = storage.get(key).copied().unwrap_or_default();
        let zero = Hash::default();

        let status = if current == *value {
            StorageStatus::Assigned
        } else if current == zero {
            StorageStatus::Added
        } else if *value == zero {
            StorageStatus::Deleted
        } else {
            StorageStatus::Modified
        };
        if *value == zero {
            storage.remove(key);
        } else {
            storage.insert(*key, *value);
        }
        status
    }

    fn get_balance(&self, address: &Address) -> Hash {
        self.check_panic("get_balance");
        hash_from_biguint(&self.balance(address))
    }

    fn get_code_size(&self, address: &Address) -> usize {
        self.check_panic("get_code_size");
        self.state
            .borrow()
            .accounts
            .get(address)
            .map_or(0, |account| account.code.len())
    }

    fn get_code_hash(&self, address: &Address) -> Hash {
        self.check_panic("get_code_hash");
        match self.state.borrow().accounts.get(address) {
            Some(account) => keccak256(&account.code),
            None => Hash::default(),
        }
    }

    fn get_code(&self, address: &Address) -> Vec<u8> {
        self.check_panic("get_code");
        self.code(address)
    }

    fn selfdestruct(&self, address: &Address, beneficiary: &Address) -> bool {
        self.check_panic("selfdestruct");
        let balance = hash_from_biguint(&self.balance(address));
        if address != beneficiary {
            self.transfer(address, beneficiary, &balance);
        }
        self.state.borrow_mut().destructed.insert(*address)
    }

    fn call(&self, message: &Message<'_>) -> ExecutionResult {
        self.check_panic("call");
        self.calls.borrow_mut().push(CallRecord {
            kind: message.kind,
            depth: message.depth,
            recipient: message.recipient,
            code_address: message.code_address,
        });

        let Some(vm) = self.vm.clone() else {
            return ExecutionResult::failure();
        };
        if message.depth > MAX_DEPTH {
            return ExecutionResult::new(StatusCode::CallDepthExceeded, message.gas, vec![]);
        }

        let snapshot = self.state.borrow().clone();
        let log_count = self.logs.borrow().len();
        let result = self.dispatch(&vm, message);
        if !result.is_success() {
            *self.state.borrow_mut() = snapshot;
            self.logs.borrow_mut().truncate(log_count);
        }
        result
    }

    fn get_tx_context(&self) -> TxContext {
        self.check_panic("get_tx_context");
        self.tx_context
    }

    fn get_block_hash(&self, number: i64) -> Hash {
        self.check_panic("get_block_hash");
        let current = self.tx_context.block_number;
        if number >= current || number < current - BLOCK_HASH_WINDOW {
            return Hash::default();
        }
        keccak256(&number.to_be_bytes())
    }

    fn emit_log(&self, event: LogEvent) {
        self.check_panic("emit_log");
        log::debug!(
            "log from 0x{}: {} topics, {} bytes",
            hex::encode(event.address),
            event.topics.len(),
            event.data.len()
        );
        self.logs.borrow_mut().push(event);
    }

    fn access_account(&self, address: &Address) -> AccessStatus {
        self.check_panic("access_account");
        if self.state.borrow_mut().warm_accounts.insert(*address) {
            AccessStatus::Cold
        } else {
            AccessStatus::Warm
        }
    }

    fn access_storage(&self, address: &Address, key: &Hash) -> AccessStatus {
        self.check_panic("access_storage");
        if self.state.borrow_mut().warm_slots.insert((*address, *key)) {
            AccessStatus::Cold
        } else {
            AccessStatus::Warm
        }
    }
}
