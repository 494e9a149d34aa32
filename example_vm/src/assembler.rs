// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Fluent builder for example VM code

use crate::interpreter::opcodes::*;
use qrvmc_rust::{Address, CallKind, Hash};

/// Assembles a command list for the example VM
///
/// ```
/// use example_vm::assembler::Assembler;
///
/// let code = Assembler::new().echo().number().stop().build();
/// assert_eq!(code, vec![0x01, 0x07, 0x00]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Assembler {
    code: Vec<u8>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    fn op(mut self, opcode: u8, immediates: &[&[u8]]) -> Self {
        self.code.push(opcode);
        for immediate in immediates {
            self.code.extend_from_slice(immediate);
        }
        self
    }

    pub fn stop(self) -> Self {
        self.op(STOP, &[])
    }

    pub fn echo(self) -> Self {
        self.op(ECHO, &[])
    }

    pub fn sload(self, key: &Hash) -> Self {
        self.op(SLOAD, &[key])
    }

    pub fn sstore(self, key: &Hash, value: &Hash) -> Self {
        self.op(SSTORE, &[key, value])
    }

    pub fn balance(self, address: &Address) -> Self {
        self.op(BALANCE, &[address])
    }

    /// Nested call without value or salt
    pub fn call(self, kind: CallKind, address: &Address, gas: u64, input: &[u8]) -> Self {
        self.call_with(kind, address, gas, &[0u8; 32], &[0u8; 32], input)
    }

    /// Nested call with every field spelled out. Input longer than
    /// `u16::MAX` bytes is truncated.
    pub fn call_with(
        self,
        kind: CallKind,
        address: &Address,
        gas: u64,
        value: &Hash,
        salt: &Hash,
        input: &[u8],
    ) -> Self {
        let len = input.len().min(u16::MAX as usize);
        self.op(
            CALL,
            &[
                &[kind.raw() as u8],
                address,
                &gas.to_be_bytes(),
                value,
                salt,
                &(len as u16).to_be_bytes(),
                &input[..len],
            ],
        )
    }

    pub fn revert(self) -> Self {
        self.op(REVERT, &[])
    }

    pub fn number(self) -> Self {
        self.op(NUMBER, &[])
    }

    pub fn origin(self) -> Self {
        self.op(ORIGIN, &[])
    }

    pub fn blockhash(self, number: u64) -> Self {
        self.op(BLOCKHASH, &[&number.to_be_bytes()])
    }

    pub fn extcode(self, address: &Address) -> Self {
        self.op(EXTCODE, &[address])
    }

    pub fn selfdestruct(self, beneficiary: &Address) -> Self {
        self.op(SELFDESTRUCT, &[beneficiary])
    }

    pub fn access(self, address: &Address) -> Self {
        self.op(ACCESS, &[address])
    }

    /// Emit a log carrying the call input. The count byte is written as
    /// given, so more than four topics assemble into invalid code.
    pub fn log(self, topics: &[Hash]) -> Self {
        let mut this = self.op(LOG, &[&[topics.len() as u8]]);
        for topic in topics {
            this.code.extend_from_slice(topic);
        }
        this
    }

    pub fn exists(self, address: &Address) -> Self {
        self.op(EXISTS, &[address])
    }

    pub fn invalid(self) -> Self {
        self.op(INVALID, &[])
    }

    /// Append raw bytes, e.g. a truncated command
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.code.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_layout() {
        let code = Assembler::new()
            .call(CallKind::DelegateCall, &[0xaa; 20], 0x0102, b"hi")
            .build();
        assert_eq!(code.len(), 1 + 1 + 20 + 8 + 32 + 32 + 2 + 2);
        assert_eq!(code[0], CALL);
        assert_eq!(code[1], 1);
        assert_eq!(&code[22..30], &[0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(&code[94..96], &[0, 2]);
        assert_eq!(&code[96..], b"hi");
    }

    #[test]
    fn test_log_layout() {
        let code = Assembler::new().log(&[[1u8; 32], [2u8; 32]]).build();
        assert_eq!(code.len(), 2 + 64);
        assert_eq!(&code[..2], &[LOG, 2]);
        assert_eq!(hex::encode(&code[2..3]), "01");
    }
}
