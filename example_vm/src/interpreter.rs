// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Command Interpreter
//!
//! The example VM runs a flat list of commands. Each command is one opcode
//! byte followed by fixed-size immediates, and most commands append what
//! they learn from the host to the output buffer. Every command costs one
//! unit of gas; nested calls are additionally charged the gas they consume.
//!
//! The interpreter only ever talks to the host through the raw callback
//! table, exactly as a VM loaded from a shared library would.

use qrvmc_rust::qrvmc::ffi;
use qrvmc_rust::{CallKind, StatusCode};

/// Opcodes understood by the interpreter
pub mod opcodes {
    /// Halt successfully with the output collected so far
    pub const STOP: u8 = 0x00;
    /// Append the call input
    pub const ECHO: u8 = 0x01;
    /// `key:32` - append the storage word of the recipient
    pub const SLOAD: u8 = 0x02;
    /// `key:32 value:32` - store a word, append the storage status
    pub const SSTORE: u8 = 0x03;
    /// `address:20` - append the balance
    pub const BALANCE: u8 = 0x04;
    /// `kind:1 address:20 gas:8 value:32 salt:32 len:2 input:len` - nested call,
    /// append the status byte followed by the nested output (or the created
    /// address for create kinds)
    pub const CALL: u8 = 0x05;
    /// Halt with a revert and the output collected so far
    pub const REVERT: u8 = 0x06;
    /// Append the block number (8 bytes, big-endian)
    pub const NUMBER: u8 = 0x07;
    /// `number:8` - append the hash of the given block
    pub const BLOCKHASH: u8 = 0x08;
    /// `address:20` - append code size (8 bytes), code hash and the code
    pub const EXTCODE: u8 = 0x09;
    /// `beneficiary:20` - self-destruct the recipient, append 1 if newly
    /// registered, then halt
    pub const SELFDESTRUCT: u8 = 0x0a;
    /// `address:20` - mark the account accessed, append the previous status
    pub const ACCESS: u8 = 0x0b;
    /// `count:1 topics:32*count` - emit a log carrying the call input
    pub const LOG: u8 = 0x0c;
    /// `address:20` - append 1 if the account exists
    pub const EXISTS: u8 = 0x0d;
    /// Append the transaction origin
    pub const ORIGIN: u8 = 0x0e;
    /// Abort with an invalid instruction
    pub const INVALID: u8 = 0xfe;
}

use opcodes::*;

/// Deepest call depth at which a nested call is still attempted
pub const MAX_CALL_DEPTH: i32 = 1024;

const MAX_LOG_TOPICS: usize = 4;

/// Final state of one execution
#[derive(Debug)]
pub struct Outcome {
    pub status: StatusCode,
    pub gas_left: i64,
    pub output: Vec<u8>,
}

impl Outcome {
    pub fn error(status: StatusCode) -> Self {
        Self {
            status,
            gas_left: 0,
            output: Vec::new(),
        }
    }
}

enum Flow {
    Continue,
    Stop,
    Revert,
}

fn required<F>(callback: Option<F>) -> Result<F, StatusCode> {
    callback.ok_or(StatusCode::InternalError)
}

unsafe fn slice<'a>(data: *const u8, size: usize) -> &'a [u8] {
    if data.is_null() || size == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(data, size)
    }
}

pub struct Interpreter<'a> {
    host: &'a ffi::qrvmc_host_interface,
    context: *mut ffi::qrvmc_host_context,
    msg: &'a ffi::qrvmc_message,
    input: &'a [u8],
    code: &'a [u8],
    pc: usize,
    gas_left: i64,
    output: Vec<u8>,
    verbosity: u8,
}

impl<'a> Interpreter<'a> {
    /// # Safety
    /// `msg.input_data` must point to `msg.input_size` readable bytes (or be
    /// null), and `context` must be the context the host handed out with
    /// `host` for this execution.
    pub unsafe fn new(
        host: &'a ffi::qrvmc_host_interface,
        context: *mut ffi::qrvmc_host_context,
        msg: &'a ffi::qrvmc_message,
        code: &'a [u8],
        verbosity: u8,
    ) -> Self {
        Self {
            host,
            context,
            msg,
            input: slice(msg.input_data, msg.input_size),
            code,
            pc: 0,
            gas_left: msg.gas.max(0),
            output: Vec::new(),
            verbosity,
        }
    }

    /// Run the code to completion.
    ///
    /// # Safety
    /// Every callback in the host table must be safe to call with the
    /// context given to [`Interpreter::new`].
    pub unsafe fn run(mut self) -> Outcome {
        loop {
            match self.step() {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => return self.finish(StatusCode::Success),
                Ok(Flow::Revert) => return self.finish(StatusCode::Revert),
                Err(status) => {
                    if self.verbosity > 0 {
                        log::debug!("execution aborted at pc {}: {}", self.pc, status);
                    }
                    return Outcome::error(status);
                }
            }
        }
    }

    fn finish(self, status: StatusCode) -> Outcome {
        Outcome {
            status,
            gas_left: self.gas_left,
            output: self.output,
        }
    }

    fn is_static(&self) -> bool {
        self.msg.flags & ffi::QRVMC_STATIC != 0
    }

    fn charge(&mut self, cost: i64) -> Result<(), StatusCode> {
        if self.gas_left < cost {
            return Err(StatusCode::OutOfGas);
        }
        self.gas_left -= cost;
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), StatusCode> {
        if self.is_static() {
            Err(StatusCode::StaticModeViolation)
        } else {
            Ok(())
        }
    }

    fn immediate(&mut self, len: usize) -> Result<&'a [u8], StatusCode> {
        let code = self.code;
        let end = self
            .pc
            .checked_add(len)
            .filter(|end| *end <= code.len())
            .ok_or(StatusCode::InvalidInstruction)?;
        let bytes = &code[self.pc..end];
        self.pc = end;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8, StatusCode> {
        Ok(self.immediate(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, StatusCode> {
        let mut bytes = [0u8; 2];
        bytes.copy_from_slice(self.immediate(2)?);
        Ok(u16::from_be_bytes(bytes))
    }

    fn read_u64(&mut self) -> Result<u64, StatusCode> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.immediate(8)?);
        Ok(u64::from_be_bytes(bytes))
    }

    fn read_address(&mut self) -> Result<ffi::qrvmc_address, StatusCode> {
        let mut address = ffi::qrvmc_address::default();
        address.bytes.copy_from_slice(self.immediate(20)?);
        Ok(address)
    }

    fn read_word(&mut self) -> Result<ffi::qrvmc_bytes32, StatusCode> {
        let mut word = ffi::qrvmc_bytes32::default();
        word.bytes.copy_from_slice(self.immediate(32)?);
        Ok(word)
    }

    unsafe fn step(&mut self) -> Result<Flow, StatusCode> {
        let Some(&opcode) = self.code.get(self.pc) else {
            return Ok(Flow::Stop);
        };
        self.pc += 1;
        self.charge(1)?;
        if self.verbosity >= 2 {
            log::trace!(
                "pc={} opcode={:#04x} gas_left={}",
                self.pc - 1,
                opcode,
                self.gas_left
            );
        }

        let context = self.context;
        let recipient = self.msg.recipient;
        match opcode {
            STOP => return Ok(Flow::Stop),
            REVERT => return Ok(Flow::Revert),
            INVALID => return Err(StatusCode::InvalidInstruction),
            ECHO => self.output.extend_from_slice(self.input),
            SLOAD => {
                let key = self.read_word()?;
                required(self.host.access_storage)?(context, &recipient, &key);
                let value = required(self.host.get_storage)?(context, &recipient, &key);
                self.output.extend_from_slice(&value.bytes);
            }
            SSTORE => {
                self.ensure_writable()?;
                let key = self.read_word()?;
                let value = self.read_word()?;
                let status = required(self.host.set_storage)?(context, &recipient, &key, &value);
                self.output.push(status as u8);
            }
            BALANCE => {
                let address = self.read_address()?;
                let balance = required(self.host.get_balance)?(context, &address);
                self.output.extend_from_slice(&balance.bytes);
            }
            CALL => {
                let kind = self.read_u8()?;
                let address = self.read_address()?;
                let gas = self.read_u64()?;
                let value = self.read_word()?;
                let salt = self.read_word()?;
                let len = self.read_u16()? as usize;
                let input = self.immediate(len)?;
                self.call(kind as ffi::qrvmc_call_kind, address, gas, value, salt, input)?;
            }
            NUMBER => {
                let tx_context = required(self.host.get_tx_context)?(context);
                self.output
                    .extend_from_slice(&tx_context.block_number.to_be_bytes());
            }
            ORIGIN => {
                let tx_context = required(self.host.get_tx_context)?(context);
                self.output.extend_from_slice(&tx_context.tx_origin.bytes);
            }
            BLOCKHASH => {
                let number = self.read_u64()? as i64;
                let hash = required(self.host.get_block_hash)?(context, number);
                self.output.extend_from_slice(&hash.bytes);
            }
            EXTCODE => {
                let address = self.read_address()?;
                let size = required(self.host.get_code_size)?(context, &address);
                let hash = required(self.host.get_code_hash)?(context, &address);
                let mut code = vec![0u8; size];
                let written =
                    required(self.host.copy_code)?(context, &address, 0, code.as_mut_ptr(), size);
                self.output.extend_from_slice(&(size as u64).to_be_bytes());
                self.output.extend_from_slice(&hash.bytes);
                self.output.extend_from_slice(&code[..written.min(size)]);
            }
            SELFDESTRUCT => {
                self.ensure_writable()?;
                let beneficiary = self.read_address()?;
                let registered =
                    required(self.host.selfdestruct)?(context, &recipient, &beneficiary);
                self.output.push(registered as u8);
                return Ok(Flow::Stop);
            }
            ACCESS => {
                let address = self.read_address()?;
                let status = required(self.host.access_account)?(context, &address);
                self.output.push(status as u8);
            }
            LOG => {
                self.ensure_writable()?;
                let count = self.read_u8()? as usize;
                if count > MAX_LOG_TOPICS {
                    return Err(StatusCode::InvalidInstruction);
                }
                let mut topics = Vec::with_capacity(count);
                for _ in 0..count {
                    topics.push(self.read_word()?);
                }
                let data = if self.input.is_empty() {
                    std::ptr::null()
                } else {
                    self.input.as_ptr()
                };
                required(self.host.emit_log)?(
                    context,
                    &recipient,
                    data,
                    self.input.len(),
                    topics.as_ptr(),
                    topics.len(),
                );
            }
            EXISTS => {
                let address = self.read_address()?;
                let exists = required(self.host.account_exists)?(context, &address);
                self.output.push(exists as u8);
            }
            _ => return Err(StatusCode::UndefinedInstruction),
        }
        Ok(Flow::Continue)
    }

    unsafe fn call(
        &mut self,
        kind: ffi::qrvmc_call_kind,
        address: ffi::qrvmc_address,
        gas: u64,
        value: ffi::qrvmc_bytes32,
        salt: ffi::qrvmc_bytes32,
        input: &[u8],
    ) -> Result<(), StatusCode> {
        let call_kind = CallKind::try_from(kind).map_err(|_| StatusCode::InvalidInstruction)?;
        let transfers_value = value.bytes.iter().any(|byte| *byte != 0);
        if call_kind.is_create() || (transfers_value && call_kind == CallKind::Call) {
            self.ensure_writable()?;
        }

        if self.msg.depth >= MAX_CALL_DEPTH {
            self.output.push(StatusCode::CallDepthExceeded.raw() as u8);
            if call_kind.is_create() {
                self.output.extend_from_slice(&[0u8; 20]);
            }
            return Ok(());
        }

        let gas = i64::try_from(gas).unwrap_or(i64::MAX).min(self.gas_left);
        let (recipient, sender, value) = match call_kind {
            CallKind::Call => (address, self.msg.recipient, value),
            CallKind::CallCode => (self.msg.recipient, self.msg.recipient, value),
            CallKind::DelegateCall => (self.msg.recipient, self.msg.sender, self.msg.value),
            // The host assigns the new address
            CallKind::Create | CallKind::Create2 => {
                (ffi::qrvmc_address::default(), self.msg.recipient, value)
            }
        };
        let nested = ffi::qrvmc_message {
            kind,
            flags: self.msg.flags,
            depth: self.msg.depth + 1,
            gas,
            recipient,
            sender,
            input_data: if input.is_empty() {
                std::ptr::null()
            } else {
                input.as_ptr()
            },
            input_size: input.len(),
            value,
            create2_salt: salt,
            code_address: address,
        };

        let result = required(self.host.call)?(self.context, &nested);
        let output = slice(result.output_data, result.output_size).to_vec();
        let create_address = result.create_address;
        if let Some(release) = result.release {
            release(&result);
        }

        self.gas_left -= gas - result.gas_left.clamp(0, gas);
        self.output.push(result.status_code as u8);
        if call_kind.is_create() {
            self.output.extend_from_slice(&create_address.bytes);
        } else {
            self.output.extend_from_slice(&output);
        }
        Ok(())
    }
}
