// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! VM Handle
//!
//! [`Vm`] owns one native VM instance. It is created by the loader (or from a
//! statically linked create function) and destroyed exactly once, either by
//! [`Vm::destroy`] or when dropped. Because destruction consumes the handle,
//! use-after-destroy and double destruction do not compile.
//!
//! # Threading
//!
//! A `Vm` may be moved to another thread but not shared: the ABI does not
//! promise that a VM instance tolerates concurrent `execute` calls. When the
//! VM documents that it does, wrap it in [`ThreadSafeVm`].

use crate::qrvmc::ffi;
use crate::qrvmc::host_functions::{context_of, HOST_INTERFACE};
use crate::qrvmc::loader::{self, DynamicLibrary, LoaderError};
use crate::qrvmc::registry;
use crate::qrvmc::traits::HostContext;
use crate::qrvmc::types::{
    Address, Capability, ExecutionResult, Message, Revision, SetOptionResult, StatusCode,
};
use std::borrow::Cow;
use std::ffi::{CStr, CString};
use std::fmt;
use std::ops::Deref;
use std::panic;
use std::ptr::NonNull;
use std::sync::Arc;

/// A loaded VM instance.
pub struct Vm {
    instance: NonNull<ffi::qrvmc_vm>,
    // Keeps the shared library mapped until the instance is destroyed.
    // Declared after `instance` and only dropped after `Drop::drop` ran.
    _library: Option<Arc<dyn DynamicLibrary>>,
}

// The instance is owned exclusively; moving it between threads is allowed by
// the ABI, sharing it is not.
unsafe impl Send for Vm {}

impl Vm {
    /// Take ownership of a created instance.
    ///
    /// # Safety
    /// `instance` must come from a `qrvmc_create_*` function, must not be owned
    /// by anything else and must stay valid while `library` is loaded.
    pub(crate) unsafe fn from_raw(
        instance: NonNull<ffi::qrvmc_vm>,
        library: Option<Arc<dyn DynamicLibrary>>,
    ) -> Self {
        Self {
            instance,
            _library: library,
        }
    }

    /// Adopt a VM linked into the current binary.
    ///
    /// Applies the same checks as loading from a shared library: a null
    /// instance or an ABI version other than
    /// [`QRVMC_ABI_VERSION`](ffi::QRVMC_ABI_VERSION) is rejected.
    ///
    /// # Safety
    /// `create` must be a conforming `qrvmc_create_*` function.
    pub unsafe fn from_create_fn(create: ffi::qrvmc_create_fn) -> Result<Self, LoaderError> {
        loader::instantiate(create, None, "static create function")
    }

    fn raw(&self) -> &ffi::qrvmc_vm {
        // SAFETY: the instance is valid until this handle is dropped.
        unsafe { self.instance.as_ref() }
    }

    /// ABI version declared by the instance.
    pub fn abi_version(&self) -> i32 {
        self.raw().abi_version
    }

    /// Name of the VM implementation.
    pub fn name(&self) -> Cow<'_, str> {
        // SAFETY: the ABI requires a static NUL-terminated string.
        unsafe { c_string(self.raw().name) }
    }

    /// Version of the VM implementation.
    pub fn version(&self) -> Cow<'_, str> {
        // SAFETY: as for `name`.
        unsafe { c_string(self.raw().version) }
    }

    /// The raw capability flag set. 0 when the VM does not report any.
    pub fn capabilities(&self) -> ffi::qrvmc_capabilities_flagset {
        match self.raw().get_capabilities {
            // SAFETY: called with the instance it belongs to.
            Some(get_capabilities) => unsafe { get_capabilities(self.instance.as_ptr()) },
            None => 0,
        }
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities() & capability.flag() != 0
    }

    /// Forward a configuration option to the VM.
    ///
    /// A VM that does not support options answers `InvalidName` for every
    /// name.
    pub fn set_option(&self, name: &str, value: &str) -> SetOptionResult {
        self.try_set_option(name, value).unwrap_or_else(|raw| {
            log::warn!(
                "{}: set_option {}={} returned unknown result {}",
                self.name(),
                name,
                value,
                raw
            );
            SetOptionResult::InvalidValue
        })
    }

    pub(crate) fn supports_options(&self) -> bool {
        self.raw().set_option.is_some()
    }

    /// Like [`Vm::set_option`], but hands back answers outside the ABI's
    /// three outcomes instead of folding them into `InvalidValue`.
    pub(crate) fn try_set_option(
        &self,
        name: &str,
        value: &str,
    ) -> Result<SetOptionResult, ffi::qrvmc_set_option_result> {
        let set_option = match self.raw().set_option {
            Some(set_option) => set_option,
            None => return Ok(SetOptionResult::InvalidName),
        };

        let c_name = match CString::new(name) {
            Ok(c_name) => c_name,
            Err(_) => {
                log::warn!("option name {:?} contains a NUL byte", name);
                return Ok(SetOptionResult::InvalidName);
            }
        };
        let c_value = match CString::new(value) {
            Ok(c_value) => c_value,
            Err(_) => {
                log::warn!("value of option '{}' contains a NUL byte", name);
                return Ok(SetOptionResult::InvalidValue);
            }
        };

        // SAFETY: both strings outlive the call.
        let raw = unsafe { set_option(self.instance.as_ptr(), c_name.as_ptr(), c_value.as_ptr()) };
        let result = SetOptionResult::try_from(raw)?;
        log::debug!("{}: set_option {}={} -> {:?}", self.name(), name, value, result);
        Ok(result)
    }

    /// Execute `code` for `message`, serving callbacks from `host`.
    ///
    /// The host context is registered for the duration of the native call and
    /// unregistered on every exit path. The native result is copied into an
    /// owned [`ExecutionResult`] and released before this returns.
    ///
    /// # Panics
    ///
    /// If `host` panicked inside a callback, the panic is resumed here after
    /// cleanup. The VM itself saw the callback's default answer.
    pub fn execute(
        &self,
        host: &dyn HostContext,
        revision: Revision,
        message: &Message<'_>,
        code: &[u8],
    ) -> ExecutionResult {
        let execute = match self.raw().execute {
            Some(execute) => execute,
            None => {
                log::error!("{}: VM has no execute function", self.name());
                return ExecutionResult::internal_error();
            }
        };

        let registration = registry::global().register(host);
        let native_message = message.to_ffi();
        let code_ptr = if code.is_empty() {
            std::ptr::null()
        } else {
            code.as_ptr()
        };

        log::debug!(
            "execute: kind={:?} depth={} gas={} input_size={} code_size={} handle={}",
            message.kind,
            message.depth,
            message.gas,
            message.input.len(),
            code.len(),
            registration.handle()
        );

        // SAFETY: every pointer refers to data that outlives the call, and the
        // context handle stays registered until `registration` is dropped.
        let native = NativeResult::new(unsafe {
            execute(
                self.instance.as_ptr(),
                &HOST_INTERFACE,
                context_of(registration.handle()),
                revision.raw(),
                &native_message,
                code_ptr,
                code.len(),
            )
        });
        let result = native.to_execution_result();
        drop(native);

        let host_panic = registration.take_panic();
        drop(registration);
        if let Some(payload) = host_panic {
            panic::resume_unwind(payload);
        }

        log::debug!(
            "execute finished: status={} gas_left={} output_size={}",
            result.status_code,
            result.gas_left,
            result.output.len()
        );
        result
    }

    /// Destroy the VM instance.
    pub fn destroy(self) {
        drop(self);
    }
}

impl Drop for Vm {
    fn drop(&mut self) {
        if let Some(destroy) = self.raw().destroy {
            log::debug!("destroying VM {}", self.name());
            // SAFETY: the instance is owned by this handle and never used again.
            unsafe { destroy(self.instance.as_ptr()) };
        }
    }
}

impl fmt::Debug for Vm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vm")
            .field("name", &self.name())
            .field("version", &self.version())
            .field("abi_version", &self.abi_version())
            .finish()
    }
}

unsafe fn c_string<'a>(ptr: *const libc::c_char) -> Cow<'a, str> {
    if ptr.is_null() {
        Cow::Borrowed("")
    } else {
        CStr::from_ptr(ptr).to_string_lossy()
    }
}

/// A result produced by native code, released when dropped.
///
/// Owning the native struct is what guarantees its `release` function runs
/// exactly once.
pub struct NativeResult {
    inner: ffi::qrvmc_result,
}

impl NativeResult {
    pub(crate) fn new(inner: ffi::qrvmc_result) -> Self {
        Self { inner }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_raw(self.inner.status_code)
    }

    pub fn gas_left(&self) -> i64 {
        self.inner.gas_left
    }

    pub fn gas_refund(&self) -> i64 {
        self.inner.gas_refund
    }

    /// The output buffer, borrowed from native code.
    pub fn output(&self) -> &[u8] {
        if self.inner.output_data.is_null() || self.inner.output_size == 0 {
            &[]
        } else {
            // SAFETY: the VM keeps the buffer alive until `release` runs.
            unsafe { std::slice::from_raw_parts(self.inner.output_data, self.inner.output_size) }
        }
    }

    /// The created address; `None` when the VM left it zeroed.
    pub fn create_address(&self) -> Option<Address> {
        let address = Address::from(self.inner.create_address);
        if address == Address::default() {
            None
        } else {
            Some(address)
        }
    }

    /// Copy the result into managed memory.
    pub fn to_execution_result(&self) -> ExecutionResult {
        ExecutionResult {
            status_code: self.status_code(),
            gas_left: self.gas_left(),
            gas_refund: self.gas_refund(),
            output: self.output().to_vec(),
            create_address: self.create_address(),
        }
    }
}

impl Drop for NativeResult {
    fn drop(&mut self) {
        if let Some(release) = self.inner.release {
            // SAFETY: the result came from native code and is released once.
            unsafe { release(&self.inner) };
        }
    }
}

/// A [`Vm`] whose native implementation is known to support concurrent
/// `execute` calls.
pub struct ThreadSafeVm(Vm);

unsafe impl Sync for ThreadSafeVm {}

impl ThreadSafeVm {
    /// # Safety
    /// The VM implementation must allow concurrent calls on one instance.
    pub unsafe fn new(vm: Vm) -> Self {
        Self(vm)
    }

    pub fn into_inner(self) -> Vm {
        self.0
    }
}

impl Deref for ThreadSafeVm {
    type Target = Vm;

    fn deref(&self) -> &Vm {
        &self.0
    }
}

impl fmt::Debug for ThreadSafeVm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ThreadSafeVm").field(&self.0).finish()
    }
}
