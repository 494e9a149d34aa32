// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! VM Loader
//!
//! Opens a VM shared library, finds its create function, creates the
//! instance and checks its ABI version.
//!
//! # Create function lookup
//!
//! For `path/to/libexample-vm.so.1` the loader first looks for
//! `qrvmc_create_example_vm`: the directory, a `lib` prefix and everything
//! after the first `.` are dropped and `-` becomes `_`. If that symbol does not
//! exist it falls back to the generic `qrvmc_create`.
//!
//! # Configuration strings
//!
//! [`load_and_configure`] accepts `path,name=value,name=value,...`. Options are
//! applied in order; an option without `=` has an empty value. Any rejected
//! option fails the whole load and the instance is destroyed.
//!
//! # Usage
//!
//! ```rust,no_run
//! use qrvmc_rust::qrvmc::loader::load_and_configure;
//!
//! let vm = load_and_configure("./libexample_vm.so,verbose=2").expect("VM loads");
//! println!("{} {}", vm.name(), vm.version());
//! ```

use crate::qrvmc::ffi;
use crate::qrvmc::types::SetOptionResult;
use crate::qrvmc::vm::Vm;
use std::ptr::NonNull;
use std::sync::Arc;
use thiserror::Error;

/// Longest accepted library path, and the size limit of a configuration
/// string including its terminator.
pub const PATH_MAX_LENGTH: usize = 4096;

const CREATE_FN_PREFIX: &str = "qrvmc_create_";
const DEFAULT_CREATE_FN: &str = "qrvmc_create";

/// Numeric loader error codes of the native loader ABI.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoaderErrorCode {
    Success = 0,
    CannotOpen = 1,
    SymbolNotFound = 2,
    InvalidArgument = 3,
    VmCreationFailure = 4,
    AbiVersionMismatch = 5,
    InvalidOptionName = 6,
    InvalidOptionValue = 7,
    Unspecified = -1,
}

impl LoaderErrorCode {
    pub fn raw(self) -> i32 {
        self as i32
    }

    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => LoaderErrorCode::Success,
            1 => LoaderErrorCode::CannotOpen,
            2 => LoaderErrorCode::SymbolNotFound,
            3 => LoaderErrorCode::InvalidArgument,
            4 => LoaderErrorCode::VmCreationFailure,
            5 => LoaderErrorCode::AbiVersionMismatch,
            6 => LoaderErrorCode::InvalidOptionName,
            7 => LoaderErrorCode::InvalidOptionValue,
            _ => LoaderErrorCode::Unspecified,
        }
    }
}

/// Why a VM could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoaderError {
    #[error("QRVMC loading error: {0}")]
    CannotOpen(String),
    #[error("QRVMC loading error: {0}")]
    SymbolNotFound(String),
    #[error("QRVMC loading error: {0}")]
    InvalidArgument(String),
    #[error("QRVMC loading error: {0}")]
    VmCreationFailure(String),
    #[error("QRVMC loading error: {0}")]
    AbiVersionMismatch(String),
    #[error("QRVMC loading error: {0}")]
    InvalidOptionName(String),
    #[error("QRVMC loading error: {0}")]
    InvalidOptionValue(String),
    /// A loader code without a diagnostic message
    #[error("QRVMC loading error {0}")]
    Unspecified(i32),
}

impl LoaderError {
    /// Build an error from a raw loader code, preferring the message when
    /// there is one.
    pub fn from_code(code: i32, message: Option<String>) -> Self {
        let message = match message {
            Some(message) => message,
            None => return LoaderError::Unspecified(code),
        };
        match LoaderErrorCode::from_raw(code) {
            LoaderErrorCode::CannotOpen => LoaderError::CannotOpen(message),
            LoaderErrorCode::SymbolNotFound => LoaderError::SymbolNotFound(message),
            LoaderErrorCode::InvalidArgument => LoaderError::InvalidArgument(message),
            LoaderErrorCode::VmCreationFailure => LoaderError::VmCreationFailure(message),
            LoaderErrorCode::AbiVersionMismatch => LoaderError::AbiVersionMismatch(message),
            LoaderErrorCode::InvalidOptionName => LoaderError::InvalidOptionName(message),
            LoaderErrorCode::InvalidOptionValue => LoaderError::InvalidOptionValue(message),
            LoaderErrorCode::Success | LoaderErrorCode::Unspecified => {
                LoaderError::Unspecified(code)
            }
        }
    }

    pub fn code(&self) -> LoaderErrorCode {
        match self {
            LoaderError::CannotOpen(_) => LoaderErrorCode::CannotOpen,
            LoaderError::SymbolNotFound(_) => LoaderErrorCode::SymbolNotFound,
            LoaderError::InvalidArgument(_) => LoaderErrorCode::InvalidArgument,
            LoaderError::VmCreationFailure(_) => LoaderErrorCode::VmCreationFailure,
            LoaderError::AbiVersionMismatch(_) => LoaderErrorCode::AbiVersionMismatch,
            LoaderError::InvalidOptionName(_) => LoaderErrorCode::InvalidOptionName,
            LoaderError::InvalidOptionValue(_) => LoaderErrorCode::InvalidOptionValue,
            LoaderError::Unspecified(_) => LoaderErrorCode::Unspecified,
        }
    }

    /// The diagnostic message, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            LoaderError::CannotOpen(message)
            | LoaderError::SymbolNotFound(message)
            | LoaderError::InvalidArgument(message)
            | LoaderError::VmCreationFailure(message)
            | LoaderError::AbiVersionMismatch(message)
            | LoaderError::InvalidOptionName(message)
            | LoaderError::InvalidOptionValue(message) => Some(message),
            LoaderError::Unspecified(_) => None,
        }
    }
}

/// An opened shared library.
pub trait DynamicLibrary: Send + Sync {
    /// Look up a function exported under `name`.
    ///
    /// # Safety
    /// The symbol, if present, must have the signature of a VM create function.
    unsafe fn create_fn(&self, name: &str) -> Option<ffi::qrvmc_create_fn>;
}

/// Opens shared libraries by path.
pub trait LibraryOpener {
    /// Open the library at `path`. The error carries the system loader's
    /// message, or `None` if it gave none.
    fn open(&self, path: &str) -> Result<Arc<dyn DynamicLibrary>, Option<String>>;
}

/// The platform dynamic loader.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemLibraryOpener;

struct SystemLibrary(libloading::Library);

impl DynamicLibrary for SystemLibrary {
    unsafe fn create_fn(&self, name: &str) -> Option<ffi::qrvmc_create_fn> {
        let symbol: libloading::Symbol<ffi::qrvmc_create_fn> = self.0.get(name.as_bytes()).ok()?;
        Some(*symbol)
    }
}

impl LibraryOpener for SystemLibraryOpener {
    fn open(&self, path: &str) -> Result<Arc<dyn DynamicLibrary>, Option<String>> {
        // SAFETY: initialization routines of a VM library are trusted as much
        // as the VM itself.
        let library = unsafe { libloading::Library::new(path) }.map_err(|e| {
            let message = e.to_string();
            (!message.is_empty()).then_some(message)
        })?;
        Ok(Arc::new(SystemLibrary(library)))
    }
}

/// Name of the create function the loader looks for first.
pub fn create_fn_name(path: &str) -> String {
    let separators: &[char] = if cfg!(windows) { &['/', '\\'] } else { &['/'] };
    let file_name = path.rsplit(separators).next().unwrap_or(path);
    let name = file_name.strip_prefix("lib").unwrap_or(file_name);
    let name = match name.find('.') {
        Some(ext_pos) => &name[..ext_pos],
        None => name,
    };
    format!("{}{}", CREATE_FN_PREFIX, name.replace('-', "_"))
}

fn validate_path(path: &str) -> Result<(), LoaderError> {
    if path.is_empty() {
        return Err(LoaderError::InvalidArgument(
            "invalid argument: file name cannot be empty".to_string(),
        ));
    }
    if path.len() > PATH_MAX_LENGTH {
        return Err(LoaderError::InvalidArgument(format!(
            "invalid argument: file name is too long ({}, maximum allowed length is {})",
            path.len(),
            PATH_MAX_LENGTH
        )));
    }
    Ok(())
}

fn find_create_fn(
    library: &dyn DynamicLibrary,
    path: &str,
) -> Result<ffi::qrvmc_create_fn, LoaderError> {
    let name = create_fn_name(path);
    // SAFETY: QRVMC libraries export create functions under these names.
    let create = unsafe { library.create_fn(&name) }.or_else(|| {
        log::debug!("{} not found in {}, trying {}", name, path, DEFAULT_CREATE_FN);
        unsafe { library.create_fn(DEFAULT_CREATE_FN) }
    });
    create.ok_or_else(|| {
        LoaderError::SymbolNotFound(format!("QRVMC create function not found in {}", path))
    })
}

/// Create an instance and check that it speaks our ABI version.
///
/// # Safety
/// `create` must be a conforming VM create function, and `library` must be
/// the library it comes from (if any).
pub(crate) unsafe fn instantiate(
    create: ffi::qrvmc_create_fn,
    library: Option<Arc<dyn DynamicLibrary>>,
    origin: &str,
) -> Result<Vm, LoaderError> {
    let instance = NonNull::new(create()).ok_or_else(|| {
        LoaderError::VmCreationFailure(format!("creating QRVMC VM of {} has failed", origin))
    })?;
    let vm = Vm::from_raw(instance, library);

    let abi_version = vm.abi_version();
    if abi_version != ffi::QRVMC_ABI_VERSION {
        // Dropping the handle destroys the instance.
        drop(vm);
        return Err(LoaderError::AbiVersionMismatch(format!(
            "QRVMC ABI version {} of {} mismatches the expected version {}",
            abi_version,
            origin,
            ffi::QRVMC_ABI_VERSION
        )));
    }

    log::debug!("created VM {} {} from {}", vm.name(), vm.version(), origin);
    Ok(vm)
}

/// Load a VM through `opener`.
pub fn load_with(opener: &dyn LibraryOpener, path: &str) -> Result<Vm, LoaderError> {
    validate_path(path)?;
    log::debug!("loading VM library {}", path);

    let library = opener.open(path).map_err(|message| {
        LoaderError::CannotOpen(message.unwrap_or_else(|| format!("cannot open {}", path)))
    })?;
    let create = find_create_fn(library.as_ref(), path)?;

    // SAFETY: `create` was resolved from `library`, which the VM keeps alive.
    unsafe { instantiate(create, Some(library), path) }
}

/// Load the VM library at `path` and create an instance.
pub fn load(path: &str) -> Result<Vm, LoaderError> {
    load_with(&SystemLibraryOpener, path)
}

/// Load and configure a VM through `opener`.
pub fn load_and_configure_with(
    opener: &dyn LibraryOpener,
    config: &str,
) -> Result<Vm, LoaderError> {
    if config.len() >= PATH_MAX_LENGTH {
        return Err(LoaderError::InvalidArgument(format!(
            "invalid argument: configuration is too long (maximum allowed length is {})",
            PATH_MAX_LENGTH
        )));
    }

    let (path, mut options) = config.split_once(',').unwrap_or((config, ""));
    let vm = load_with(opener, path)?;

    while !options.is_empty() {
        if !vm.supports_options() {
            return Err(LoaderError::InvalidOptionName(format!(
                "{} ({}) does not support any options",
                vm.name(),
                path
            )));
        }

        let (option, rest) = options.split_once(',').unwrap_or((options, ""));
        options = rest;
        let (name, value) = option.split_once('=').unwrap_or((option, ""));

        match vm.try_set_option(name, value) {
            Ok(SetOptionResult::Success) => {}
            Ok(SetOptionResult::InvalidName) => {
                return Err(LoaderError::InvalidOptionName(format!(
                    "{} ({}): unknown option '{}'",
                    vm.name(),
                    path,
                    name
                )));
            }
            Ok(SetOptionResult::InvalidValue) => {
                return Err(LoaderError::InvalidOptionValue(format!(
                    "{} ({}): unsupported value '{}' for option '{}'",
                    vm.name(),
                    path,
                    value,
                    name
                )));
            }
            Err(_) => {
                return Err(LoaderError::InvalidOptionValue(format!(
                    "{} ({}): unknown error when setting value '{}' for option '{}'",
                    vm.name(),
                    path,
                    value,
                    name
                )));
            }
        }
    }

    Ok(vm)
}

/// Load a VM from a `path,name=value,...` configuration string and apply the
/// options in order.
pub fn load_and_configure(config: &str) -> Result<Vm, LoaderError> {
    load_and_configure_with(&SystemLibraryOpener, config)
}
