// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! QRVMC Host Binding
//!
//! This module lets a host load VM implementations that speak the QRVMC
//! connector ABI and run code on them, serving the VM's callbacks from a
//! [`HostContext`] implementation.

pub mod error;
pub mod ffi;
pub mod host_functions;
pub mod loader;
pub mod registry;
pub mod traits;
pub mod types;
pub mod utils;
pub mod vm;

// Re-export main types for convenience
pub use error::{HostCallbackError, HostCallbackResult};
pub use loader::{load, load_and_configure, LoaderError, LoaderErrorCode};
pub use traits::*;
pub use types::*;
pub use vm::{NativeResult, ThreadSafeVm, Vm};
