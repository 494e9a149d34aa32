// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

pub mod qrvmc;
#[cfg(test)]
mod tests;

// Re-export main QRVMC types for convenience
pub use qrvmc::loader::{load, load_and_configure, LoaderError, LoaderErrorCode};
pub use qrvmc::traits::{HostContext, LogEvent};
pub use qrvmc::types::{
    AccessStatus, Address, CallKind, Capability, ExecutionResult, Hash, Message, Revision,
    SetOptionResult, StatusCode, StorageStatus, TxContext,
};
pub use qrvmc::vm::{ThreadSafeVm, Vm};
