// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Error Handling for Host Callbacks
//!
//! Callbacks run inside a native call frame: there is nobody on the other side
//! who could receive a Rust error. Problems detected there are described with
//! [`HostCallbackError`], logged, and answered with the ABI's default value
//! for that callback.
//!
//! # Error Categories
//!
//! - **Context Errors** - The opaque handle does not resolve to a live context
//! - **Parameter Errors** - Null pointers or malformed values from the VM
//! - **Host Errors** - The host context panicked while serving the callback
//!
//! Loader failures have their own type, [`crate::qrvmc::loader::LoaderError`],
//! and execution outcomes are data ([`crate::qrvmc::types::StatusCode`]).

use std::any::Any;
use std::fmt;

/// Result type for callback bodies
pub type HostCallbackResult<T> = Result<T, HostCallbackError>;

/// Errors that can occur while serving a callback
#[derive(Debug, Clone, PartialEq)]
pub enum HostCallbackError {
    /// The handle passed by the VM is not registered
    ContextNotFound { handle: usize, function: String },
    /// A required pointer argument was null
    NullPointer { param: String, function: String },
    /// An argument had a value outside the ABI's range
    InvalidParameter {
        param: String,
        value: String,
        function: String,
    },
    /// The host context panicked
    HostPanicked { message: String, function: String },
}

impl fmt::Display for HostCallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostCallbackError::ContextNotFound { handle, function } => {
                write!(f, "[{}] Host context not found for handle {}", function, handle)
            }
            HostCallbackError::NullPointer { param, function } => {
                write!(f, "[{}] Null pointer passed for '{}'", function, param)
            }
            HostCallbackError::InvalidParameter {
                param,
                value,
                function,
            } => {
                write!(
                    f,
                    "[{}] Invalid parameter '{}' with value '{}'",
                    function, param, value
                )
            }
            HostCallbackError::HostPanicked { message, function } => {
                write!(f, "[{}] Host context panicked: {}", function, message)
            }
        }
    }
}

impl std::error::Error for HostCallbackError {}

/// Helper function to create context not found error
pub fn context_not_found_error(handle: usize, function: &str) -> HostCallbackError {
    HostCallbackError::ContextNotFound {
        handle,
        function: function.to_string(),
    }
}

/// Helper function to create null pointer error
pub fn null_pointer_error(param: &str, function: &str) -> HostCallbackError {
    HostCallbackError::NullPointer {
        param: param.to_string(),
        function: function.to_string(),
    }
}

/// Helper function to create invalid parameter error
pub fn invalid_parameter_error(param: &str, value: &str, function: &str) -> HostCallbackError {
    HostCallbackError::InvalidParameter {
        param: param.to_string(),
        value: value.to_string(),
        function: function.to_string(),
    }
}

/// Helper function to describe a caught panic payload
pub fn host_panicked_error(payload: &(dyn Any + Send), function: &str) -> HostCallbackError {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    };
    HostCallbackError::HostPanicked {
        message,
        function: function.to_string(),
    }
}

impl HostCallbackError {
    /// Get the callback name where this error occurred
    pub fn function(&self) -> &str {
        match self {
            HostCallbackError::ContextNotFound { function, .. } => function,
            HostCallbackError::NullPointer { function, .. } => function,
            HostCallbackError::InvalidParameter { function, .. } => function,
            HostCallbackError::HostPanicked { function, .. } => function,
        }
    }

    /// Get the error message
    pub fn message(&self) -> String {
        match self {
            HostCallbackError::ContextNotFound { handle, .. } => {
                format!("handle {} is not registered", handle)
            }
            HostCallbackError::NullPointer { param, .. } => format!("'{}' is null", param),
            HostCallbackError::InvalidParameter { param, value, .. } => {
                format!("'{}' has invalid value '{}'", param, value)
            }
            HostCallbackError::HostPanicked { message, .. } => message.clone(),
        }
    }

    /// Get error category as string
    pub fn category(&self) -> &'static str {
        match self {
            HostCallbackError::ContextNotFound { .. } => "context",
            HostCallbackError::NullPointer { .. } => "parameter",
            HostCallbackError::InvalidParameter { .. } => "parameter",
            HostCallbackError::HostPanicked { .. } => "host",
        }
    }
}
