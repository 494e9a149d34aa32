// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Host Context Registry
//!
//! The ABI hands the VM an opaque `qrvmc_host_context*` that is passed back
//! verbatim to every callback. A Rust trait object cannot travel through that
//! scalar, so the binding passes an integer handle instead and keeps a
//! process-wide table from handles to the contexts of in-flight executions.
//!
//! This is the one piece of global mutable state in the crate. It starts
//! empty, is created on first use and lives until process exit.
//!
//! Handles come from a monotonically increasing counter starting at 1, so a
//! live handle is never the null pointer and never collides with the handle of
//! another in-flight execution. Every operation takes the same mutex; the
//! critical sections are single map operations and the lock is never held
//! while native code runs.

use crate::qrvmc::traits::HostContext;
use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

/// A registered host context with its lifetime erased.
///
/// Only valid while the [`Registration`] that produced it is alive.
#[derive(Clone, Copy, Debug)]
pub struct ContextRef(NonNull<dyn HostContext>);

// The pointer is only dereferenced on the thread running the owning execution.
unsafe impl Send for ContextRef {}

impl ContextRef {
    /// # Safety
    /// The registration this reference was resolved from must still be alive,
    /// which holds for callbacks invoked during the owning `execute` call.
    pub(crate) unsafe fn get<'a>(self) -> &'a dyn HostContext {
        self.0.as_ref()
    }

    pub fn as_ptr(self) -> *const dyn HostContext {
        self.0.as_ptr()
    }
}

struct Entry {
    context: ContextRef,
    // First panic raised by the host context while serving a callback
    panic: Option<Box<dyn Any + Send>>,
}

struct Inner {
    next_handle: usize,
    entries: HashMap<usize, Entry>,
}

/// Thread-safe table of in-flight host contexts.
pub struct HostContextRegistry {
    inner: Mutex<Inner>,
}

impl Default for HostContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HostContextRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_handle: 1,
                entries: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Entries stay consistent even if a holder panicked; each critical
        // section is a single map operation.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `context` under a fresh handle.
    ///
    /// The entry is removed when the returned guard is dropped, on every exit
    /// path including unwinding.
    pub fn register<'r, 'c>(&'r self, context: &'c dyn HostContext) -> Registration<'r, 'c> {
        let ptr: NonNull<dyn HostContext + 'c> = NonNull::from(context);
        // SAFETY: only the lifetime bound changes. The guard below keeps 'c
        // borrowed and removes the entry before the borrow ends.
        let ptr: NonNull<dyn HostContext + 'static> = unsafe { std::mem::transmute(ptr) };

        let mut inner = self.lock();
        let handle = inner.next_handle;
        inner.next_handle += 1;
        inner.entries.insert(
            handle,
            Entry {
                context: ContextRef(ptr),
                panic: None,
            },
        );
        drop(inner);

        log::trace!("registered host context handle {}", handle);
        Registration {
            registry: self,
            handle,
            _context: PhantomData,
        }
    }

    /// Look up the context registered under `handle`.
    pub fn resolve(&self, handle: usize) -> Option<ContextRef> {
        self.lock().entries.get(&handle).map(|entry| entry.context)
    }

    /// Remove the entry for `handle`. Returns false if it was not registered.
    pub fn unregister(&self, handle: usize) -> bool {
        let removed = self.lock().entries.remove(&handle).is_some();
        if removed {
            log::trace!("unregistered host context handle {}", handle);
        }
        removed
    }

    /// Keep the first panic payload raised while serving `handle`.
    pub(crate) fn record_panic(&self, handle: usize, payload: Box<dyn Any + Send>) {
        if let Some(entry) = self.lock().entries.get_mut(&handle) {
            if entry.panic.is_none() {
                entry.panic = Some(payload);
            }
        }
    }

    pub(crate) fn take_panic(&self, handle: usize) -> Option<Box<dyn Any + Send>> {
        self.lock()
            .entries
            .get_mut(&handle)
            .and_then(|entry| entry.panic.take())
    }

    /// Number of live registrations
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The process-wide registry used by `execute` and the callback table.
pub fn global() -> &'static HostContextRegistry {
    static REGISTRY: OnceLock<HostContextRegistry> = OnceLock::new();
    REGISTRY.get_or_init(HostContextRegistry::new)
}

/// Scope guard for one registry entry.
pub struct Registration<'r, 'c> {
    registry: &'r HostContextRegistry,
    handle: usize,
    _context: PhantomData<&'c dyn HostContext>,
}

impl Registration<'_, '_> {
    pub fn handle(&self) -> usize {
        self.handle
    }

    /// Take the panic recorded for this registration, if any.
    pub(crate) fn take_panic(&self) -> Option<Box<dyn Any + Send>> {
        self.registry.take_panic(self.handle)
    }
}

impl Drop for Registration<'_, '_> {
    fn drop(&mut self) {
        self.registry.unregister(self.handle);
    }
}
