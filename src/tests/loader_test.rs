// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Unit Tests for the Loader
//!
//! A mock opener stands in for the system loader: it "opens" exactly one path
//! and exports one create function under one symbol name.

use super::init_logger;
use super::stub_vm;
use crate::qrvmc::ffi;
use crate::qrvmc::loader::{
    load_and_configure_with, load_with, DynamicLibrary, LibraryOpener, LoaderError,
    LoaderErrorCode,
};
use std::sync::Arc;

struct MockLibrary {
    symbol: &'static str,
    create: ffi::qrvmc_create_fn,
}

impl DynamicLibrary for MockLibrary {
    unsafe fn create_fn(&self, name: &str) -> Option<ffi::qrvmc_create_fn> {
        (name == self.symbol).then_some(self.create)
    }
}

struct MockOpener {
    path: Option<&'static str>,
    library: Arc<MockLibrary>,
}

impl MockOpener {
    fn new(
        path: Option<&'static str>,
        symbol: &'static str,
        create: ffi::qrvmc_create_fn,
    ) -> Self {
        Self {
            path,
            library: Arc::new(MockLibrary { symbol, create }),
        }
    }
}

impl LibraryOpener for MockOpener {
    fn open(&self, path: &str) -> Result<Arc<dyn DynamicLibrary>, Option<String>> {
        match self.path {
            Some(expected) if expected == path => {
                let library: Arc<dyn DynamicLibrary> = self.library.clone();
                Ok(library)
            }
            Some(_) => Err(Some("cannot load library".to_string())),
            None => Err(None),
        }
    }
}

fn expect_error(result: Result<crate::qrvmc::vm::Vm, LoaderError>) -> LoaderError {
    match result {
        Ok(vm) => panic!("unexpected VM {:?}", vm),
        Err(error) => error,
    }
}

#[test]
fn test_load_by_derived_name() {
    init_logger();
    stub_vm::reset();
    for path in [
        "./aaa.qrvm",
        "aaa.qrvm",
        "unittests/libaaa.so",
        "./aaa.qrvm.0.99",
        "aaa.tar.gz.so",
        "unittests/aaa.x.y.z.so",
        "unittests/aaa.1.lib",
        "unittests/aaa.extextextextextextextextextextextextextextextextext",
    ] {
        let opener = MockOpener::new(Some(path), "qrvmc_create_aaa", stub_vm::create_barebone);
        let vm = load_with(&opener, path).expect(path);
        assert_eq!(vm.name(), "vm_barebone");
    }
    assert_eq!(stub_vm::created(), stub_vm::destroyed());

    let opener = MockOpener::new(
        Some("unittests/eee-bbb.dll"),
        "qrvmc_create_eee_bbb",
        stub_vm::create_barebone,
    );
    assert!(load_with(&opener, "unittests/eee-bbb.dll").is_ok());
}

#[test]
fn test_load_default_symbol() {
    stub_vm::reset();
    let opener = MockOpener::new(Some("default.qrvmc"), "qrvmc_create", stub_vm::create_executor);
    let vm = load_with(&opener, "default.qrvmc").unwrap();
    assert_eq!(vm.name(), "stub_vm");
}

#[test]
fn test_load_symbol_not_found() {
    stub_vm::reset();
    for path in [
        "libaaa1.so",
        "eee2.so",
        "libeee3.x",
        "eee4",
        "_",
        "lib_.so",
        "unittests/double-prefix-aaa.qrvm",
        "unittests/double_prefix_aaa.qrvm",
    ] {
        let opener = MockOpener::new(Some(path), "qrvmc_create_aaa", stub_vm::create_barebone);
        let error = expect_error(load_with(&opener, path));
        assert_eq!(error.code(), LoaderErrorCode::SymbolNotFound);
        assert_eq!(
            error.message(),
            Some(format!("QRVMC create function not found in {}", path).as_str())
        );
    }
    assert_eq!(stub_vm::created(), 0);
}

#[test]
fn test_load_cannot_open() {
    let opener = MockOpener::new(Some("other.so"), "qrvmc_create", stub_vm::create_barebone);
    let error = expect_error(load_with(&opener, "missing.so"));
    assert_eq!(error, LoaderError::CannotOpen("cannot load library".to_string()));

    // Without a system message the path is reported
    let opener = MockOpener::new(None, "qrvmc_create", stub_vm::create_barebone);
    let error = expect_error(load_with(&opener, "missing.so"));
    assert_eq!(error, LoaderError::CannotOpen("cannot open missing.so".to_string()));
}

#[test]
fn test_load_and_create_failure() {
    stub_vm::reset();
    let opener = MockOpener::new(Some("failure.vm"), "qrvmc_create", stub_vm::create_failure);
    let error = expect_error(load_with(&opener, "failure.vm"));
    assert_eq!(error.code(), LoaderErrorCode::VmCreationFailure);
    assert_eq!(error.message(), Some("creating QRVMC VM of failure.vm has failed"));
}

#[test]
fn test_load_abi_mismatch() {
    stub_vm::reset();
    let opener = MockOpener::new(Some("abi1985.vm"), "qrvmc_create", stub_vm::create_wrong_abi);
    let error = expect_error(load_with(&opener, "abi1985.vm"));
    assert_eq!(error.code(), LoaderErrorCode::AbiVersionMismatch);
    assert_eq!(
        error.message(),
        Some("QRVMC ABI version 1985 of abi1985.vm mismatches the expected version 10")
    );
    assert_eq!(stub_vm::created(), 1);
    assert_eq!(stub_vm::destroyed(), 1);
}

#[test]
fn test_configure_without_options() {
    stub_vm::reset();
    let opener = MockOpener::new(Some("path"), "qrvmc_create", stub_vm::create_with_set_option);
    let vm = load_and_configure_with(&opener, "path").unwrap();
    assert_eq!(vm.name(), "vm_with_set_option");
    assert!(stub_vm::recorded_options().is_empty());

    // A trailing comma is not an option, even for a VM without options
    let opener = MockOpener::new(Some("path"), "qrvmc_create", stub_vm::create_barebone);
    let vm = load_and_configure_with(&opener, "path,").unwrap();
    assert_eq!(vm.name(), "vm_barebone");
}

#[test]
fn test_configure_options_in_order() {
    stub_vm::reset();
    stub_vm::support_option("a", &["_a", "_c"]);
    stub_vm::support_option("b", &["_b1", "_b2"]);
    stub_vm::support_option("c", &["_c"]);
    let opener = MockOpener::new(Some("path"), "qrvmc_create", stub_vm::create_with_set_option);

    load_and_configure_with(&opener, "path,a=_a,b=_b1,c=_c,b=_b2").unwrap();
    assert_eq!(
        stub_vm::recorded_options(),
        vec![
            ("a".to_string(), "_a".to_string()),
            ("b".to_string(), "_b1".to_string()),
            ("c".to_string(), "_c".to_string()),
            ("b".to_string(), "_b2".to_string()),
        ]
    );

    stub_vm::clear_recorded_options();
    load_and_configure_with(&opener, "path,a=_a,b=_b2,a=_c,").unwrap();
    assert_eq!(stub_vm::recorded_options().len(), 3);
    assert_eq!(stub_vm::destroyed(), 2);
}

#[test]
fn test_configure_empty_values_and_names() {
    stub_vm::reset();
    stub_vm::support_option("flag", &[""]);
    stub_vm::support_option("e", &[""]);
    stub_vm::support_option("", &["", "xxx"]);
    let opener = MockOpener::new(Some("path"), "qrvmc_create", stub_vm::create_with_set_option);

    let vm = load_and_configure_with(&opener, "path,flag,e=,flag=,e").unwrap();
    let recorded = stub_vm::recorded_options();
    assert_eq!(recorded.len(), 4);
    assert!(recorded.iter().all(|(_, value)| value.is_empty()));
    assert_eq!(stub_vm::created(), 1);
    assert_eq!(stub_vm::destroyed(), 0);
    drop(vm);

    stub_vm::clear_recorded_options();
    load_and_configure_with(&opener, "path,,,=,,=xxx").unwrap();
    let recorded = stub_vm::recorded_options();
    assert_eq!(recorded.len(), 5);
    assert!(recorded.iter().all(|(name, _)| name.is_empty()));
    assert_eq!(recorded[4].1, "xxx");
}

#[test]
fn test_configure_rejected_options() {
    init_logger();
    stub_vm::reset();
    stub_vm::support_option("a", &["_a"]);
    stub_vm::support_option("c", &["_c"]);
    let opener = MockOpener::new(Some("path"), "qrvmc_create", stub_vm::create_with_set_option);

    let error = expect_error(load_and_configure_with(&opener, "path,z=1"));
    assert_eq!(error.code(), LoaderErrorCode::InvalidOptionName);
    assert_eq!(error.message(), Some("vm_with_set_option (path): unknown option 'z'"));
    assert_eq!(stub_vm::created(), stub_vm::destroyed());

    let error = expect_error(load_and_configure_with(&opener, "path,a=_a,c=_b,"));
    assert_eq!(error.code(), LoaderErrorCode::InvalidOptionValue);
    assert_eq!(
        error.message(),
        Some("vm_with_set_option (path): unsupported value '_b' for option 'c'")
    );
    assert_eq!(stub_vm::created(), stub_vm::destroyed());

    let error = expect_error(load_and_configure_with(
        &opener,
        &format!("path,{}=1", stub_vm::UNKNOWN_ERROR_OPTION),
    ));
    assert_eq!(error.code(), LoaderErrorCode::InvalidOptionValue);
    assert_eq!(
        error.message(),
        Some("vm_with_set_option (path): unknown error when setting value '1' for option 'raise_unknown'")
    );

    // Options stop at the first rejection
    stub_vm::clear_recorded_options();
    expect_error(load_and_configure_with(&opener, "path,a=_a,x=_b,c=_c"));
    assert_eq!(stub_vm::recorded_options().len(), 2);
    assert_eq!(stub_vm::created(), stub_vm::destroyed());
}

#[test]
fn test_configure_vm_without_options() {
    stub_vm::reset();
    let opener = MockOpener::new(Some("path"), "qrvmc_create", stub_vm::create_barebone);
    let error = expect_error(load_and_configure_with(&opener, "path,a=b"));
    assert_eq!(error.code(), LoaderErrorCode::InvalidOptionName);
    assert_eq!(error.message(), Some("vm_barebone (path) does not support any options"));
    assert_eq!(stub_vm::created(), 1);
    assert_eq!(stub_vm::destroyed(), 1);
}
