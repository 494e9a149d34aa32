// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Account Related Host Functions
//!
//! - [`account_exists`] - Whether an account exists (default `false`)
//! - [`get_balance`] - Balance as a big-endian word (default zero)
//! - [`access_account`] - Warm/cold tracking (default cold)

use super::with_host;
use crate::qrvmc::ffi;
use crate::qrvmc::types::AccessStatus;
use crate::qrvmc::utils::read_address;

pub(crate) unsafe extern "C" fn account_exists(
    context: *mut ffi::qrvmc_host_context,
    address: *const ffi::qrvmc_address,
) -> bool {
    with_host(context, "account_exists", false, |host| {
        let address = read_address(address, "address", "account_exists")?;
        Ok(host.account_exists(&address))
    })
}

pub(crate) unsafe extern "C" fn get_balance(
    context: *mut ffi::qrvmc_host_context,
    address: *const ffi::qrvmc_address,
) -> ffi::qrvmc_uint256be {
    with_host(context, "get_balance", ffi::qrvmc_uint256be::default(), |host| {
        let address = read_address(address, "address", "get_balance")?;
        Ok(host.get_balance(&address).into())
    })
}

pub(crate) unsafe extern "C" fn access_account(
    context: *mut ffi::qrvmc_host_context,
    address: *const ffi::qrvmc_address,
) -> ffi::qrvmc_access_status {
    with_host(context, "access_account", AccessStatus::Cold.raw(), |host| {
        let address = read_address(address, "address", "access_account")?;
        Ok(host.access_account(&address).raw())
    })
}
