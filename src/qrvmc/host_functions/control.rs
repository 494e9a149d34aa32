// Copyright (C) 2021-2025 the QRVMC authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Execution Control Host Functions

use super::with_host;
use crate::qrvmc::ffi;
use crate::qrvmc::utils::read_address;

/// Self-destruct callback
///
/// Returns true only the first time `address` is registered for destruction.
pub(crate) unsafe extern "C" fn selfdestruct(
    context: *mut ffi::qrvmc_host_context,
    address: *const ffi::qrvmc_address,
    beneficiary: *const ffi::qrvmc_address,
) -> bool {
    with_host(context, "selfdestruct", false, |host| {
        let address = read_address(address, "address", "selfdestruct")?;
        let beneficiary = read_address(beneficiary, "beneficiary", "selfdestruct")?;
        Ok(host.selfdestruct(&address, &beneficiary))
    })
}
