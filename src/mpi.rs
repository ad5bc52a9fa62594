// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Rockit MPI system lifetime guard.
//!
//! Loads `librockit.so` and brings the MPI core up exactly once; the pool
//! and the encoder channel share the instance through an `Arc`. Dropping
//! the last reference shuts the MPI core down, which must happen after
//! every pool and channel built on top of it is gone, so those components
//! hold their own clone of the `Arc`.

use crate::error::{Error, Result};
use rockit_sys::mpi::{rockit, ROCKIT_LIBRARY};
use rockit_sys::RK_SUCCESS;
use std::sync::Arc;
use tracing::debug;

pub struct MpiSystem {
    lib: rockit,
}

impl MpiSystem {
    /// Load the vendor library and initialize the MPI core.
    pub fn init() -> Result<Arc<Self>> {
        let lib = unsafe { rockit::new(ROCKIT_LIBRARY) }
            .map_err(|e| Error::VendorLibrary(e.to_string()))?;

        let ret = unsafe { lib.RK_MPI_SYS_Init() };
        if ret != RK_SUCCESS {
            return Err(Error::MpiInit(ret));
        }

        debug!("MPI system initialized");
        Ok(Arc::new(Self { lib }))
    }

    pub(crate) fn lib(&self) -> &rockit {
        &self.lib
    }
}

impl Drop for MpiSystem {
    fn drop(&mut self) {
        unsafe { self.lib.RK_MPI_SYS_Exit() };
        debug!("MPI system exited");
    }
}
