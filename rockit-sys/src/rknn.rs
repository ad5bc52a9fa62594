// SPDX-License-Identifier: AGPL-3.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Bindings for the RKNN NPU runtime (`rknn_api.h`, `librknnmrt.so`),
//! covering the zero-copy IO path: query tensor attributes, allocate
//! runtime-owned tensor memory and bind it with `rknn_set_io_mem`.

use libloading::Library;
use std::ffi::{c_char, c_int, c_uint, c_void, OsStr};

/// Default library name on the target root filesystem.
pub const RKNN_LIBRARY: &str = "librknnmrt.so";

pub type rknn_context = u64;

pub const RKNN_SUCC: c_int = 0;
pub const RKNN_ERR_FAIL: c_int = -1;
pub const RKNN_ERR_TIMEOUT: c_int = -2;
pub const RKNN_ERR_DEVICE_UNAVAILABLE: c_int = -3;
pub const RKNN_ERR_MALLOC_FAIL: c_int = -4;
pub const RKNN_ERR_PARAM_INVALID: c_int = -5;
pub const RKNN_ERR_MODEL_INVALID: c_int = -6;
pub const RKNN_ERR_CTX_INVALID: c_int = -7;
pub const RKNN_ERR_INPUT_INVALID: c_int = -8;
pub const RKNN_ERR_OUTPUT_INVALID: c_int = -9;

pub const RKNN_MAX_DIMS: usize = 16;
pub const RKNN_MAX_NAME_LEN: usize = 256;

pub type rknn_query_cmd = c_uint;
pub const RKNN_QUERY_IN_OUT_NUM: rknn_query_cmd = 0;
pub const RKNN_QUERY_INPUT_ATTR: rknn_query_cmd = 1;
pub const RKNN_QUERY_OUTPUT_ATTR: rknn_query_cmd = 2;
pub const RKNN_QUERY_PERF_DETAIL: rknn_query_cmd = 3;
pub const RKNN_QUERY_PERF_RUN: rknn_query_cmd = 4;
pub const RKNN_QUERY_SDK_VERSION: rknn_query_cmd = 5;
pub const RKNN_QUERY_NATIVE_INPUT_ATTR: rknn_query_cmd = 8;
pub const RKNN_QUERY_NATIVE_OUTPUT_ATTR: rknn_query_cmd = 9;

pub type rknn_tensor_type = c_uint;
pub const RKNN_TENSOR_FLOAT32: rknn_tensor_type = 0;
pub const RKNN_TENSOR_FLOAT16: rknn_tensor_type = 1;
pub const RKNN_TENSOR_INT8: rknn_tensor_type = 2;
pub const RKNN_TENSOR_UINT8: rknn_tensor_type = 3;
pub const RKNN_TENSOR_INT16: rknn_tensor_type = 4;
pub const RKNN_TENSOR_UINT16: rknn_tensor_type = 5;
pub const RKNN_TENSOR_INT32: rknn_tensor_type = 6;
pub const RKNN_TENSOR_UINT32: rknn_tensor_type = 7;
pub const RKNN_TENSOR_INT64: rknn_tensor_type = 8;
pub const RKNN_TENSOR_BOOL: rknn_tensor_type = 9;

pub type rknn_tensor_format = c_uint;
pub const RKNN_TENSOR_NCHW: rknn_tensor_format = 0;
pub const RKNN_TENSOR_NHWC: rknn_tensor_format = 1;
pub const RKNN_TENSOR_NC1HWC2: rknn_tensor_format = 2;
pub const RKNN_TENSOR_UNDEFINED: rknn_tensor_format = 3;

pub type rknn_tensor_qnt_type = c_uint;
pub const RKNN_TENSOR_QNT_NONE: rknn_tensor_qnt_type = 0;
pub const RKNN_TENSOR_QNT_DFP: rknn_tensor_qnt_type = 1;
pub const RKNN_TENSOR_QNT_AFFINE_ASYMMETRIC: rknn_tensor_qnt_type = 2;

#[repr(C)]
#[derive(Copy, Clone)]
pub struct rknn_tensor_attr {
    pub index: u32,
    pub n_dims: u32,
    pub dims: [u32; RKNN_MAX_DIMS],
    pub name: [c_char; RKNN_MAX_NAME_LEN],
    pub n_elems: u32,
    pub size: u32,
    pub fmt: rknn_tensor_format,
    pub type_: rknn_tensor_type,
    pub qnt_type: rknn_tensor_qnt_type,
    pub fl: i8,
    pub zp: i32,
    pub scale: f32,
    pub w_stride: u32,
    pub size_with_stride: u32,
    pub pass_through: u8,
    pub h_stride: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct rknn_input_output_num {
    pub n_input: u32,
    pub n_output: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct rknn_tensor_mem {
    pub virt_addr: *mut c_void,
    pub phys_addr: u64,
    pub fd: i32,
    pub offset: i32,
    pub size: u32,
    pub flags: u32,
    pub priv_data: *mut c_void,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct rknn_sdk_version {
    pub api_version: [c_char; 256],
    pub drv_version: [c_char; 256],
}

/// Dynamically loaded `librknnmrt.so`.
pub struct rknn {
    __library: Library,
    rknn_init: unsafe extern "C" fn(*mut rknn_context, *mut c_void, u32, u32, *mut c_void) -> c_int,
    rknn_destroy: unsafe extern "C" fn(rknn_context) -> c_int,
    rknn_query: unsafe extern "C" fn(rknn_context, rknn_query_cmd, *mut c_void, u32) -> c_int,
    rknn_run: unsafe extern "C" fn(rknn_context, *mut c_void) -> c_int,
    rknn_create_mem: unsafe extern "C" fn(rknn_context, u32) -> *mut rknn_tensor_mem,
    rknn_destroy_mem: unsafe extern "C" fn(rknn_context, *mut rknn_tensor_mem) -> c_int,
    rknn_set_io_mem:
        unsafe extern "C" fn(rknn_context, *mut rknn_tensor_mem, *mut rknn_tensor_attr) -> c_int,
}

impl rknn {
    /// Load the library and resolve every bound symbol.
    ///
    /// # Safety
    ///
    /// The file at `path` must be the RKNN runtime matching the
    /// declarations in this module.
    pub unsafe fn new<P: AsRef<OsStr>>(path: P) -> Result<Self, libloading::Error> {
        let __library = Library::new(path)?;
        Ok(Self {
            rknn_init: *__library.get(b"rknn_init\0")?,
            rknn_destroy: *__library.get(b"rknn_destroy\0")?,
            rknn_query: *__library.get(b"rknn_query\0")?,
            rknn_run: *__library.get(b"rknn_run\0")?,
            rknn_create_mem: *__library.get(b"rknn_create_mem\0")?,
            rknn_destroy_mem: *__library.get(b"rknn_destroy_mem\0")?,
            rknn_set_io_mem: *__library.get(b"rknn_set_io_mem\0")?,
            __library,
        })
    }

    pub unsafe fn rknn_init(
        &self,
        context: *mut rknn_context,
        model: *mut c_void,
        size: u32,
        flag: u32,
        extend: *mut c_void,
    ) -> c_int {
        (self.rknn_init)(context, model, size, flag, extend)
    }

    pub unsafe fn rknn_destroy(&self, context: rknn_context) -> c_int {
        (self.rknn_destroy)(context)
    }

    pub unsafe fn rknn_query(
        &self,
        context: rknn_context,
        cmd: rknn_query_cmd,
        info: *mut c_void,
        size: u32,
    ) -> c_int {
        (self.rknn_query)(context, cmd, info, size)
    }

    pub unsafe fn rknn_run(&self, context: rknn_context, extend: *mut c_void) -> c_int {
        (self.rknn_run)(context, extend)
    }

    pub unsafe fn rknn_create_mem(&self, context: rknn_context, size: u32) -> *mut rknn_tensor_mem {
        (self.rknn_create_mem)(context, size)
    }

    pub unsafe fn rknn_destroy_mem(
        &self,
        context: rknn_context,
        mem: *mut rknn_tensor_mem,
    ) -> c_int {
        (self.rknn_destroy_mem)(context, mem)
    }

    pub unsafe fn rknn_set_io_mem(
        &self,
        context: rknn_context,
        mem: *mut rknn_tensor_mem,
        attr: *mut rknn_tensor_attr,
    ) -> c_int {
        (self.rknn_set_io_mem)(context, mem, attr)
    }
}

impl std::fmt::Debug for rknn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("rknn").finish_non_exhaustive()
    }
}

unsafe impl Send for rknn {}
unsafe impl Sync for rknn {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tensor_attr_is_zeroable() {
        let attr: rknn_tensor_attr = unsafe { std::mem::zeroed() };
        assert_eq!(attr.n_dims, 0);
        assert_eq!(attr.qnt_type, RKNN_TENSOR_QNT_NONE);
    }
}
