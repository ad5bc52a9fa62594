// SPDX-License-Identifier: AGPL-3.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Low-level FFI bindings for the Rockchip media SDK as shipped on the
//! RV1106/RV1103 board support packages.
//!
//! Three vendor libraries are covered, each loaded at runtime with
//! [`libloading`] so this crate carries no link-time dependency and builds
//! on any host:
//!
//! - [`mpi`] — `librockit.so`: the Rockit MPI (media buffer pools and the
//!   VENC hardware encoder channels).
//! - [`rtsp`] — `librtsp.so`: the SDK's reference RTSP server.
//! - [`rknn`] — `librknnmrt.so`: the RKNN NPU runtime.
//!
//! The bindings follow bindgen's dynamic-loading output: one struct per
//! library owning the [`libloading::Library`] and the resolved function
//! pointers, with one unsafe method per C entry point. Struct and constant
//! names mirror the SDK headers verbatim. Only the declarations exercised
//! by the `edgefirst-rtsp` crate are bound.
//!
//! # Safety
//!
//! Every method is `unsafe`: the caller is responsible for upholding the
//! SDK's handle-lifetime rules (blocks released exactly once, channels
//! destroyed after StopRecvFrame, sessions deleted before the demo handle).

#![allow(non_camel_case_types, non_snake_case, non_upper_case_globals)]

pub mod mpi;
pub mod rknn;
pub mod rtsp;

/// Rockchip basic type aliases from `rk_type.h`.
pub type RK_S8 = i8;
pub type RK_U8 = u8;
pub type RK_S32 = i32;
pub type RK_U32 = u32;
pub type RK_S64 = i64;
pub type RK_U64 = u64;
pub type RK_FLOAT = f32;
pub type RK_BOOL = RK_S32;

pub const RK_TRUE: RK_BOOL = 1;
pub const RK_FALSE: RK_BOOL = 0;

pub const RK_SUCCESS: RK_S32 = 0;
pub const RK_FAILURE: RK_S32 = -1;
