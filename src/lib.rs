// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # EdgeFirst RTSP Streamer Library
//!
//! This library implements a zero-copy camera-to-RTSP video pipeline for
//! Rockchip RV1106-class SoCs: frames are captured straight into a DMA
//! pool block, handed by reference to the hardware H.264 encoder, and the
//! encoded access units are served over RTSP, all from one synchronous
//! polling loop.
//!
//! ## Features
//!
//! - **DMA Buffer Pool**: owning block handles over the vendor MB pool
//!   (or host memory for development), making use-after-release and
//!   double-release unrepresentable.
//! - **Hardware Encoding**: H.264/H.265 CBR encoding through the Rockit
//!   VENC API with strict packet acquire/release discipline.
//! - **RTSP Serving**: one server, one session, timestamp-synced H.264
//!   delivery via the SDK's reference RTSP library.
//! - **NPU Inference**: an independent RKNN model boundary with zero-copy
//!   IO memory and quantization helpers.
//!
//! ## Example
//!
//! ```no_run
//! use edgefirst_rtsp::frame::PixelFormat;
//! use edgefirst_rtsp::pool::MemoryPool;
//! use edgefirst_rtsp::source::{FrameSource, TestPatternSource};
//!
//! # fn main() -> edgefirst_rtsp::Result<()> {
//! // One pool block, rewritten in place every tick (zero-copy).
//! let pool = MemoryPool::with_heap(720 * 480 * 3, 1)?;
//! let mut source = TestPatternSource::new(&pool, 720, 480, PixelFormat::Bgr888)?;
//! source.capture_next()?;
//! assert_eq!(source.frame().index(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Requirements
//!
//! - **Target**: Rockchip RV1106/RV1103 with the vendor `librockit.so`,
//!   `librtsp.so` and `librknnmrt.so` runtime libraries (feature
//!   `rockchip`; the libraries are loaded at runtime, so the crate builds
//!   everywhere).
//! - **Host**: the heap pool backend and the test pattern source keep the
//!   full pipeline logic runnable without any vendor library.
//!
//! ## Safety
//!
//! FFI interactions with the vendor SDK are isolated in the `rockit-sys`
//! bindings and the thin wrapper modules; everything above the wrappers
//! is safe code, with buffer lifetimes enforced by ownership.

pub mod args;
pub mod clock;
pub mod convert;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod npu;
pub mod overlay;
pub mod pipeline;
pub mod pool;
pub mod rtsp;
pub mod source;

#[cfg(feature = "rockchip")]
pub mod app;
#[cfg(feature = "rockchip")]
pub mod mpi;
#[cfg(feature = "rockchip")]
pub mod venc;

#[cfg(feature = "v4l2")]
pub mod v4l2;

pub use error::{Category, Error, Result};
