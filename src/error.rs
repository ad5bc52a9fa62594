// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Error types for the streamer.
//!
//! Every failure belongs to one of four categories ([`Category`]):
//! configuration errors caught at construction or open time, resource
//! exhaustion (pool or encoder ring starvation), device I/O failures and
//! RTSP protocol-level failures. The pipeline decides per call site which
//! failures are fatal; the category is informational (logging, tests).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Bad parameters or out-of-order calls, caught at construction/open.
    Configuration,
    /// Pool or encoder buffer starvation.
    ResourceExhaustion,
    /// Capture, encode or transmit device failures.
    DeviceIo,
    /// RTSP session-level failures.
    Protocol,
}

#[derive(Debug, Error)]
pub enum Error {
    // Configuration
    #[error("unsupported option: {0}")]
    Unsupported(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("frame {width}x{height} needs {required} bytes but the block holds {capacity}")]
    FrameTooLarge {
        width: u32,
        height: u32,
        required: usize,
        capacity: usize,
    },

    #[error("frame is not DMA-backed; the hardware encoder requires pool blocks")]
    FrameNotDmaBacked,

    #[error("pixel order mismatch: frame is {frame} but the channel expects {channel}")]
    PixelFormatMismatch { frame: String, channel: String },

    #[error("session not ready: {0}")]
    SessionNotReady(&'static str),

    #[error("a packet from the previous poll has not been released")]
    PacketOutstanding,

    #[error("packet does not belong to this encoder")]
    ForeignPacket,

    #[error("input tensor {index} expects {expected} bytes, got {actual}")]
    InputSizeMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("tensor index {0} out of range")]
    TensorIndex(usize),

    #[error("startup command {command:?} exited with status {status}")]
    ServiceStop { command: String, status: i32 },

    #[error("vendor library unavailable: {0}")]
    VendorLibrary(String),

    // Resource exhaustion
    #[error("DMA pool allocation failed ({count} x {size} bytes)")]
    PoolAllocation { size: usize, count: usize },

    #[error("pool has no free blocks")]
    OutOfBlocks,

    #[error("pool has been destroyed")]
    PoolNotReady,

    #[error("encoder stream ring exhausted after {0} consecutive release failures")]
    StreamRingExhausted(u32),

    // Device I/O
    #[error("failed to open capture device {device}: {reason}")]
    DeviceOpen { device: String, reason: String },

    #[error("capture failed: {0}")]
    CaptureFailed(String),

    #[error("MPI system init failed: {0:#x}")]
    MpiInit(i32),

    #[error("failed to create encoder channel {channel}: {code:#x}")]
    ChannelCreate { channel: i32, code: i32 },

    #[error("failed to start frame reception on channel {channel}: {code:#x}")]
    ReceiveStart { channel: i32, code: i32 },

    #[error("encoder rejected frame: {0:#x}")]
    EncodeSubmit(i32),

    #[error("failed to retrieve encoded stream: {0:#x}")]
    StreamPoll(i32),

    #[error("failed to release encoded stream: {0:#x}")]
    StreamRelease(i32),

    #[error("NPU runtime call failed: {0}")]
    Npu(i32),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    // Protocol
    #[error("RTSP server create failed on port {0}")]
    ServerCreate(u16),

    #[error("RTSP session create failed for path {0:?}")]
    SessionCreate(String),

    #[error("RTSP codec configuration failed: {0}")]
    CodecConfig(i32),

    #[error("RTSP timestamp sync failed: {0}")]
    TimestampSync(i32),

    #[error("RTSP transmit failed: {0}")]
    Transmit(i32),
}

impl Error {
    /// The failure class this error belongs to.
    pub fn category(&self) -> Category {
        use Error::*;
        match self {
            Unsupported(_)
            | InvalidConfig(_)
            | FrameTooLarge { .. }
            | FrameNotDmaBacked
            | PixelFormatMismatch { .. }
            | SessionNotReady(_)
            | PacketOutstanding
            | ForeignPacket
            | InputSizeMismatch { .. }
            | TensorIndex(_)
            | ServiceStop { .. }
            | VendorLibrary(_) => Category::Configuration,

            PoolAllocation { .. } | OutOfBlocks | PoolNotReady | StreamRingExhausted(_) => {
                Category::ResourceExhaustion
            }

            DeviceOpen { .. }
            | CaptureFailed(_)
            | MpiInit(_)
            | ChannelCreate { .. }
            | ReceiveStart { .. }
            | EncodeSubmit(_)
            | StreamPoll(_)
            | StreamRelease(_)
            | Npu(_)
            | Io(_) => Category::DeviceIo,

            ServerCreate(_) | SessionCreate(_) | CodecConfig(_) | TimestampSync(_)
            | Transmit(_) => Category::Protocol,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(
            Error::SessionNotReady("codec").category(),
            Category::Configuration
        );
        assert_eq!(Error::OutOfBlocks.category(), Category::ResourceExhaustion);
        assert_eq!(
            Error::CaptureFailed("empty frame".into()).category(),
            Category::DeviceIo
        );
        assert_eq!(Error::Transmit(-1).category(), Category::Protocol);
    }
}
