// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! V4L2 camera capture source.
//!
//! The camera is opened and its format negotiated before the pool exists:
//! drivers silently clamp the requested resolution, and the pool and the
//! encoder channel must be sized from what the driver actually granted.
//! [`V4l2Capture::open`] performs the negotiation; [`V4l2Capture::bind`]
//! wires the stream to a pool block once the pool is ready.
//!
//! Frames arrive as packed YUYV and are converted into the block in the
//! channel ordering the encoder expects.

use crate::clock::monotonic_us;
use crate::convert::{yuyv_to_24bit, ChannelOrder};
use crate::error::{Error, Result};
use crate::frame::{Frame, PixelFormat};
use crate::overlay::{self, FPS_TEXT_COLOR, FPS_TEXT_ORIGIN, FPS_TEXT_SCALE};
use crate::pool::MemoryPool;
use crate::source::FrameSource;
use tracing::{debug, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

/// An opened camera with its negotiated resolution, not yet streaming.
pub struct V4l2Capture {
    device: Device,
    width: u32,
    height: u32,
}

impl V4l2Capture {
    /// Open capture device `index` and request `width` x `height` YUYV.
    ///
    /// The driver may clamp the resolution; the accepted values are
    /// reported by [`width`](Self::width)/[`height`](Self::height) and a
    /// warning is logged on mismatch.
    pub fn open(index: usize, width: u32, height: u32) -> Result<Self> {
        let device = Device::new(index).map_err(|e| Error::DeviceOpen {
            device: format!("/dev/video{index}"),
            reason: e.to_string(),
        })?;

        let mut fmt = device.format().map_err(|e| Error::DeviceOpen {
            device: format!("/dev/video{index}"),
            reason: e.to_string(),
        })?;
        fmt.width = width;
        fmt.height = height;
        fmt.fourcc = FourCC::new(b"YUYV");
        let actual = device.set_format(&fmt).map_err(|e| Error::DeviceOpen {
            device: format!("/dev/video{index}"),
            reason: e.to_string(),
        })?;

        if actual.fourcc != FourCC::new(b"YUYV") {
            return Err(Error::DeviceOpen {
                device: format!("/dev/video{index}"),
                reason: format!("driver rejected YUYV, offered {}", actual.fourcc),
            });
        }
        if actual.width != width || actual.height != height {
            warn!(
                requested = format!("{width}x{height}"),
                actual = format!("{}x{}", actual.width, actual.height),
                "camera clamped the requested resolution"
            );
        }
        debug!(width = actual.width, height = actual.height, "camera open");

        Ok(Self {
            device,
            width: actual.width,
            height: actual.height,
        })
    }

    /// Accepted capture width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Accepted capture height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bind the capture output to a block from `pool` and start
    /// streaming. Call once the pool has been sized from the accepted
    /// resolution.
    pub fn bind(self, pool: &MemoryPool, format: PixelFormat) -> Result<V4l2Source> {
        let block = pool.acquire_block(true)?;
        let frame = Frame::new(block, self.width, self.height, format)?;
        let stream = MmapStream::with_buffers(&self.device, Type::VideoCapture, 4)
            .map_err(|e| Error::DeviceOpen {
                device: "v4l2 stream".into(),
                reason: e.to_string(),
            })?;
        Ok(V4l2Source {
            _device: self.device,
            stream: Some(stream),
            frame,
        })
    }
}

/// Streaming camera source writing into one pool block.
pub struct V4l2Source {
    _device: Device,
    stream: Option<MmapStream<'static>>,
    frame: Frame,
}

impl FrameSource for V4l2Source {
    fn capture_next(&mut self) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::CaptureFailed("capture stream is closed".into()))?;

        let (buf, _meta) = stream
            .next()
            .map_err(|e| Error::CaptureFailed(e.to_string()))?;

        let width = self.frame.width() as usize;
        let height = self.frame.height() as usize;
        let expected = width * height * 2;
        if buf.len() < expected {
            return Err(Error::CaptureFailed(format!(
                "short frame: {} of {expected} bytes",
                buf.len()
            )));
        }

        let order = match self.frame.format() {
            PixelFormat::Bgr888 => ChannelOrder::Bgr,
            PixelFormat::Rgb888 => ChannelOrder::Rgb,
        };
        yuyv_to_24bit(&buf[..expected], self.frame.pixels_mut(), width, height, order);
        self.frame.stamp(monotonic_us());
        Ok(())
    }

    fn frame(&self) -> &Frame {
        &self.frame
    }

    fn overlay_debug_text(&mut self, text: &str) {
        let width = self.frame.width() as usize;
        let height = self.frame.height() as usize;
        overlay::draw_text(
            self.frame.pixels_mut(),
            width,
            height,
            FPS_TEXT_ORIGIN.0,
            FPS_TEXT_ORIGIN.1,
            FPS_TEXT_SCALE,
            FPS_TEXT_COLOR,
            text,
        );
    }

    fn close(&mut self) -> Result<()> {
        if self.stream.take().is_some() {
            debug!("capture stream closed");
        }
        Ok(())
    }
}
