// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Frame descriptor: one pool block plus the metadata the encoder channel
//! needs (geometry, pixel order, frame index and presentation timestamp).

use crate::error::{Error, Result};
use crate::pool::MemoryBlock;
use core::fmt;

/// 24-bit pixel channel ordering at the capture/encode boundary.
///
/// The capture source and the encoder channel must agree on this or the
/// stream comes out with red and blue swapped, so it is carried explicitly
/// on both ends and checked at submit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Bgr888,
    Rgb888,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        3
    }

    #[cfg(feature = "rockchip")]
    pub(crate) fn to_rk(self) -> rockit_sys::mpi::PIXEL_FORMAT_E {
        match self {
            PixelFormat::Bgr888 => rockit_sys::mpi::RK_FMT_BGR888,
            PixelFormat::Rgb888 => rockit_sys::mpi::RK_FMT_RGB888,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PixelFormat::Bgr888 => write!(f, "BGR888"),
            PixelFormat::Rgb888 => write!(f, "RGB888"),
        }
    }
}

/// A captured video frame borrowing exactly one pool block.
///
/// The block is owned by the frame for the frame's whole lifetime; capture
/// sources reuse one frame tick over tick, rewriting the same block (the
/// zero-copy contract). `stamp` advances the frame index and assigns a
/// strictly increasing presentation timestamp.
pub struct Frame {
    block: MemoryBlock,
    width: u32,
    height: u32,
    vir_width: u32,
    vir_height: u32,
    format: PixelFormat,
    index: u32,
    pts: u64,
}

impl Frame {
    /// Wrap `block` as a `width` x `height` frame.
    ///
    /// Fails with a configuration error when the pixel data would not fit
    /// the block.
    pub fn new(block: MemoryBlock, width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        let required = width as usize * height as usize * format.bytes_per_pixel();
        if required == 0 {
            return Err(Error::InvalidConfig(
                "frame dimensions must be non-zero".into(),
            ));
        }
        if required > block.capacity() {
            return Err(Error::FrameTooLarge {
                width,
                height,
                required,
                capacity: block.capacity(),
            });
        }
        Ok(Self {
            block,
            width,
            height,
            vir_width: width,
            vir_height: height,
            format,
            index: 0,
            pts: 0,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Aligned (virtual) width as seen by the encoder.
    pub fn vir_width(&self) -> u32 {
        self.vir_width
    }

    pub fn vir_height(&self) -> u32 {
        self.vir_height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Monotonically increasing frame counter, starting at 1 for the
    /// first stamped frame.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Presentation timestamp in monotonic microseconds.
    pub fn pts(&self) -> u64 {
        self.pts
    }

    pub fn block(&self) -> &MemoryBlock {
        &self.block
    }

    /// Pixel bytes, truncated to the visible `width * height` area.
    pub fn pixels(&self) -> &[u8] {
        let len = self.width as usize * self.height as usize * self.format.bytes_per_pixel();
        &self.block.as_slice()[..len]
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        let len = self.width as usize * self.height as usize * self.format.bytes_per_pixel();
        &mut self.block.as_mut_slice()[..len]
    }

    /// Tag the frame with the capture instant and advance the index.
    ///
    /// PTS is clamped to one past the previous value when the clock has
    /// not advanced a full microsecond, keeping the sequence strictly
    /// increasing.
    pub fn stamp(&mut self, now_us: u64) {
        self.pts = if self.index == 0 {
            now_us
        } else {
            now_us.max(self.pts + 1)
        };
        self.index = self.index.wrapping_add(1);
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{} {} index:{} pts:{}",
            self.width, self.height, self.format, self.index, self.pts
        )
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("vir_width", &self.vir_width)
            .field("vir_height", &self.vir_height)
            .field("format", &self.format)
            .field("index", &self.index)
            .field("pts", &self.pts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::MemoryPool;

    fn block(size: usize) -> MemoryBlock {
        MemoryPool::with_heap(size, 1)
            .unwrap()
            .acquire_block(true)
            .unwrap()
    }

    #[test]
    fn rejects_oversized_frame() {
        let err = Frame::new(block(16), 4, 4, PixelFormat::Bgr888).unwrap_err();
        assert!(matches!(err, Error::FrameTooLarge { required: 48, .. }));
    }

    #[test]
    fn pixels_cover_visible_area() {
        let frame = Frame::new(block(64), 4, 4, PixelFormat::Rgb888).unwrap();
        assert_eq!(frame.pixels().len(), 48);
    }

    #[test]
    fn stamp_is_strictly_monotonic() {
        let mut frame = Frame::new(block(12), 2, 2, PixelFormat::Bgr888).unwrap();
        frame.stamp(1000);
        assert_eq!((frame.index(), frame.pts()), (1, 1000));
        // Clock stalled: PTS still advances.
        frame.stamp(1000);
        assert_eq!((frame.index(), frame.pts()), (2, 1001));
        frame.stamp(5000);
        assert_eq!((frame.index(), frame.pts()), (3, 5000));
    }

    #[test]
    fn writes_land_in_the_block() {
        let mut frame = Frame::new(block(12), 2, 2, PixelFormat::Bgr888).unwrap();
        let addr = frame.block().virtual_address();
        frame.pixels_mut()[0] = 0xAB;
        assert_eq!(frame.block().virtual_address(), addr);
        assert_eq!(frame.block().as_slice()[0], 0xAB);
    }
}
