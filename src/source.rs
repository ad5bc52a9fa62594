// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Frame acquisition.
//!
//! A [`FrameSource`] owns the [`Frame`] (and through it the pool block) it
//! captures into; every `capture_next` rewrites the same block and stamps
//! the frame. The pipeline borrows the frame between captures to hand it
//! to the encoder, so no pixel data is ever copied between stages.

use crate::clock::monotonic_us;
use crate::error::{Error, Result};
use crate::frame::{Frame, PixelFormat};
use crate::overlay::{self, FPS_TEXT_COLOR, FPS_TEXT_ORIGIN, FPS_TEXT_SCALE};
use crate::pool::MemoryPool;

pub trait FrameSource {
    /// Capture the next frame into the bound block and stamp it. Errors
    /// are fatal to the pipeline: repeated capture failure usually means
    /// the device disconnected.
    fn capture_next(&mut self) -> Result<()>;

    /// The most recently captured frame.
    fn frame(&self) -> &Frame;

    /// Draw diagnostic text onto the captured pixels. Purely cosmetic,
    /// never fails.
    fn overlay_debug_text(&mut self, text: &str);

    /// Release the capture device. Idempotent.
    fn close(&mut self) -> Result<()>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn capture_next(&mut self) -> Result<()> {
        (**self).capture_next()
    }

    fn frame(&self) -> &Frame {
        (**self).frame()
    }

    fn overlay_debug_text(&mut self, text: &str) {
        (**self).overlay_debug_text(text)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Synthetic moving color bars.
///
/// Stands in for a camera on camera-less boards and development hosts and
/// drives the test suite: the pattern scrolls one bar width every 32
/// frames so consecutive frames differ, and stamping behaves exactly like
/// the live sources.
pub struct TestPatternSource {
    frame: Frame,
    open: bool,
}

/// SMPTE-ish bar colors in RGB order.
const BARS: [[u8; 3]; 8] = [
    [255, 255, 255],
    [255, 255, 0],
    [0, 255, 255],
    [0, 255, 0],
    [255, 0, 255],
    [255, 0, 0],
    [0, 0, 255],
    [16, 16, 16],
];

impl TestPatternSource {
    /// Bind a pattern source to a block from `pool`.
    pub fn new(pool: &MemoryPool, width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        let block = pool.acquire_block(true)?;
        let frame = Frame::new(block, width, height, format)?;
        Ok(Self { frame, open: true })
    }

    fn render(&mut self) {
        let width = self.frame.width() as usize;
        let height = self.frame.height() as usize;
        let format = self.frame.format();
        let bar_width = (width / BARS.len()).max(1);
        let shift = (self.frame.index() as usize / 32) * bar_width;

        let pixels = self.frame.pixels_mut();
        for y in 0..height {
            let row = &mut pixels[y * width * 3..(y + 1) * width * 3];
            for (x, px) in row.chunks_exact_mut(3).enumerate() {
                let bar = ((x + shift) / bar_width) % BARS.len();
                let [r, g, b] = BARS[bar];
                match format {
                    PixelFormat::Rgb888 => px.copy_from_slice(&[r, g, b]),
                    PixelFormat::Bgr888 => px.copy_from_slice(&[b, g, r]),
                }
            }
        }
    }
}

impl FrameSource for TestPatternSource {
    fn capture_next(&mut self) -> Result<()> {
        if !self.open {
            return Err(Error::CaptureFailed("pattern source is closed".into()));
        }
        self.frame.stamp(monotonic_us());
        self.render();
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
        self.open = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(width: u32, height: u32) -> TestPatternSource {
        let pool = MemoryPool::with_heap(width as usize * height as usize * 3, 1).unwrap();
        TestPatternSource::new(&pool, width, height, PixelFormat::Bgr888).unwrap()
    }

    #[test]
    fn stamps_strictly_increasing_pts() {
        let mut src = source(64, 8);
        let mut last = 0;
        for i in 1..=20 {
            src.capture_next().unwrap();
            assert_eq!(src.frame().index(), i);
            assert!(src.frame().pts() > last);
            last = src.frame().pts();
        }
    }

    #[test]
    fn zero_copy_block_address_is_stable() {
        let mut src = source(64, 8);
        src.capture_next().unwrap();
        let addr = src.frame().block().virtual_address();
        src.capture_next().unwrap();
        src.overlay_debug_text("fps = 1.00");
        assert_eq!(src.frame().block().virtual_address(), addr);
    }

    #[test]
    fn renders_distinct_bars() {
        let mut src = source(64, 4);
        src.capture_next().unwrap();
        let pixels = src.frame().pixels();
        // First bar is white, last is near-black.
        assert_eq!(&pixels[0..3], &[255, 255, 255]);
        let last = &pixels[(63 * 3)..(64 * 3)];
        assert_eq!(last, &[16, 16, 16]);
    }

    #[test]
    fn capture_after_close_fails() {
        let mut src = source(16, 4);
        src.close().unwrap();
        src.close().unwrap();
        assert!(src.capture_next().is_err());
    }

    #[test]
    fn pool_block_is_exclusively_held() {
        let pool = MemoryPool::with_heap(16 * 4 * 3, 1).unwrap();
        let _src = TestPatternSource::new(&pool, 16, 4, PixelFormat::Bgr888).unwrap();
        assert!(matches!(pool.acquire_block(true), Err(Error::OutOfBlocks)));
    }
}
