// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! The capture → encode → transmit loop.
//!
//! One iteration, strict order: capture into the shared block, overlay the
//! FPS readout, submit the frame, poll for an encoded packet with a
//! bounded timeout, transmit, release. The release in step six is the one
//! rule that must survive every partial failure: a packet obtained from
//! the encoder goes back to the encoder exactly once, even when the
//! transmit failed, or the stream ring starves and the pipeline stalls.
//!
//! Failure severity per iteration:
//! - capture failure: fatal (device gone);
//! - submit rejection: fatal (configuration bug, not load);
//! - empty poll: normal backpressure, silent;
//! - transmit failure: logged and absorbed (a disconnected viewer must
//!   not stop the encode loop);
//! - release failure: logged, fatal after
//!   [`PipelineConfig::release_failure_limit`] consecutive failures.

use crate::clock::{monotonic_us, FpsTracker};
use crate::encoder::VideoEncoder;
use crate::error::{Error, Result};
use crate::rtsp::StreamSession;
use crate::source::FrameSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bounded wait for `poll_stream`, in microseconds. Keeps the loop
    /// responsive to the cancellation flag when the encoder stalls.
    pub poll_timeout_us: i64,
    /// Consecutive packet-release failures tolerated before the run is
    /// aborted as resource exhaustion.
    pub release_failure_limit: u32,
    /// Draw the FPS readout onto outgoing frames.
    pub overlay_fps: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_timeout_us: 1000,
            release_failure_limit: 3,
            overlay_fps: true,
        }
    }
}

/// Counters accumulated across a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunStats {
    pub iterations: u64,
    pub frames_captured: u64,
    pub frames_submitted: u64,
    pub packets_received: u64,
    pub transmits: u64,
    pub transmit_failures: u64,
    pub releases: u64,
    pub release_failures: u64,
    pub last_fps: f32,
}

/// Single-threaded orchestration of one source, one encoder channel and
/// one transmission session.
pub struct Pipeline<S, E, T> {
    source: S,
    encoder: E,
    session: T,
    config: PipelineConfig,
    cancel: Arc<AtomicBool>,
    fps: FpsTracker,
    last_fps: f32,
    consecutive_release_failures: u32,
    stats: RunStats,
}

impl<S, E, T> Pipeline<S, E, T>
where
    S: FrameSource,
    E: VideoEncoder,
    T: StreamSession,
{
    pub fn new(source: S, encoder: E, session: T, config: PipelineConfig) -> Self {
        Self {
            source,
            encoder,
            session,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
            fps: FpsTracker::new(),
            last_fps: 0.0,
            consecutive_release_failures: 0,
            stats: RunStats::default(),
        }
    }

    /// Flag checked at the top of every iteration; sharable with a signal
    /// handler.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Run until cancelled or a fatal error.
    pub fn run(&mut self) -> Result<RunStats> {
        self.run_inner(None)
    }

    /// Run at most `frames` iterations (smoke tests, `--frames`).
    pub fn run_for(&mut self, frames: u64) -> Result<RunStats> {
        self.run_inner(Some(frames))
    }

    fn run_inner(&mut self, limit: Option<u64>) -> Result<RunStats> {
        let mut remaining = limit;
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                debug!("cancellation requested, leaving the loop");
                break;
            }
            if let Some(ref mut n) = remaining {
                if *n == 0 {
                    break;
                }
                *n -= 1;
            }
            self.iterate()?;
        }
        Ok(self.stats)
    }

    fn iterate(&mut self) -> Result<()> {
        self.stats.iterations += 1;

        self.source.capture_next()?;
        self.stats.frames_captured += 1;

        if self.config.overlay_fps {
            let text = format!("fps = {:.2}", self.last_fps);
            self.source.overlay_debug_text(&text);
        }

        self.encoder.submit_frame(self.source.frame())?;
        self.stats.frames_submitted += 1;

        if let Some(packet) = self.encoder.poll_stream(self.config.poll_timeout_us)? {
            self.stats.packets_received += 1;

            match self.session.transmit(packet.data(), packet.pts()) {
                Ok(()) => self.stats.transmits += 1,
                Err(e) => {
                    self.stats.transmit_failures += 1;
                    warn!(error = %e, seq = packet.seq(), "transmit failed, continuing");
                }
            }

            self.last_fps = self.fps.tick(monotonic_us());
            self.stats.last_fps = self.last_fps;

            match self.encoder.release_packet(packet) {
                Ok(()) => {
                    self.stats.releases += 1;
                    self.consecutive_release_failures = 0;
                }
                Err(e) => {
                    self.stats.release_failures += 1;
                    self.consecutive_release_failures += 1;
                    warn!(
                        error = %e,
                        consecutive = self.consecutive_release_failures,
                        "packet release failed"
                    );
                    if self.consecutive_release_failures >= self.config.release_failure_limit {
                        return Err(Error::StreamRingExhausted(
                            self.consecutive_release_failures,
                        ));
                    }
                }
            }
        }

        // Keepalives and connection handling run even on empty polls;
        // otherwise clients silently time out during encoder backpressure.
        if let Err(e) = self.session.pump_events() {
            warn!(error = %e, "event pump failed, continuing");
        }

        Ok(())
    }

    /// Hand the stages back for ordered teardown.
    pub fn into_parts(self) -> (S, E, T) {
        (self.source, self.encoder, self.session)
    }
}
