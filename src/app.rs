// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Application assembly: bring every subsystem up in order, run the
//! pipeline, tear everything down in reverse.
//!
//! Init is all-or-nothing: each stage is built only after the previous
//! one succeeded, and a failure drops whatever was already built, rolling
//! the partial state back through the owning handles. The capture device
//! is negotiated before the pool exists because the driver may clamp the
//! requested resolution and every later stage is sized from the accepted
//! one.

use crate::args::{Args, SourceKind};
use crate::encoder::{Codec, EncoderConfig, VideoEncoder};
use crate::error::{Error, Result};
use crate::frame::PixelFormat;
use crate::mpi::MpiSystem;
use crate::pipeline::{Pipeline, PipelineConfig, RunStats};
use crate::pool::MemoryPool;
use crate::rtsp::{RtspServer, StreamSession};
use crate::source::{FrameSource, TestPatternSource};
use crate::venc::VencChannel;
use std::process::Command;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

enum PendingSource {
    Pattern,
    #[cfg(feature = "v4l2")]
    V4l2(crate::v4l2::V4l2Capture),
}

pub struct App {
    pipeline: Pipeline<Box<dyn FrameSource>, VencChannel, RtspServer>,
    pool: MemoryPool,
}

impl App {
    pub fn init(args: &Args) -> Result<Self> {
        info!(
            resolution = format!("{}x{}", args.width(), args.height()),
            port = args.port,
            "initializing RTSP video streaming"
        );

        if !args.no_stop_command {
            stop_conflicting_service(&args.stop_command)?;
        }

        let mpi = MpiSystem::init()?;
        let format: PixelFormat = args.pixel_order.into();

        // Open the capture device first; the accepted resolution sizes
        // the pool and the encoder channel.
        let (width, height, pending) = match args.source {
            SourceKind::Pattern => (args.width(), args.height(), PendingSource::Pattern),
            SourceKind::V4l2 => {
                #[cfg(feature = "v4l2")]
                {
                    let capture =
                        crate::v4l2::V4l2Capture::open(args.device, args.width(), args.height())?;
                    let (w, h) = (capture.width(), capture.height());
                    (w, h, PendingSource::V4l2(capture))
                }
                #[cfg(not(feature = "v4l2"))]
                {
                    return Err(Error::Unsupported(
                        "v4l2 capture not compiled in; rebuild with --features v4l2 \
                         or use --source pattern"
                            .into(),
                    ));
                }
            }
        };

        let block_size = width as usize * height as usize * format.bytes_per_pixel();
        let pool = MemoryPool::with_rockit(Arc::clone(&mpi), block_size, 1)?;

        let source: Box<dyn FrameSource> = match pending {
            PendingSource::Pattern => {
                Box::new(TestPatternSource::new(&pool, width, height, format)?)
            }
            #[cfg(feature = "v4l2")]
            PendingSource::V4l2(capture) => Box::new(capture.bind(&pool, format)?),
        };

        let mut session = RtspServer::open(args.port)?;
        session.create_session(&args.stream_path)?;
        session.set_codec(Codec::H264, None)?;
        session.sync_timestamp()?;

        let encoder = VencChannel::open(
            Arc::clone(&mpi),
            EncoderConfig {
                channel_id: args.channel,
                bitrate_kbps: args.bitrate,
                gop: args.gop,
                pixel_format: format,
                ..EncoderConfig::new(width, height)
            },
        )?;

        let pipeline = Pipeline::new(
            source,
            encoder,
            session,
            PipelineConfig {
                poll_timeout_us: args.poll_timeout_us,
                ..PipelineConfig::default()
            },
        );

        info!("initialization complete");
        Ok(Self { pipeline, pool })
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.pipeline.cancel_flag()
    }

    pub fn run(&mut self, frames: Option<u64>) -> Result<RunStats> {
        match frames {
            Some(n) => self.pipeline.run_for(n),
            None => self.pipeline.run(),
        }
    }

    /// Best-effort reverse-order teardown: session, encoder, source,
    /// pool; the MPI core exits when its last user is gone. Each step is
    /// independently guarded so one failure never blocks the rest.
    pub fn shutdown(self) {
        let Self { pipeline, mut pool } = self;
        let (mut source, mut encoder, mut session) = pipeline.into_parts();

        if let Err(e) = session.close() {
            warn!(error = %e, "session teardown failed");
        }
        if let Err(e) = encoder.close() {
            warn!(error = %e, "encoder teardown failed");
        }
        if let Err(e) = source.close() {
            warn!(error = %e, "capture teardown failed");
        }
        drop(source); // returns the frame's block to the pool
        pool.destroy();
        info!("shutdown complete");
    }
}

/// The vendor image auto-launches its own streamer which holds the
/// encoder; stop it before claiming hardware resources.
fn stop_conflicting_service(command: &str) -> Result<()> {
    let status = Command::new(command).status().map_err(|e| {
        warn!(command, error = %e, "service stop command could not run");
        Error::ServiceStop {
            command: command.into(),
            status: -1,
        }
    })?;
    if !status.success() {
        return Err(Error::ServiceStop {
            command: command.into(),
            status: status.code().unwrap_or(-1),
        });
    }
    Ok(())
}
