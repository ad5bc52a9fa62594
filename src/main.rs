// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_rtsp::args::Args;
use std::error::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    tracing_log::LogTracer::init()?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if args.verbose { "debug" } else { "info" })
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("EdgeFirst RTSP Streamer");
    run(args)
}

#[cfg(feature = "rockchip")]
fn run(args: Args) -> Result<(), Box<dyn Error>> {
    use edgefirst_rtsp::app::App;
    use std::sync::atomic::Ordering;

    let mut app = App::init(&args)?;

    let cancel = app.cancel_flag();
    ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst))?;

    let result = app.run(args.frames);
    app.shutdown();

    let stats = result?;
    info!(
        frames = stats.frames_captured,
        packets = stats.packets_received,
        transmit_failures = stats.transmit_failures,
        fps = stats.last_fps,
        "streaming finished"
    );
    Ok(())
}

#[cfg(not(feature = "rockchip"))]
fn run(_args: Args) -> Result<(), Box<dyn Error>> {
    Err("this build has no hardware backend; rebuild with --features rockchip".into())
}
