// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! On-target smoke tests.
//!
//! These need an RV1106-class board with the vendor runtime libraries
//! installed and exclusive ownership of the encoder, so they are ignored
//! by default and serialized when run.

#![cfg(feature = "rockchip")]

use edgefirst_rtsp::encoder::EncoderConfig;
use edgefirst_rtsp::frame::PixelFormat;
use edgefirst_rtsp::mpi::MpiSystem;
use edgefirst_rtsp::pipeline::{Pipeline, PipelineConfig};
use edgefirst_rtsp::pool::MemoryPool;
use edgefirst_rtsp::rtsp::RtspServer;
use edgefirst_rtsp::source::TestPatternSource;
use edgefirst_rtsp::venc::VencChannel;
use serial_test::serial;
use std::sync::Arc;

const WIDTH: u32 = 720;
const HEIGHT: u32 = 480;

#[test]
#[serial]
#[ignore = "requires RV1106 hardware (run with --include-ignored)"]
fn device_pool_round_trip() {
    let mpi = MpiSystem::init().unwrap();
    let pool = MemoryPool::with_rockit(mpi, WIDTH as usize * HEIGHT as usize * 3, 1).unwrap();

    let mut block = pool.acquire_block(true).unwrap();
    assert!(block.is_dma());
    let addr = block.virtual_address();
    block.as_mut_slice()[0] = 0x5A;
    assert_eq!(block.virtual_address(), addr);
    assert_eq!(block.as_slice()[0], 0x5A);
}

#[test]
#[serial]
#[ignore = "requires RV1106 hardware (run with --include-ignored)"]
fn device_encoder_open_close() {
    use edgefirst_rtsp::encoder::VideoEncoder;

    let mpi = MpiSystem::init().unwrap();
    let mut encoder = VencChannel::open(mpi, EncoderConfig::new(WIDTH, HEIGHT)).unwrap();
    encoder.close().unwrap();
    encoder.close().unwrap();
}

#[test]
#[serial]
#[ignore = "requires RV1106 hardware (run with --include-ignored)"]
fn device_streams_pattern_frames() {
    let mpi = MpiSystem::init().unwrap();
    let pool = MemoryPool::with_rockit(
        Arc::clone(&mpi),
        WIDTH as usize * HEIGHT as usize * 3,
        1,
    )
    .unwrap();
    let source = TestPatternSource::new(&pool, WIDTH, HEIGHT, PixelFormat::Bgr888).unwrap();

    let mut session = RtspServer::open(8554).unwrap();
    session.create_session("/live/0").unwrap();
    session
        .set_codec(edgefirst_rtsp::encoder::Codec::H264, None)
        .unwrap();
    session.sync_timestamp().unwrap();

    let encoder = VencChannel::open(mpi, EncoderConfig::new(WIDTH, HEIGHT)).unwrap();

    let mut pipeline = Pipeline::new(source, encoder, session, PipelineConfig::default());
    let stats = pipeline.run_for(30).unwrap();

    assert_eq!(stats.frames_captured, 30);
    assert_eq!(stats.releases, stats.packets_received);
    assert!(stats.packets_received > 0);
}
