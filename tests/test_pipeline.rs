// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Pipeline orchestration tests against counting mock stages.
//!
//! The mock encoder models the hardware stream ring: a bounded number of
//! packet slots that starve when packets are not released, which is the
//! failure mode the release discipline exists to prevent.

use edgefirst_rtsp::encoder::{EncodedPacket, VideoEncoder};
use edgefirst_rtsp::error::Error;
use edgefirst_rtsp::frame::{Frame, PixelFormat};
use edgefirst_rtsp::pipeline::{Pipeline, PipelineConfig};
use edgefirst_rtsp::pool::MemoryPool;
use edgefirst_rtsp::rtsp::StreamSession;
use edgefirst_rtsp::source::{FrameSource, TestPatternSource};
use std::sync::atomic::Ordering;

const WIDTH: u32 = 720;
const HEIGHT: u32 = 480;

fn pattern_source() -> TestPatternSource {
    let pool = MemoryPool::with_heap(WIDTH as usize * HEIGHT as usize * 3, 1).unwrap();
    TestPatternSource::new(&pool, WIDTH, HEIGHT, PixelFormat::Bgr888).unwrap()
}

/// Wraps the real pattern source with call counting and fault injection.
struct CountingSource {
    inner: TestPatternSource,
    captures: u64,
    overlays: u64,
    closes: u32,
    fail_after: Option<u64>,
}

impl CountingSource {
    fn new() -> Self {
        Self {
            inner: pattern_source(),
            captures: 0,
            overlays: 0,
            closes: 0,
            fail_after: None,
        }
    }
}

impl FrameSource for CountingSource {
    fn capture_next(&mut self) -> Result<(), Error> {
        if self.fail_after == Some(self.captures) {
            return Err(Error::CaptureFailed("simulated device loss".into()));
        }
        self.inner.capture_next()?;
        self.captures += 1;
        Ok(())
    }

    fn frame(&self) -> &Frame {
        self.inner.frame()
    }

    fn overlay_debug_text(&mut self, text: &str) {
        self.overlays += 1;
        self.inner.overlay_debug_text(text);
    }

    fn close(&mut self) -> Result<(), Error> {
        self.closes += 1;
        self.inner.close()
    }
}

/// Mock encoder with a bounded packet ring.
///
/// `ring_slots` packets may be outstanding at once; polling past that
/// reports exhaustion the way the starved hardware ring does. Every
/// `empty_every`-th poll returns no packet to model encoder backpressure.
struct MockEncoder {
    ring_slots: usize,
    outstanding: usize,
    pending: Option<(u64, Vec<u8>)>,
    seq: u32,
    polls: u64,
    submits: u64,
    packets: u64,
    release_attempts: u64,
    closes: u32,
    empty_every: Option<u64>,
    fail_releases: bool,
    submit_addrs: Vec<usize>,
}

impl MockEncoder {
    fn new(ring_slots: usize) -> Self {
        Self {
            ring_slots,
            outstanding: 0,
            pending: None,
            seq: 0,
            polls: 0,
            submits: 0,
            packets: 0,
            release_attempts: 0,
            closes: 0,
            empty_every: None,
            fail_releases: false,
            submit_addrs: Vec::new(),
        }
    }
}

impl VideoEncoder for MockEncoder {
    fn submit_frame(&mut self, frame: &Frame) -> Result<(), Error> {
        self.submits += 1;
        self.submit_addrs
            .push(frame.block().virtual_address() as usize);
        let payload = vec![0, 0, 0, 1, 0x65, frame.index() as u8];
        self.pending = Some((frame.pts(), payload));
        Ok(())
    }

    fn poll_stream(&mut self, _timeout_us: i64) -> Result<Option<EncodedPacket>, Error> {
        self.polls += 1;
        if self.outstanding >= self.ring_slots {
            return Err(Error::OutOfBlocks);
        }
        if let Some(n) = self.empty_every {
            if self.polls % n == 0 {
                return Ok(None);
            }
        }
        match self.pending.take() {
            Some((pts, data)) => {
                self.outstanding += 1;
                self.packets += 1;
                self.seq += 1;
                Ok(Some(EncodedPacket::from_bytes(data, pts, self.seq)))
            }
            None => Ok(None),
        }
    }

    fn release_packet(&mut self, _packet: EncodedPacket) -> Result<(), Error> {
        self.release_attempts += 1;
        self.outstanding -= 1;
        if self.fail_releases {
            return Err(Error::StreamRelease(-0x101));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        self.closes += 1;
        Ok(())
    }
}

struct MockSession {
    transmits: u64,
    transmit_failures_injected: bool,
    pumps: u64,
    closes: u32,
    pts_log: Vec<u64>,
    bytes: usize,
}

impl MockSession {
    fn new() -> Self {
        Self {
            transmits: 0,
            transmit_failures_injected: false,
            pumps: 0,
            closes: 0,
            pts_log: Vec::new(),
            bytes: 0,
        }
    }
}

impl StreamSession for MockSession {
    fn transmit(&mut self, data: &[u8], pts_us: u64) -> Result<(), Error> {
        if self.transmit_failures_injected {
            return Err(Error::Transmit(-1));
        }
        self.transmits += 1;
        self.bytes += data.len();
        self.pts_log.push(pts_us);
        Ok(())
    }

    fn pump_events(&mut self) -> Result<(), Error> {
        self.pumps += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        self.closes += 1;
        Ok(())
    }
}

fn pipeline(
    source: CountingSource,
    encoder: MockEncoder,
    session: MockSession,
) -> Pipeline<CountingSource, MockEncoder, MockSession> {
    Pipeline::new(source, encoder, session, PipelineConfig::default())
}

#[test]
fn end_to_end_ten_iterations() {
    let mut encoder = MockEncoder::new(2);
    encoder.empty_every = Some(4); // every 4th poll comes back empty
    let mut p = pipeline(CountingSource::new(), encoder, MockSession::new());

    let stats = p.run_for(10).unwrap();
    let (source, encoder, session) = p.into_parts();

    assert_eq!(stats.iterations, 10);
    assert_eq!(source.captures, 10);
    assert_eq!(source.overlays, 10);
    assert_eq!(encoder.submits, 10);
    assert_eq!(encoder.polls, 10);
    assert!(encoder.packets <= 10);
    assert!(encoder.packets > 0);

    // One transmit and one release per received packet, nothing more.
    assert_eq!(session.transmits, encoder.packets);
    assert_eq!(stats.transmits, encoder.packets);
    assert_eq!(encoder.release_attempts, encoder.packets);
    assert_eq!(stats.releases, encoder.packets);
    assert_eq!(stats.release_failures, 0);
    assert_eq!(encoder.outstanding, 0);

    // The event pump services the session every iteration, packet or not.
    assert_eq!(session.pumps, 10);
    assert!(session.bytes > 0);
}

#[test]
fn skipping_release_starves_the_ring() {
    let mut source = CountingSource::new();
    let mut encoder = MockEncoder::new(2);

    // Buggy caller: poll without ever releasing.
    let mut held = Vec::new();
    for _ in 0..2 {
        source.capture_next().unwrap();
        encoder.submit_frame(source.frame()).unwrap();
        held.push(encoder.poll_stream(1000).unwrap().unwrap());
    }

    source.capture_next().unwrap();
    encoder.submit_frame(source.frame()).unwrap();
    let err = encoder.poll_stream(1000).unwrap_err();
    assert_eq!(err.category(), edgefirst_rtsp::Category::ResourceExhaustion);

    // Releasing one slot unblocks the ring.
    encoder.release_packet(held.pop().unwrap()).unwrap();
    assert!(encoder.poll_stream(1000).unwrap().is_some());
}

#[test]
fn transmit_failures_do_not_stop_the_loop() {
    let mut session = MockSession::new();
    session.transmit_failures_injected = true;
    let mut p = pipeline(CountingSource::new(), MockEncoder::new(2), session);

    let stats = p.run_for(10).unwrap();
    let (_, encoder, session) = p.into_parts();

    assert_eq!(stats.frames_captured, 10);
    assert_eq!(session.transmits, 0);
    assert_eq!(stats.transmit_failures, encoder.packets);
    // The release still happened for every packet despite the failures.
    assert_eq!(encoder.release_attempts, encoder.packets);
    assert_eq!(encoder.outstanding, 0);
}

#[test]
fn capture_failure_is_fatal() {
    let mut source = CountingSource::new();
    source.fail_after = Some(3);
    let mut p = pipeline(source, MockEncoder::new(2), MockSession::new());

    let err = p.run_for(10).unwrap_err();
    assert!(matches!(err, Error::CaptureFailed(_)));

    let stats = *p.stats();
    assert_eq!(stats.frames_captured, 3);
    assert_eq!(stats.frames_submitted, 3);
}

#[test]
fn release_failures_escalate_after_limit() {
    let mut encoder = MockEncoder::new(8);
    encoder.fail_releases = true;
    let mut p = pipeline(CountingSource::new(), encoder, MockSession::new());

    let err = p.run_for(10).unwrap_err();
    assert!(matches!(err, Error::StreamRingExhausted(3)));

    let stats = *p.stats();
    assert_eq!(stats.release_failures, 3);
    assert_eq!(stats.releases, 0);
}

#[test]
fn packet_pts_is_inherited_and_strictly_increasing() {
    let mut p = pipeline(CountingSource::new(), MockEncoder::new(2), MockSession::new());
    p.run_for(20).unwrap();
    let (_, _, session) = p.into_parts();

    assert!(session.pts_log.len() > 1);
    for pair in session.pts_log.windows(2) {
        assert!(pair[0] < pair[1], "pts not increasing: {pair:?}");
    }
}

#[test]
fn zero_copy_block_address_never_changes() {
    let mut p = pipeline(CountingSource::new(), MockEncoder::new(2), MockSession::new());
    p.run_for(10).unwrap();
    let (source, encoder, _) = p.into_parts();

    let expected = source.frame().block().virtual_address() as usize;
    assert_eq!(encoder.submit_addrs.len(), 10);
    assert!(encoder.submit_addrs.iter().all(|&addr| addr == expected));
}

#[test]
fn cancellation_stops_before_the_next_iteration() {
    let mut p = pipeline(CountingSource::new(), MockEncoder::new(2), MockSession::new());
    p.cancel_flag().store(true, Ordering::SeqCst);
    let stats = p.run().unwrap();
    assert_eq!(stats.iterations, 0);
}

#[test]
fn teardown_is_idempotent() {
    let mut p = pipeline(CountingSource::new(), MockEncoder::new(2), MockSession::new());
    p.run_for(2).unwrap();
    let (mut source, mut encoder, mut session) = p.into_parts();

    for _ in 0..2 {
        session.close().unwrap();
        encoder.close().unwrap();
        source.close().unwrap();
    }
    assert_eq!(session.closes, 2);
    assert_eq!(encoder.closes, 2);
    assert_eq!(source.closes, 2);
}
