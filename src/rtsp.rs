// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! RTSP transmission session.
//!
//! [`StreamSession`] is the narrow surface the pipeline drives every tick;
//! server/session/codec/timestamp setup happens once at init on the
//! concrete [`RtspServer`]. The setup ordering is tracked by
//! [`SessionReadiness`]: a transmit before the codec is declared and the
//! timestamp domains are synchronized fails fast instead of feeding
//! clients undecodable data.

use crate::error::{Error, Result};

#[cfg(feature = "rockchip")]
use crate::encoder::Codec;
#[cfg(feature = "rockchip")]
use rockit_sys::rtsp::{
    rtsp as rtsp_lib, rtsp_demo_handle, rtsp_session_handle, RTSP_CODEC_ID_VIDEO_H264,
    RTSP_CODEC_ID_VIDEO_H265, RTSP_LIBRARY,
};
#[cfg(feature = "rockchip")]
use std::ffi::CString;
#[cfg(feature = "rockchip")]
use tracing::{debug, warn};

/// What the pipeline needs from an established session each iteration.
pub trait StreamSession {
    /// Push one encoded access unit to connected clients. Does not block
    /// on slow clients beyond the transport's internal buffering; a
    /// failure means session teardown and is absorbed per-iteration by
    /// the pipeline.
    fn transmit(&mut self, data: &[u8], pts_us: u64) -> Result<()>;

    /// Service client connect/disconnect/keepalive. Must run every
    /// iteration whether or not a packet was transmitted.
    fn pump_events(&mut self) -> Result<()>;

    /// Tear down the session, then the server handle. Idempotent.
    fn close(&mut self) -> Result<()>;
}

impl<T: StreamSession + ?Sized> StreamSession for Box<T> {
    fn transmit(&mut self, data: &[u8], pts_us: u64) -> Result<()> {
        (**self).transmit(data, pts_us)
    }

    fn pump_events(&mut self) -> Result<()> {
        (**self).pump_events()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Tracks the one-shot setup calls a session needs before it may carry
/// traffic.
#[derive(Debug, Default)]
pub struct SessionReadiness {
    codec_set: bool,
    timestamp_synced: bool,
}

impl SessionReadiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_codec_set(&mut self) {
        self.codec_set = true;
    }

    pub fn mark_timestamp_synced(&mut self) {
        self.timestamp_synced = true;
    }

    /// Fails with a configuration error unless both setup steps ran.
    pub fn ensure_ready(&self) -> Result<()> {
        if !self.codec_set {
            return Err(Error::SessionNotReady("video codec not declared"));
        }
        if !self.timestamp_synced {
            return Err(Error::SessionNotReady("timestamps not synchronized"));
        }
        Ok(())
    }
}

/// RTSP server with one session, over the SDK reference implementation.
#[cfg(feature = "rockchip")]
pub struct RtspServer {
    lib: rtsp_lib,
    demo: Option<rtsp_demo_handle>,
    session: Option<rtsp_session_handle>,
    readiness: SessionReadiness,
    port: u16,
}

#[cfg(feature = "rockchip")]
impl RtspServer {
    /// Create the server endpoint on `port`.
    pub fn open(port: u16) -> Result<Self> {
        let lib = unsafe { rtsp_lib::new(RTSP_LIBRARY) }
            .map_err(|e| Error::VendorLibrary(e.to_string()))?;

        let demo = unsafe { lib.create_rtsp_demo(port as i32) };
        if demo.is_null() {
            return Err(Error::ServerCreate(port));
        }
        debug!(port, "RTSP server listening");

        Ok(Self {
            lib,
            demo: Some(demo),
            session: None,
            readiness: SessionReadiness::new(),
            port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Create the session at `path`, e.g. `/live/0`.
    pub fn create_session(&mut self, path: &str) -> Result<()> {
        let demo = self
            .demo
            .ok_or(Error::SessionNotReady("server not created"))?;
        let c_path = CString::new(path)
            .map_err(|_| Error::InvalidConfig("session path contains NUL".into()))?;

        let session = unsafe { self.lib.rtsp_new_session(demo, c_path.as_ptr()) };
        if session.is_null() {
            return Err(Error::SessionCreate(path.into()));
        }
        debug!(path, "RTSP session created");
        self.session = Some(session);
        Ok(())
    }

    /// Declare the session's video codec, optionally with out-of-band
    /// parameter sets (SPS/PPS). `None` relies on in-band parameter sets,
    /// which this pipeline guarantees by encoding every frame as an IDR.
    pub fn set_codec(&mut self, codec: Codec, codec_data: Option<&[u8]>) -> Result<()> {
        let session = self
            .session
            .ok_or(Error::SessionNotReady("session not created"))?;
        let codec_id = match codec {
            Codec::H264 => RTSP_CODEC_ID_VIDEO_H264,
            Codec::H265 => RTSP_CODEC_ID_VIDEO_H265,
        };
        let (ptr, len) = match codec_data {
            Some(data) => (data.as_ptr(), data.len() as i32),
            None => (std::ptr::null(), 0),
        };

        let ret = unsafe { self.lib.rtsp_set_video(session, codec_id, ptr, len) };
        if ret != 0 {
            return Err(Error::CodecConfig(ret));
        }
        self.readiness.mark_codec_set();
        Ok(())
    }

    /// Establish the offset between the encoder's monotonic PTS domain
    /// and the protocol's wall-clock domain.
    pub fn sync_timestamp(&mut self) -> Result<()> {
        let session = self
            .session
            .ok_or(Error::SessionNotReady("session not created"))?;

        let ret = unsafe {
            let reltime = self.lib.rtsp_get_reltime();
            let ntptime = self.lib.rtsp_get_ntptime();
            self.lib.rtsp_sync_video_ts(session, reltime, ntptime)
        };
        if ret != 0 {
            return Err(Error::TimestampSync(ret));
        }
        self.readiness.mark_timestamp_synced();
        Ok(())
    }
}

#[cfg(feature = "rockchip")]
impl StreamSession for RtspServer {
    fn transmit(&mut self, data: &[u8], pts_us: u64) -> Result<()> {
        self.readiness.ensure_ready()?;
        let session = self
            .session
            .ok_or(Error::SessionNotReady("session not created"))?;

        let ret =
            unsafe { self.lib.rtsp_tx_video(session, data.as_ptr(), data.len() as i32, pts_us) };
        if ret != 0 {
            return Err(Error::Transmit(ret));
        }
        Ok(())
    }

    fn pump_events(&mut self) -> Result<()> {
        if let Some(demo) = self.demo {
            // The reference server reports "no work" as a non-zero return;
            // event pumping has no failure mode worth surfacing.
            unsafe { self.lib.rtsp_do_event(demo) };
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            let ret = unsafe { self.lib.rtsp_del_session(session) };
            if ret != 0 {
                warn!(code = ret, "session delete failed");
            }
        }
        if let Some(demo) = self.demo.take() {
            let ret = unsafe { self.lib.rtsp_del_demo(demo) };
            if ret != 0 {
                warn!(code = ret, "server delete failed");
            }
            debug!("RTSP server closed");
        }
        Ok(())
    }
}

#[cfg(feature = "rockchip")]
impl Drop for RtspServer {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transmit_requires_codec_then_sync() {
        let mut readiness = SessionReadiness::new();
        assert!(matches!(
            readiness.ensure_ready(),
            Err(Error::SessionNotReady("video codec not declared"))
        ));

        readiness.mark_codec_set();
        assert!(matches!(
            readiness.ensure_ready(),
            Err(Error::SessionNotReady("timestamps not synchronized"))
        ));

        readiness.mark_timestamp_synced();
        readiness.ensure_ready().unwrap();
    }

    #[test]
    fn readiness_order_does_not_matter_once_complete() {
        let mut readiness = SessionReadiness::new();
        readiness.mark_timestamp_synced();
        readiness.mark_codec_set();
        readiness.ensure_ready().unwrap();
    }
}
