// SPDX-License-Identifier: AGPL-3.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Bindings for the SDK's reference RTSP server (`rtsp_demo.h`,
//! `librtsp.so`). The library runs a poll-driven server inside the calling
//! thread: `rtsp_do_event` must be invoked periodically to service client
//! connections.

use libloading::Library;
use std::ffi::{c_char, c_int, c_void, OsStr};

/// Default library name on the target root filesystem.
pub const RTSP_LIBRARY: &str = "librtsp.so";

pub type rtsp_demo_handle = *mut c_void;
pub type rtsp_session_handle = *mut c_void;

pub const RTSP_CODEC_ID_VIDEO_H264: c_int = 0x0002;
pub const RTSP_CODEC_ID_VIDEO_H265: c_int = 0x0003;

/// Dynamically loaded `librtsp.so`.
pub struct rtsp {
    __library: Library,
    create_rtsp_demo: unsafe extern "C" fn(c_int) -> rtsp_demo_handle,
    rtsp_del_demo: unsafe extern "C" fn(rtsp_demo_handle) -> c_int,
    rtsp_new_session: unsafe extern "C" fn(rtsp_demo_handle, *const c_char) -> rtsp_session_handle,
    rtsp_del_session: unsafe extern "C" fn(rtsp_session_handle) -> c_int,
    rtsp_set_video: unsafe extern "C" fn(rtsp_session_handle, c_int, *const u8, c_int) -> c_int,
    rtsp_sync_video_ts: unsafe extern "C" fn(rtsp_session_handle, u64, u64) -> c_int,
    rtsp_tx_video: unsafe extern "C" fn(rtsp_session_handle, *const u8, c_int, u64) -> c_int,
    rtsp_do_event: unsafe extern "C" fn(rtsp_demo_handle) -> c_int,
    rtsp_get_reltime: unsafe extern "C" fn() -> u64,
    rtsp_get_ntptime: unsafe extern "C" fn() -> u64,
}

impl rtsp {
    /// Load the library and resolve every bound symbol.
    ///
    /// # Safety
    ///
    /// The file at `path` must be the SDK RTSP library matching the
    /// declarations in this module.
    pub unsafe fn new<P: AsRef<OsStr>>(path: P) -> Result<Self, libloading::Error> {
        let __library = Library::new(path)?;
        Ok(Self {
            create_rtsp_demo: *__library.get(b"create_rtsp_demo\0")?,
            rtsp_del_demo: *__library.get(b"rtsp_del_demo\0")?,
            rtsp_new_session: *__library.get(b"rtsp_new_session\0")?,
            rtsp_del_session: *__library.get(b"rtsp_del_session\0")?,
            rtsp_set_video: *__library.get(b"rtsp_set_video\0")?,
            rtsp_sync_video_ts: *__library.get(b"rtsp_sync_video_ts\0")?,
            rtsp_tx_video: *__library.get(b"rtsp_tx_video\0")?,
            rtsp_do_event: *__library.get(b"rtsp_do_event\0")?,
            rtsp_get_reltime: *__library.get(b"rtsp_get_reltime\0")?,
            rtsp_get_ntptime: *__library.get(b"rtsp_get_ntptime\0")?,
            __library,
        })
    }

    pub unsafe fn create_rtsp_demo(&self, port: c_int) -> rtsp_demo_handle {
        (self.create_rtsp_demo)(port)
    }

    pub unsafe fn rtsp_del_demo(&self, demo: rtsp_demo_handle) -> c_int {
        (self.rtsp_del_demo)(demo)
    }

    pub unsafe fn rtsp_new_session(
        &self,
        demo: rtsp_demo_handle,
        path: *const c_char,
    ) -> rtsp_session_handle {
        (self.rtsp_new_session)(demo, path)
    }

    pub unsafe fn rtsp_del_session(&self, session: rtsp_session_handle) -> c_int {
        (self.rtsp_del_session)(session)
    }

    pub unsafe fn rtsp_set_video(
        &self,
        session: rtsp_session_handle,
        codec_id: c_int,
        codec_data: *const u8,
        data_len: c_int,
    ) -> c_int {
        (self.rtsp_set_video)(session, codec_id, codec_data, data_len)
    }

    pub unsafe fn rtsp_sync_video_ts(
        &self,
        session: rtsp_session_handle,
        ts: u64,
        ntptime: u64,
    ) -> c_int {
        (self.rtsp_sync_video_ts)(session, ts, ntptime)
    }

    pub unsafe fn rtsp_tx_video(
        &self,
        session: rtsp_session_handle,
        frame: *const u8,
        len: c_int,
        ts: u64,
    ) -> c_int {
        (self.rtsp_tx_video)(session, frame, len, ts)
    }

    pub unsafe fn rtsp_do_event(&self, demo: rtsp_demo_handle) -> c_int {
        (self.rtsp_do_event)(demo)
    }

    pub unsafe fn rtsp_get_reltime(&self) -> u64 {
        (self.rtsp_get_reltime)()
    }

    pub unsafe fn rtsp_get_ntptime(&self) -> u64 {
        (self.rtsp_get_ntptime)()
    }
}

impl std::fmt::Debug for rtsp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("rtsp").finish_non_exhaustive()
    }
}

unsafe impl Send for rtsp {}
unsafe impl Sync for rtsp {}
