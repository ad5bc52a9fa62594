// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Video encoder boundary: configuration, encoded packets and the
//! [`VideoEncoder`] trait the pipeline drives.
//!
//! Packet discipline is the load-bearing rule of the whole pipeline: every
//! packet obtained from `poll_stream` must be released back to the encoder
//! exactly once, even when transmission failed, or the encoder's internal
//! stream ring starves and subsequent polls stall. The hardware
//! implementation refuses to poll while a packet is outstanding.

use crate::error::{Error, Result};
use crate::frame::{Frame, PixelFormat};

/// Video codec produced by the encoder channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    H264,
    H265,
}

impl Codec {
    #[cfg(feature = "rockchip")]
    pub(crate) fn to_rk(self) -> rockit_sys::mpi::RK_CODEC_ID_E {
        match self {
            Codec::H264 => rockit_sys::mpi::RK_VIDEO_ID_AVC,
            Codec::H265 => rockit_sys::mpi::RK_VIDEO_ID_HEVC,
        }
    }
}

/// Hardware channel configuration.
///
/// `gop` of 1 makes every frame an instantaneous decode refresh, trading
/// compression efficiency for end-to-end latency; it is the default for
/// the live RTSP use case. The channel id is threaded through explicitly
/// so multiple pipelines never collide on an implicit global.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub channel_id: i32,
    pub codec: Codec,
    pub width: u32,
    pub height: u32,
    pub bitrate_kbps: u32,
    pub gop: u32,
    pub pixel_format: PixelFormat,
    pub stream_buf_count: u32,
}

impl EncoderConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            channel_id: 0,
            codec: Codec::H264,
            width,
            height,
            bitrate_kbps: 3072,
            gop: 1,
            pixel_format: PixelFormat::Bgr888,
            stream_buf_count: 2,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidConfig(
                "encoder resolution must be non-zero".into(),
            ));
        }
        if self.bitrate_kbps == 0 {
            return Err(Error::InvalidConfig("bitrate must be non-zero".into()));
        }
        if self.gop == 0 {
            return Err(Error::InvalidConfig("gop must be at least 1".into()));
        }
        if self.stream_buf_count < 1 {
            return Err(Error::InvalidConfig(
                "stream buffer count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
enum PacketData {
    /// Host-owned bytes (software and test encoders).
    Owned(Vec<u8>),
    /// A slot in the hardware stream ring, alive until released.
    #[cfg(feature = "rockchip")]
    Ring {
        stream: rockit_sys::mpi::VENC_STREAM_S,
        data: std::ptr::NonNull<u8>,
        len: usize,
    },
}

/// One encoded access unit.
///
/// Ring-backed packets reference encoder-internal memory and must go back
/// through [`VideoEncoder::release_packet`]; dropping one on the floor is
/// logged as a leak of a ring slot.
#[derive(Debug)]
pub struct EncodedPacket {
    data: Option<PacketData>,
    pts: u64,
    seq: u32,
}

impl EncodedPacket {
    /// Wrap host-owned bytes, e.g. from a software encoder.
    pub fn from_bytes(data: Vec<u8>, pts: u64, seq: u32) -> Self {
        Self {
            data: Some(PacketData::Owned(data)),
            pts,
            seq,
        }
    }

    #[cfg(feature = "rockchip")]
    pub(crate) fn from_ring(
        stream: rockit_sys::mpi::VENC_STREAM_S,
        data: std::ptr::NonNull<u8>,
        len: usize,
        pts: u64,
        seq: u32,
    ) -> Self {
        Self {
            data: Some(PacketData::Ring { stream, data, len }),
            pts,
            seq,
        }
    }

    pub fn data(&self) -> &[u8] {
        match self.data.as_ref().expect("packet accessed after release") {
            PacketData::Owned(bytes) => bytes,
            #[cfg(feature = "rockchip")]
            PacketData::Ring { data, len, .. } => unsafe {
                std::slice::from_raw_parts(data.as_ptr(), *len)
            },
        }
    }

    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Presentation timestamp inherited from the source frame.
    pub fn pts(&self) -> u64 {
        self.pts
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    #[cfg(feature = "rockchip")]
    pub(crate) fn take_ring(&mut self) -> Option<rockit_sys::mpi::VENC_STREAM_S> {
        match self.data.take() {
            Some(PacketData::Ring { stream, .. }) => Some(stream),
            other => {
                self.data = other;
                None
            }
        }
    }

    /// Retrieve host-owned bytes, `None` for ring-backed packets.
    pub fn take_owned(&mut self) -> Option<Vec<u8>> {
        match self.data.take() {
            Some(PacketData::Owned(bytes)) => Some(bytes),
            other => {
                self.data = other;
                None
            }
        }
    }
}

impl Drop for EncodedPacket {
    fn drop(&mut self) {
        #[cfg(feature = "rockchip")]
        if matches!(self.data, Some(PacketData::Ring { .. })) {
            tracing::warn!(seq = self.seq, "encoded packet dropped without release");
        }
    }
}

/// One hardware (or mock) encoding channel.
pub trait VideoEncoder {
    /// Hand a frame to the channel, zero-copy. A rejection signals a
    /// configuration bug (dimension or format mismatch) and is fatal to
    /// the pipeline.
    fn submit_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Try to retrieve one encoded packet.
    ///
    /// `timeout_us < 0` blocks until data or channel teardown; a bounded
    /// timeout keeps a live pipeline responsive. `Ok(None)` is the normal
    /// backpressure outcome, not an error.
    fn poll_stream(&mut self, timeout_us: i64) -> Result<Option<EncodedPacket>>;

    /// Return a packet's buffer to the encoder. Must be called exactly
    /// once per packet obtained from `poll_stream`, even if transmission
    /// failed.
    fn release_packet(&mut self, packet: EncodedPacket) -> Result<()>;

    /// Stop reception and destroy the channel. Idempotent.
    fn close(&mut self) -> Result<()>;
}

impl<E: VideoEncoder + ?Sized> VideoEncoder for Box<E> {
    fn submit_frame(&mut self, frame: &Frame) -> Result<()> {
        (**self).submit_frame(frame)
    }

    fn poll_stream(&mut self, timeout_us: i64) -> Result<Option<EncodedPacket>> {
        (**self).poll_stream(timeout_us)
    }

    fn release_packet(&mut self, packet: EncodedPacket) -> Result<()> {
        (**self).release_packet(packet)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = EncoderConfig::new(720, 480);
        assert_eq!(config.gop, 1);
        assert_eq!(config.bitrate_kbps, 3072);
        assert_eq!(config.codec, Codec::H264);
        config.validate().unwrap();
    }

    #[test]
    fn config_rejects_zero_gop() {
        let config = EncoderConfig {
            gop: 0,
            ..EncoderConfig::new(720, 480)
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn owned_packet_round_trip() {
        let mut packet = EncodedPacket::from_bytes(vec![1, 2, 3], 99, 7);
        assert_eq!(packet.data(), &[1, 2, 3]);
        assert_eq!(packet.pts(), 99);
        assert_eq!(packet.seq(), 7);
        assert_eq!(packet.take_owned().unwrap(), vec![1, 2, 3]);
    }
}
