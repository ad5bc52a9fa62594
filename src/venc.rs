// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Hardware encoder channel over the Rockit VENC API.
//!
//! Channel lifecycle: create + start reception in [`VencChannel::open`]
//! (a reception failure rolls the channel create back, so a `VencChannel`
//! that exists is always receiving), then `submit_frame`/`poll_stream`/
//! `release_packet` per tick, then `close` (or drop) stops reception and
//! destroys the channel.

use crate::encoder::{EncodedPacket, EncoderConfig, VideoEncoder};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::mpi::MpiSystem;
use rockit_sys::mpi::{
    VENC_CHN_ATTR_S, VENC_PACK_S, VENC_RC_MODE_H264CBR, VENC_RC_MODE_H265CBR,
    VENC_RECV_PIC_PARAM_S, VENC_STREAM_S, VIDEO_FRAME_INFO_S, H264E_PROFILE_MAIN, MIRROR_NONE,
};
use rockit_sys::RK_SUCCESS;
use std::ptr::NonNull;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::encoder::Codec;

/// Build the vendor channel attribute block from a validated config.
///
/// The stream buffer is sized for a compressed output bound of
/// `width * height * 3 / 2` bytes, the vendor-recommended figure for CBR
/// H.264/H.265 at these resolutions.
pub(crate) fn channel_attr(config: &EncoderConfig) -> VENC_CHN_ATTR_S {
    let mut attr: VENC_CHN_ATTR_S = unsafe { std::mem::zeroed() };

    attr.stVencAttr.enType = config.codec.to_rk();
    attr.stVencAttr.enPixelFormat = config.pixel_format.to_rk();
    attr.stVencAttr.u32Profile = H264E_PROFILE_MAIN;
    attr.stVencAttr.u32PicWidth = config.width;
    attr.stVencAttr.u32PicHeight = config.height;
    attr.stVencAttr.u32VirWidth = config.width;
    attr.stVencAttr.u32VirHeight = config.height;
    attr.stVencAttr.u32StreamBufCnt = config.stream_buf_count;
    attr.stVencAttr.u32BufSize = config.width * config.height * 3 / 2;
    attr.stVencAttr.enMirror = MIRROR_NONE;

    attr.stRcAttr.enRcMode = match config.codec {
        Codec::H264 => VENC_RC_MODE_H264CBR,
        Codec::H265 => VENC_RC_MODE_H265CBR,
    };
    attr.stRcAttr.__bindgen_anon_1.stH264Cbr = rockit_sys::mpi::VENC_H264_CBR_S {
        u32Gop: config.gop,
        u32BitRate: config.bitrate_kbps,
    };

    attr
}

/// Translate a frame descriptor for the vendor API.
///
/// The frame must reference a DMA pool block and match the channel's
/// configured geometry and pixel ordering; a mismatch is a configuration
/// bug, not a transient condition.
pub(crate) fn video_frame_info(
    config: &EncoderConfig,
    frame: &Frame,
) -> Result<VIDEO_FRAME_INFO_S> {
    let Some(blk) = frame.block().mb_handle() else {
        return Err(Error::FrameNotDmaBacked);
    };
    if frame.format() != config.pixel_format {
        return Err(Error::PixelFormatMismatch {
            frame: frame.format().to_string(),
            channel: config.pixel_format.to_string(),
        });
    }
    if frame.width() != config.width || frame.height() != config.height {
        return Err(Error::InvalidConfig(format!(
            "frame {}x{} does not match channel {}x{}",
            frame.width(),
            frame.height(),
            config.width,
            config.height
        )));
    }

    let mut info: VIDEO_FRAME_INFO_S = unsafe { std::mem::zeroed() };
    info.stVFrame.u32Width = frame.width();
    info.stVFrame.u32Height = frame.height();
    info.stVFrame.u32VirWidth = frame.vir_width();
    info.stVFrame.u32VirHeight = frame.vir_height();
    info.stVFrame.enPixelFormat = frame.format().to_rk();
    info.stVFrame.u32TimeRef = frame.index();
    info.stVFrame.u64PTS = frame.pts();
    info.stVFrame.pMbBlk = blk;
    Ok(info)
}

fn timeout_ms(timeout_us: i64) -> i32 {
    if timeout_us < 0 {
        -1
    } else {
        // Vendor timeouts are in milliseconds; round a sub-millisecond
        // poll up so it still bounds the wait instead of busy-spinning.
        ((timeout_us + 999) / 1000) as i32
    }
}

pub struct VencChannel {
    mpi: Arc<MpiSystem>,
    config: EncoderConfig,
    channel: Option<i32>,
    pack: Box<VENC_PACK_S>,
    outstanding: bool,
}

impl VencChannel {
    /// Create the channel and enable continuous frame reception.
    pub fn open(mpi: Arc<MpiSystem>, config: EncoderConfig) -> Result<Self> {
        config.validate()?;
        let attr = channel_attr(&config);

        let ret = unsafe { mpi.lib().RK_MPI_VENC_CreateChn(config.channel_id, &attr) };
        if ret != RK_SUCCESS {
            return Err(Error::ChannelCreate {
                channel: config.channel_id,
                code: ret,
            });
        }

        let recv = VENC_RECV_PIC_PARAM_S {
            s32RecvPicNum: -1, // continuous reception
        };
        let ret = unsafe { mpi.lib().RK_MPI_VENC_StartRecvFrame(config.channel_id, &recv) };
        if ret != RK_SUCCESS {
            unsafe { mpi.lib().RK_MPI_VENC_DestroyChn(config.channel_id) };
            return Err(Error::ReceiveStart {
                channel: config.channel_id,
                code: ret,
            });
        }

        debug!(
            channel = config.channel_id,
            width = config.width,
            height = config.height,
            bitrate_kbps = config.bitrate_kbps,
            gop = config.gop,
            "encoder channel open"
        );

        let channel = Some(config.channel_id);
        Ok(Self {
            mpi,
            config,
            channel,
            pack: Box::new(unsafe { std::mem::zeroed() }),
            outstanding: false,
        })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    fn channel(&self) -> Result<i32> {
        self.channel
            .ok_or_else(|| Error::InvalidConfig("encoder channel is closed".into()))
    }
}

impl VideoEncoder for VencChannel {
    fn submit_frame(&mut self, frame: &Frame) -> Result<()> {
        let channel = self.channel()?;
        let info = video_frame_info(&self.config, frame)?;
        let ret = unsafe { self.mpi.lib().RK_MPI_VENC_SendFrame(channel, &info, -1) };
        if ret != RK_SUCCESS {
            return Err(Error::EncodeSubmit(ret));
        }
        Ok(())
    }

    fn poll_stream(&mut self, timeout_us: i64) -> Result<Option<EncodedPacket>> {
        let channel = self.channel()?;
        if self.outstanding {
            return Err(Error::PacketOutstanding);
        }

        let mut stream: VENC_STREAM_S = unsafe { std::mem::zeroed() };
        stream.pstPack = &mut *self.pack;
        stream.u32PackCount = 1;

        let ret = unsafe {
            self.mpi
                .lib()
                .RK_MPI_VENC_GetStream(channel, &mut stream, timeout_ms(timeout_us))
        };
        if ret != RK_SUCCESS {
            // With a bounded timeout an empty poll is normal backpressure;
            // a blocking poll only returns non-success on teardown.
            if timeout_us >= 0 {
                return Ok(None);
            }
            return Err(Error::StreamPoll(ret));
        }

        let pack = &*self.pack;
        let vaddr = unsafe { self.mpi.lib().RK_MPI_MB_Handle2VirAddr(pack.pMbBlk) };
        let Some(data) = NonNull::new(vaddr.cast::<u8>()) else {
            unsafe { self.mpi.lib().RK_MPI_VENC_ReleaseStream(channel, &mut stream) };
            return Err(Error::StreamPoll(ret));
        };

        self.outstanding = true;
        Ok(Some(EncodedPacket::from_ring(
            stream,
            data,
            pack.u32Len as usize,
            pack.u64PTS,
            pack.u32SeqNum,
        )))
    }

    fn release_packet(&mut self, mut packet: EncodedPacket) -> Result<()> {
        let channel = self.channel()?;
        let Some(mut stream) = packet.take_ring() else {
            return Err(Error::ForeignPacket);
        };
        // Whatever the vendor says, the slot is no longer ours to read;
        // let the next poll proceed and leave escalation to the caller.
        self.outstanding = false;

        let ret = unsafe { self.mpi.lib().RK_MPI_VENC_ReleaseStream(channel, &mut stream) };
        if ret != RK_SUCCESS {
            return Err(Error::StreamRelease(ret));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(channel) = self.channel.take() {
            let ret = unsafe { self.mpi.lib().RK_MPI_VENC_StopRecvFrame(channel) };
            if ret != RK_SUCCESS {
                warn!(channel, code = format!("{ret:#x}"), "stop receive failed");
            }
            let ret = unsafe { self.mpi.lib().RK_MPI_VENC_DestroyChn(channel) };
            if ret != RK_SUCCESS {
                warn!(channel, code = format!("{ret:#x}"), "channel destroy failed");
            }
            debug!(channel, "encoder channel closed");
        }
        Ok(())
    }
}

impl Drop for VencChannel {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;
    use crate::pool::MemoryPool;

    #[test]
    fn attr_mirrors_config() {
        let config = EncoderConfig::new(720, 480);
        let attr = channel_attr(&config);
        assert_eq!(attr.stVencAttr.u32PicWidth, 720);
        assert_eq!(attr.stVencAttr.u32VirHeight, 480);
        assert_eq!(attr.stVencAttr.u32StreamBufCnt, 2);
        assert_eq!(attr.stVencAttr.u32BufSize, 720 * 480 * 3 / 2);
        assert_eq!(attr.stRcAttr.enRcMode, VENC_RC_MODE_H264CBR);
        let cbr = unsafe { attr.stRcAttr.__bindgen_anon_1.stH264Cbr };
        assert_eq!(cbr.u32BitRate, 3072);
        assert_eq!(cbr.u32Gop, 1);
    }

    #[test]
    fn heap_frame_is_rejected() {
        let pool = MemoryPool::with_heap(720 * 480 * 3, 1).unwrap();
        let frame = Frame::new(
            pool.acquire_block(true).unwrap(),
            720,
            480,
            PixelFormat::Bgr888,
        )
        .unwrap();
        let config = EncoderConfig::new(720, 480);
        assert!(matches!(
            video_frame_info(&config, &frame),
            Err(Error::FrameNotDmaBacked)
        ));
    }

    #[test]
    fn timeout_conversion() {
        assert_eq!(timeout_ms(-1), -1);
        assert_eq!(timeout_ms(0), 0);
        assert_eq!(timeout_ms(1000), 1);
        assert_eq!(timeout_ms(1500), 2);
    }
}
