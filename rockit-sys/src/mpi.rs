// SPDX-License-Identifier: AGPL-3.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Bindings for the Rockit MPI core: system init, media-buffer (MB) pools
//! and the VENC hardware encoder channels (`rk_mpi_sys.h`, `rk_mpi_mb.h`,
//! `rk_mpi_venc.h` and the structures they pull in).

use crate::{RK_BOOL, RK_S32, RK_U32, RK_U64};
use libloading::Library;
use std::ffi::{c_uint, c_void, OsStr};

/// Default library name on the target root filesystem.
pub const ROCKIT_LIBRARY: &str = "librockit.so";

/// Opaque media-buffer block handle.
pub type MB_BLK = *mut c_void;

/// Media-buffer pool id.
pub type MB_POOL = RK_U32;

pub const MB_INVALID_POOLID: MB_POOL = u32::MAX;

pub type MB_ALLOC_TYPE_E = c_uint;
pub const MB_ALLOC_TYPE_DMA: MB_ALLOC_TYPE_E = 0;
pub const MB_ALLOC_TYPE_MALLOC: MB_ALLOC_TYPE_E = 1;

pub type MB_REMAP_MODE_E = c_uint;
pub const MB_REMAP_MODE_NONE: MB_REMAP_MODE_E = 0;
pub const MB_REMAP_MODE_CACHED: MB_REMAP_MODE_E = 1;
pub const MB_REMAP_MODE_NOCACHE: MB_REMAP_MODE_E = 2;

pub type MB_DMA_TYPE_E = c_uint;
pub const MB_DMA_TYPE_NONE: MB_DMA_TYPE_E = 0;
pub const MB_DMA_TYPE_CMA: MB_DMA_TYPE_E = 1;

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct MB_POOL_CONFIG_S {
    pub u64MBSize: RK_U64,
    pub u32MBCnt: RK_U32,
    pub enAllocType: MB_ALLOC_TYPE_E,
    pub enRemapMode: MB_REMAP_MODE_E,
    pub enDmaType: MB_DMA_TYPE_E,
    pub bPreAlloc: RK_BOOL,
}

pub type PIXEL_FORMAT_E = c_uint;
pub const RK_FMT_YUV420SP: PIXEL_FORMAT_E = 0;
pub const RK_FMT_YUV422SP: PIXEL_FORMAT_E = 2;
pub const RK_FMT_YUV422_YUYV: PIXEL_FORMAT_E = 8;
pub const RK_FMT_YUV422_UYVY: PIXEL_FORMAT_E = 9;
pub const RK_FMT_RGB565: PIXEL_FORMAT_E = 17;
pub const RK_FMT_BGR565: PIXEL_FORMAT_E = 18;
pub const RK_FMT_RGB888: PIXEL_FORMAT_E = 23;
pub const RK_FMT_BGR888: PIXEL_FORMAT_E = 24;

pub type RK_CODEC_ID_E = c_uint;
pub const RK_VIDEO_ID_Unused: RK_CODEC_ID_E = 0;
pub const RK_VIDEO_ID_AVC: RK_CODEC_ID_E = 8;
pub const RK_VIDEO_ID_MJPEG: RK_CODEC_ID_E = 9;
pub const RK_VIDEO_ID_HEVC: RK_CODEC_ID_E = 12;

pub type MIRROR_E = c_uint;
pub const MIRROR_NONE: MIRROR_E = 0;
pub const MIRROR_HORIZONTAL: MIRROR_E = 1;
pub const MIRROR_VERTICAL: MIRROR_E = 2;
pub const MIRROR_BOTH: MIRROR_E = 3;

pub const H264E_PROFILE_BASELINE: RK_U32 = 66;
pub const H264E_PROFILE_MAIN: RK_U32 = 77;
pub const H264E_PROFILE_HIGH: RK_U32 = 100;

/// Encoder channel id.
pub type VENC_CHN = RK_S32;

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct VENC_ATTR_S {
    pub enType: RK_CODEC_ID_E,
    pub enPixelFormat: PIXEL_FORMAT_E,
    pub u32Profile: RK_U32,
    pub u32PicWidth: RK_U32,
    pub u32PicHeight: RK_U32,
    pub u32VirWidth: RK_U32,
    pub u32VirHeight: RK_U32,
    pub u32StreamBufCnt: RK_U32,
    pub u32BufSize: RK_U32,
    pub enMirror: MIRROR_E,
    pub u32Reserved: [RK_U32; 4],
}

pub type VENC_RC_MODE_E = c_uint;
pub const VENC_RC_MODE_H264CBR: VENC_RC_MODE_E = 1;
pub const VENC_RC_MODE_H264VBR: VENC_RC_MODE_E = 2;
pub const VENC_RC_MODE_H264AVBR: VENC_RC_MODE_E = 3;
pub const VENC_RC_MODE_H265CBR: VENC_RC_MODE_E = 5;
pub const VENC_RC_MODE_H265VBR: VENC_RC_MODE_E = 6;

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct VENC_H264_CBR_S {
    pub u32Gop: RK_U32,
    pub u32BitRate: RK_U32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct VENC_H264_VBR_S {
    pub u32Gop: RK_U32,
    pub u32BitRate: RK_U32,
    pub u32MaxBitRate: RK_U32,
    pub u32MinBitRate: RK_U32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct VENC_H265_CBR_S {
    pub u32Gop: RK_U32,
    pub u32BitRate: RK_U32,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub union VENC_RC_ATTR_S__bindgen_ty_1 {
    pub stH264Cbr: VENC_H264_CBR_S,
    pub stH264Vbr: VENC_H264_VBR_S,
    pub stH265Cbr: VENC_H265_CBR_S,
    pub au32Reserved: [RK_U32; 8],
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct VENC_RC_ATTR_S {
    pub enRcMode: VENC_RC_MODE_E,
    pub __bindgen_anon_1: VENC_RC_ATTR_S__bindgen_ty_1,
}

pub type VENC_GOP_MODE_E = c_uint;
pub const VENC_GOPMODE_NORMALP: VENC_GOP_MODE_E = 0;
pub const VENC_GOPMODE_TSVC: VENC_GOP_MODE_E = 1;
pub const VENC_GOPMODE_SMARTP: VENC_GOP_MODE_E = 2;

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct VENC_GOP_ATTR_S {
    pub enGopMode: VENC_GOP_MODE_E,
    pub s32VirIdrLen: RK_S32,
    pub u32MaxLtrCount: RK_U32,
    pub u32Reserved: [RK_U32; 4],
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct VENC_CHN_ATTR_S {
    pub stVencAttr: VENC_ATTR_S,
    pub stRcAttr: VENC_RC_ATTR_S,
    pub stGopAttr: VENC_GOP_ATTR_S,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct VENC_RECV_PIC_PARAM_S {
    pub s32RecvPicNum: RK_S32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct VIDEO_FRAME_S {
    pub u32Width: RK_U32,
    pub u32Height: RK_U32,
    pub u32VirWidth: RK_U32,
    pub u32VirHeight: RK_U32,
    pub enPixelFormat: PIXEL_FORMAT_E,
    pub u32TimeRef: RK_U32,
    pub u64PTS: RK_U64,
    pub u32FrameFlag: RK_U32,
    pub pMbBlk: MB_BLK,
    pub u32Reserved: [RK_U32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct VIDEO_FRAME_INFO_S {
    pub stVFrame: VIDEO_FRAME_S,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub union VENC_PACK_S__bindgen_ty_1 {
    pub enH264EType: c_uint,
    pub enH265EType: c_uint,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct VENC_PACK_S {
    pub pMbBlk: MB_BLK,
    pub u32Len: RK_U32,
    pub u64PTS: RK_U64,
    pub u32Offset: RK_U32,
    pub u32SeqNum: RK_U32,
    pub DataType: VENC_PACK_S__bindgen_ty_1,
    pub u32Reserved: [RK_U32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct VENC_STREAM_S {
    pub pstPack: *mut VENC_PACK_S,
    pub u32PackCount: RK_U32,
    pub u32Seq: RK_U32,
    pub u32Reserved: [RK_U32; 2],
}

/// Dynamically loaded `librockit.so`.
pub struct rockit {
    __library: Library,
    RK_MPI_SYS_Init: unsafe extern "C" fn() -> RK_S32,
    RK_MPI_SYS_Exit: unsafe extern "C" fn() -> RK_S32,
    RK_MPI_MB_CreatePool: unsafe extern "C" fn(*mut MB_POOL_CONFIG_S) -> MB_POOL,
    RK_MPI_MB_DestroyPool: unsafe extern "C" fn(MB_POOL) -> RK_S32,
    RK_MPI_MB_GetMB: unsafe extern "C" fn(MB_POOL, RK_U64, RK_BOOL) -> MB_BLK,
    RK_MPI_MB_ReleaseMB: unsafe extern "C" fn(MB_BLK) -> RK_S32,
    RK_MPI_MB_Handle2VirAddr: unsafe extern "C" fn(MB_BLK) -> *mut c_void,
    RK_MPI_VENC_CreateChn: unsafe extern "C" fn(VENC_CHN, *const VENC_CHN_ATTR_S) -> RK_S32,
    RK_MPI_VENC_DestroyChn: unsafe extern "C" fn(VENC_CHN) -> RK_S32,
    RK_MPI_VENC_StartRecvFrame:
        unsafe extern "C" fn(VENC_CHN, *const VENC_RECV_PIC_PARAM_S) -> RK_S32,
    RK_MPI_VENC_StopRecvFrame: unsafe extern "C" fn(VENC_CHN) -> RK_S32,
    RK_MPI_VENC_SendFrame:
        unsafe extern "C" fn(VENC_CHN, *const VIDEO_FRAME_INFO_S, RK_S32) -> RK_S32,
    RK_MPI_VENC_GetStream: unsafe extern "C" fn(VENC_CHN, *mut VENC_STREAM_S, RK_S32) -> RK_S32,
    RK_MPI_VENC_ReleaseStream: unsafe extern "C" fn(VENC_CHN, *mut VENC_STREAM_S) -> RK_S32,
}

impl rockit {
    /// Load the library and resolve every bound symbol.
    ///
    /// # Safety
    ///
    /// The file at `path` must be the Rockit MPI library matching the
    /// declarations in this module.
    pub unsafe fn new<P: AsRef<OsStr>>(path: P) -> Result<Self, libloading::Error> {
        let __library = Library::new(path)?;
        Ok(Self {
            RK_MPI_SYS_Init: *__library.get(b"RK_MPI_SYS_Init\0")?,
            RK_MPI_SYS_Exit: *__library.get(b"RK_MPI_SYS_Exit\0")?,
            RK_MPI_MB_CreatePool: *__library.get(b"RK_MPI_MB_CreatePool\0")?,
            RK_MPI_MB_DestroyPool: *__library.get(b"RK_MPI_MB_DestroyPool\0")?,
            RK_MPI_MB_GetMB: *__library.get(b"RK_MPI_MB_GetMB\0")?,
            RK_MPI_MB_ReleaseMB: *__library.get(b"RK_MPI_MB_ReleaseMB\0")?,
            RK_MPI_MB_Handle2VirAddr: *__library.get(b"RK_MPI_MB_Handle2VirAddr\0")?,
            RK_MPI_VENC_CreateChn: *__library.get(b"RK_MPI_VENC_CreateChn\0")?,
            RK_MPI_VENC_DestroyChn: *__library.get(b"RK_MPI_VENC_DestroyChn\0")?,
            RK_MPI_VENC_StartRecvFrame: *__library.get(b"RK_MPI_VENC_StartRecvFrame\0")?,
            RK_MPI_VENC_StopRecvFrame: *__library.get(b"RK_MPI_VENC_StopRecvFrame\0")?,
            RK_MPI_VENC_SendFrame: *__library.get(b"RK_MPI_VENC_SendFrame\0")?,
            RK_MPI_VENC_GetStream: *__library.get(b"RK_MPI_VENC_GetStream\0")?,
            RK_MPI_VENC_ReleaseStream: *__library.get(b"RK_MPI_VENC_ReleaseStream\0")?,
            __library,
        })
    }

    pub unsafe fn RK_MPI_SYS_Init(&self) -> RK_S32 {
        (self.RK_MPI_SYS_Init)()
    }

    pub unsafe fn RK_MPI_SYS_Exit(&self) -> RK_S32 {
        (self.RK_MPI_SYS_Exit)()
    }

    pub unsafe fn RK_MPI_MB_CreatePool(&self, pstPoolConfig: *mut MB_POOL_CONFIG_S) -> MB_POOL {
        (self.RK_MPI_MB_CreatePool)(pstPoolConfig)
    }

    pub unsafe fn RK_MPI_MB_DestroyPool(&self, Pool: MB_POOL) -> RK_S32 {
        (self.RK_MPI_MB_DestroyPool)(Pool)
    }

    pub unsafe fn RK_MPI_MB_GetMB(&self, Pool: MB_POOL, u64Size: RK_U64, bCached: RK_BOOL) -> MB_BLK {
        (self.RK_MPI_MB_GetMB)(Pool, u64Size, bCached)
    }

    pub unsafe fn RK_MPI_MB_ReleaseMB(&self, Block: MB_BLK) -> RK_S32 {
        (self.RK_MPI_MB_ReleaseMB)(Block)
    }

    pub unsafe fn RK_MPI_MB_Handle2VirAddr(&self, Block: MB_BLK) -> *mut c_void {
        (self.RK_MPI_MB_Handle2VirAddr)(Block)
    }

    pub unsafe fn RK_MPI_VENC_CreateChn(
        &self,
        VeChn: VENC_CHN,
        pstAttr: *const VENC_CHN_ATTR_S,
    ) -> RK_S32 {
        (self.RK_MPI_VENC_CreateChn)(VeChn, pstAttr)
    }

    pub unsafe fn RK_MPI_VENC_DestroyChn(&self, VeChn: VENC_CHN) -> RK_S32 {
        (self.RK_MPI_VENC_DestroyChn)(VeChn)
    }

    pub unsafe fn RK_MPI_VENC_StartRecvFrame(
        &self,
        VeChn: VENC_CHN,
        pstRecvParam: *const VENC_RECV_PIC_PARAM_S,
    ) -> RK_S32 {
        (self.RK_MPI_VENC_StartRecvFrame)(VeChn, pstRecvParam)
    }

    pub unsafe fn RK_MPI_VENC_StopRecvFrame(&self, VeChn: VENC_CHN) -> RK_S32 {
        (self.RK_MPI_VENC_StopRecvFrame)(VeChn)
    }

    pub unsafe fn RK_MPI_VENC_SendFrame(
        &self,
        VeChn: VENC_CHN,
        pstFrame: *const VIDEO_FRAME_INFO_S,
        s32MilliSec: RK_S32,
    ) -> RK_S32 {
        (self.RK_MPI_VENC_SendFrame)(VeChn, pstFrame, s32MilliSec)
    }

    pub unsafe fn RK_MPI_VENC_GetStream(
        &self,
        VeChn: VENC_CHN,
        pstStream: *mut VENC_STREAM_S,
        s32MilliSec: RK_S32,
    ) -> RK_S32 {
        (self.RK_MPI_VENC_GetStream)(VeChn, pstStream, s32MilliSec)
    }

    pub unsafe fn RK_MPI_VENC_ReleaseStream(
        &self,
        VeChn: VENC_CHN,
        pstStream: *mut VENC_STREAM_S,
    ) -> RK_S32 {
        (self.RK_MPI_VENC_ReleaseStream)(VeChn, pstStream)
    }
}

impl std::fmt::Debug for rockit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("rockit").finish_non_exhaustive()
    }
}

// The function pointers are resolved once at load time and never mutated.
unsafe impl Send for rockit {}
unsafe impl Sync for rockit {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chn_attr_is_zeroable() {
        // The SDK expects attribute structs memset to zero before the used
        // fields are filled in.
        let attr: VENC_CHN_ATTR_S = unsafe { std::mem::zeroed() };
        assert_eq!(attr.stVencAttr.u32PicWidth, 0);
        assert_eq!(attr.stRcAttr.enRcMode, 0);
    }

    #[test]
    fn pack_union_access() {
        let mut pack: VENC_PACK_S = unsafe { std::mem::zeroed() };
        pack.DataType.enH264EType = 5;
        assert_eq!(unsafe { pack.DataType.enH264EType }, 5);
    }
}
