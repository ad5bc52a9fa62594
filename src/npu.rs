// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! NPU inference over the RKNN runtime.
//!
//! Independent of the video pipeline: the model is a batch transform with
//! a `set_input` / `run` / `read_output` contract, using the runtime's
//! zero-copy IO memory underneath. Quantization and post-processing
//! helpers are pure functions and build (and are tested) on any host;
//! only [`NpuModel`] itself needs the vendor runtime.

use crate::error::{Error, Result};

#[cfg(feature = "rockchip")]
use rockit_sys::rknn as sys;
#[cfg(feature = "rockchip")]
use tracing::debug;

/// Tensor element types exposed by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorType {
    Uint8,
    Int8,
    Int16,
    Int32,
    Int64,
    Float16,
    Float32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    Nchw,
    Nhwc,
    Nc1hwc2,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantizationType {
    None,
    Dfp,
    AffineAsymmetric,
}

/// Description of one model input or output tensor.
#[derive(Debug, Clone)]
pub struct TensorInfo {
    pub index: usize,
    pub name: String,
    pub dims: Vec<u32>,
    pub n_elems: usize,
    /// Tightly packed byte size.
    pub size: usize,
    /// Byte size including the runtime's stride padding; `set_input`
    /// expects exactly this many bytes.
    pub size_with_stride: usize,
    pub layout: TensorLayout,
    pub ty: TensorType,
    pub quantization: QuantizationType,
    pub zero_point: i32,
    pub scale: f32,
}

/// Affine-asymmetric dequantization: `(raw - zero_point) * scale`.
pub fn dequantize(raw: i8, zero_point: i32, scale: f32) -> f32 {
    (raw as f32 - zero_point as f32) * scale
}

/// Inverse of [`dequantize`], saturating at the i8 range.
pub fn quantize(value: f32, zero_point: i32, scale: f32) -> i8 {
    let q = value / scale + zero_point as f32;
    q.clamp(-128.0, 127.0) as i8
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|v| v / sum).collect()
}

/// Indices and scores of the `k` largest values, best first.
pub fn top_k(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut indexed: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    indexed.truncate(k);
    indexed
}

/// Validate an input buffer length against the stride-padded tensor size.
pub fn check_input_size(index: usize, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::InputSizeMismatch {
            index,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(feature = "rockchip")]
struct TensorBinding {
    attr: sys::rknn_tensor_attr,
    info: TensorInfo,
    mem: *mut sys::rknn_tensor_mem,
}

/// A loaded RKNN model with zero-copy IO memory bound.
#[cfg(feature = "rockchip")]
pub struct NpuModel {
    lib: sys::rknn,
    context: sys::rknn_context,
    inputs: Vec<TensorBinding>,
    outputs: Vec<TensorBinding>,
}

#[cfg(feature = "rockchip")]
impl NpuModel {
    /// Read a `.rknn` model file, initialize the runtime and allocate IO
    /// memory for every input and output tensor.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let mut model = std::fs::read(path)?;
        let lib = unsafe { sys::rknn::new(sys::RKNN_LIBRARY) }
            .map_err(|e| Error::VendorLibrary(e.to_string()))?;

        let mut context: sys::rknn_context = 0;
        let ret = unsafe {
            lib.rknn_init(
                &mut context,
                model.as_mut_ptr().cast(),
                model.len() as u32,
                0,
                std::ptr::null_mut(),
            )
        };
        if ret != sys::RKNN_SUCC {
            return Err(Error::Npu(ret));
        }

        let mut io_num = sys::rknn_input_output_num {
            n_input: 0,
            n_output: 0,
        };
        let ret = unsafe {
            lib.rknn_query(
                context,
                sys::RKNN_QUERY_IN_OUT_NUM,
                (&mut io_num as *mut sys::rknn_input_output_num).cast(),
                std::mem::size_of::<sys::rknn_input_output_num>() as u32,
            )
        };
        if ret != sys::RKNN_SUCC {
            unsafe { lib.rknn_destroy(context) };
            return Err(Error::Npu(ret));
        }

        let mut this = Self {
            lib,
            context,
            inputs: Vec::new(),
            outputs: Vec::new(),
        };

        for index in 0..io_num.n_input as usize {
            let binding = this.bind_tensor(index, sys::RKNN_QUERY_INPUT_ATTR)?;
            this.inputs.push(binding);
        }
        for index in 0..io_num.n_output as usize {
            let binding = this.bind_tensor(index, sys::RKNN_QUERY_OUTPUT_ATTR)?;
            this.outputs.push(binding);
        }

        debug!(
            inputs = this.inputs.len(),
            outputs = this.outputs.len(),
            "model loaded"
        );
        Ok(this)
    }

    fn bind_tensor(&self, index: usize, query: sys::rknn_query_cmd) -> Result<TensorBinding> {
        let mut attr: sys::rknn_tensor_attr = unsafe { std::mem::zeroed() };
        attr.index = index as u32;

        let ret = unsafe {
            self.lib.rknn_query(
                self.context,
                query,
                (&mut attr as *mut sys::rknn_tensor_attr).cast(),
                std::mem::size_of::<sys::rknn_tensor_attr>() as u32,
            )
        };
        if ret != sys::RKNN_SUCC {
            return Err(Error::Npu(ret));
        }

        let size = attr.size_with_stride.max(attr.size);
        let mem = unsafe { self.lib.rknn_create_mem(self.context, size) };
        if mem.is_null() {
            return Err(Error::Npu(sys::RKNN_ERR_MALLOC_FAIL));
        }

        let ret = unsafe { self.lib.rknn_set_io_mem(self.context, mem, &mut attr) };
        if ret != sys::RKNN_SUCC {
            unsafe { self.lib.rknn_destroy_mem(self.context, mem) };
            return Err(Error::Npu(ret));
        }

        Ok(TensorBinding {
            info: tensor_info(index, &attr),
            attr,
            mem,
        })
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn input_info(&self, index: usize) -> Result<&TensorInfo> {
        self.inputs
            .get(index)
            .map(|b| &b.info)
            .ok_or(Error::TensorIndex(index))
    }

    pub fn output_info(&self, index: usize) -> Result<&TensorInfo> {
        self.outputs
            .get(index)
            .map(|b| &b.info)
            .ok_or(Error::TensorIndex(index))
    }

    /// Whether any output carries affine-asymmetric quantization.
    pub fn is_quantized(&self) -> bool {
        self.outputs
            .iter()
            .any(|b| b.info.quantization == QuantizationType::AffineAsymmetric)
    }

    /// Copy `data` into input tensor `index`.
    ///
    /// The length must match the stride-padded input size exactly; a
    /// mismatch means the caller preprocessed for a different geometry.
    pub fn set_input(&mut self, index: usize, data: &[u8]) -> Result<()> {
        let binding = self.inputs.get(index).ok_or(Error::TensorIndex(index))?;
        check_input_size(index, binding.info.size_with_stride, data.len())?;
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                (*binding.mem).virt_addr.cast::<u8>(),
                data.len(),
            );
        }
        Ok(())
    }

    /// Execute one inference pass.
    pub fn run(&mut self) -> Result<()> {
        let ret = unsafe { self.lib.rknn_run(self.context, std::ptr::null_mut()) };
        if ret != sys::RKNN_SUCC {
            return Err(Error::Npu(ret));
        }
        Ok(())
    }

    /// Borrow output tensor `index` directly from the runtime's memory.
    ///
    /// This is the no-copy fast path; the borrow ends before the next
    /// `run` can disturb the data.
    pub fn output(&self, index: usize) -> Result<&[u8]> {
        let binding = self.outputs.get(index).ok_or(Error::TensorIndex(index))?;
        Ok(unsafe {
            std::slice::from_raw_parts(
                (*binding.mem).virt_addr.cast::<u8>(),
                binding.attr.size as usize,
            )
        })
    }

    /// Copy output tensor `index` into `buf`, returning the copied size.
    pub fn read_output(&self, index: usize, buf: &mut [u8]) -> Result<usize> {
        let data = self.output(index)?;
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }

    /// Output tensor `index` dequantized to f32 (copied through for
    /// float models).
    pub fn output_as_f32(&self, index: usize) -> Result<Vec<f32>> {
        let info = self.output_info(index)?.clone();
        let data = self.output(index)?;
        match (info.ty, info.quantization) {
            (TensorType::Int8, QuantizationType::AffineAsymmetric) => Ok(data
                .iter()
                .map(|&b| dequantize(b as i8, info.zero_point, info.scale))
                .collect()),
            (TensorType::Float32, _) => Ok(data
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect()),
            _ => Err(Error::Unsupported(format!(
                "output {} has unsupported type {:?}/{:?}",
                index, info.ty, info.quantization
            ))),
        }
    }
}

#[cfg(feature = "rockchip")]
impl Drop for NpuModel {
    fn drop(&mut self) {
        for binding in self.inputs.drain(..).chain(self.outputs.drain(..)) {
            unsafe { self.lib.rknn_destroy_mem(self.context, binding.mem) };
        }
        unsafe { self.lib.rknn_destroy(self.context) };
        debug!("model released");
    }
}

#[cfg(feature = "rockchip")]
fn tensor_info(index: usize, attr: &sys::rknn_tensor_attr) -> TensorInfo {
    let name_len = attr
        .name
        .iter()
        .position(|&c| c == 0)
        .unwrap_or(attr.name.len());
    let name = attr.name[..name_len]
        .iter()
        .map(|&c| c as u8 as char)
        .collect();

    TensorInfo {
        index,
        name,
        dims: attr.dims[..attr.n_dims.min(sys::RKNN_MAX_DIMS as u32) as usize].to_vec(),
        n_elems: attr.n_elems as usize,
        size: attr.size as usize,
        size_with_stride: attr.size_with_stride.max(attr.size) as usize,
        layout: match attr.fmt {
            sys::RKNN_TENSOR_NCHW => TensorLayout::Nchw,
            sys::RKNN_TENSOR_NHWC => TensorLayout::Nhwc,
            sys::RKNN_TENSOR_NC1HWC2 => TensorLayout::Nc1hwc2,
            _ => TensorLayout::Undefined,
        },
        ty: match attr.type_ {
            sys::RKNN_TENSOR_UINT8 => TensorType::Uint8,
            sys::RKNN_TENSOR_INT8 => TensorType::Int8,
            sys::RKNN_TENSOR_INT16 => TensorType::Int16,
            sys::RKNN_TENSOR_INT32 => TensorType::Int32,
            sys::RKNN_TENSOR_INT64 => TensorType::Int64,
            sys::RKNN_TENSOR_FLOAT16 => TensorType::Float16,
            _ => TensorType::Float32,
        },
        quantization: match attr.qnt_type {
            sys::RKNN_TENSOR_QNT_DFP => QuantizationType::Dfp,
            sys::RKNN_TENSOR_QNT_AFFINE_ASYMMETRIC => QuantizationType::AffineAsymmetric,
            _ => QuantizationType::None,
        },
        zero_point: attr.zp,
        scale: attr.scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dequantize_formula() {
        assert_eq!(dequantize(0, 0, 0.5), 0.0);
        assert_eq!(dequantize(10, 2, 0.5), 4.0);
        assert_eq!(dequantize(-128, -28, 0.1), -10.0);
    }

    #[test]
    fn quantize_saturates() {
        assert_eq!(quantize(4.0, 2, 0.5), 10);
        assert_eq!(quantize(1000.0, 0, 0.5), 127);
        assert_eq!(quantize(-1000.0, 0, 0.5), -128);
    }

    #[test]
    fn quantize_round_trips() {
        let (zp, scale) = (-28, 0.0392);
        for raw in [-128i8, -5, 0, 19, 127] {
            let back = quantize(dequantize(raw, zp, scale), zp, scale);
            assert!((raw as i32 - back as i32).abs() <= 1, "{raw} -> {back}");
        }
    }

    #[test]
    fn softmax_normalizes() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn softmax_handles_large_logits() {
        let probs = softmax(&[1000.0, 1000.0]);
        assert!((probs[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn top_k_orders_and_truncates() {
        let scores = [0.1, 0.9, 0.5, 0.3];
        let top = top_k(&scores, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0, 1);
        assert_eq!(top[1].0, 2);
    }

    #[test]
    fn top_k_with_short_input() {
        assert_eq!(top_k(&[0.4], 5).len(), 1);
    }

    #[test]
    fn input_size_must_match_exactly() {
        check_input_size(0, 100, 100).unwrap();
        let err = check_input_size(1, 224 * 224 * 3, 100).unwrap_err();
        assert!(matches!(
            err,
            Error::InputSizeMismatch {
                index: 1,
                actual: 100,
                ..
            }
        ));
    }
}
