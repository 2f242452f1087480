//! Spatial pose codec
//!
//! A pose is nine floats (scale, Euler rotation, translation) that travel as
//! nine 16-bit fixed-point integers. Quantization multiplies by the protocol
//! constant [`POSE_QUANTIZATION_SCALE`] and truncates toward zero; both ends
//! must use the same constant or poses will decode at the wrong magnitude.
//!
//! The mapping is lossy and unchecked. Magnitudes beyond
//! [`POSE_MAX_MAGNITUDE`] wrap around in the 16-bit field instead of failing.

use crate::error::NetError;
use crate::stream::BitStream;
use serde::{Deserialize, Serialize};

/// Fixed-point scale factor, √2 × 511. Applied in double precision on both
/// ends so every float maps to the same 16-bit value.
pub const POSE_QUANTIZATION_SCALE: f64 = std::f64::consts::SQRT_2 * 511.0;

/// Decoding resolution of one fixed-point unit.
pub const POSE_QUANTIZATION_STEP: f32 = (1.0 / POSE_QUANTIZATION_SCALE) as f32;

/// Largest magnitude that fits the 16-bit field without wrapping.
pub const POSE_MAX_MAGNITUDE: f32 = (i16::MAX as f64 / POSE_QUANTIZATION_SCALE) as f32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialPose {
    /// Non-uniform scale
    pub scale: [f32; 3],
    /// Orientation as Euler angles
    pub rotate: [f32; 3],
    pub translate: [f32; 3],

    pub comp_scale: [i16; 3],
    pub comp_rotate: [i16; 3],
    pub comp_translate: [i16; 3],
}

impl SpatialPose {
    pub fn new(scale: [f32; 3], rotate: [f32; 3], translate: [f32; 3]) -> Self {
        Self {
            scale,
            rotate,
            translate,
            ..Self::default()
        }
    }

    /// Unit scale at the origin with no rotation.
    pub fn identity() -> Self {
        Self::new([1.0; 3], [0.0; 3], [0.0; 3])
    }

    /// Reads the compressed fields in scale, rotate, translate order.
    pub fn read(&mut self, stream: &mut BitStream) -> Result<(), NetError> {
        let scale = stream.read()?;
        let rotate = stream.read()?;
        let translate = stream.read()?;
        self.comp_scale = scale;
        self.comp_rotate = rotate;
        self.comp_translate = translate;
        Ok(())
    }

    /// Writes the compressed fields in scale, rotate, translate order.
    pub fn write(&self, stream: &mut BitStream) -> Result<(), NetError> {
        stream.write(&self.comp_scale)?;
        stream.write(&self.comp_rotate)?;
        stream.write(&self.comp_translate)?;
        Ok(())
    }

    /// Quantizes the float fields into the compressed fields.
    pub fn compress(&mut self) {
        for axis in 0..3 {
            self.comp_scale[axis] = quantize(self.scale[axis]);
            self.comp_rotate[axis] = quantize(self.rotate[axis]);
            self.comp_translate[axis] = quantize(self.translate[axis]);
        }
    }

    /// Restores the float fields from the compressed fields.
    pub fn decompress(&mut self) {
        for axis in 0..3 {
            self.scale[axis] = dequantize(self.comp_scale[axis]);
            self.rotate[axis] = dequantize(self.comp_rotate[axis]);
            self.translate[axis] = dequantize(self.comp_translate[axis]);
        }
    }

    /// Compresses then writes the pose.
    pub fn compress_into(&mut self, stream: &mut BitStream) -> Result<(), NetError> {
        self.compress();
        self.write(stream)
    }

    /// Reads then decompresses a pose. On a short read the pose is untouched.
    pub fn decompress_from(&mut self, stream: &mut BitStream) -> Result<(), NetError> {
        self.read(stream)?;
        self.decompress();
        Ok(())
    }
}

/// Truncates toward zero and wraps into 16 bits. The product is formed as
/// `value * √2 * 511`, left to right, in `f64`.
fn quantize(value: f32) -> i16 {
    (f64::from(value) * std::f64::consts::SQRT_2 * 511.0) as i32 as i16
}

fn dequantize(value: i16) -> f32 {
    (f64::from(value) / POSE_QUANTIZATION_SCALE) as f32
}
