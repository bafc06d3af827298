//! Quantized model binary format (CQ16/CQ24)
//!
//! A model image is a fixed 152-byte header, followed by one 64-byte
//! header per layer, followed by the contiguous weight/bias payloads at
//! the offsets recorded per layer. All integers are little-endian. The
//! header carries both the source and quantized model hashes and a
//! 32-byte back-reference to the certificate that attests this image.

use crate::analyze::LayerType;
use crate::convert::TensorSpec;
use crate::dvm::{Fixed16, FixedFormat};
use crate::error::{Error, Result};
use crate::hash::{sha256, DIGEST_LEN};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Serialized model header length.
pub const MODEL_HEADER_LEN: usize = 152;
/// Serialized per-layer header length.
pub const LAYER_HEADER_LEN: usize = 64;
/// Model format version.
pub const MODEL_VERSION: u32 = 1;

/// Magic for a Q16.16 model image.
pub const MAGIC_Q16: [u8; 4] = *b"CQ16";
/// Magic for a Q8.24 model image.
pub const MAGIC_Q24: [u8; 4] = *b"CQ24";

/// Magic bytes for a storage format.
pub fn magic_for(format: FixedFormat) -> [u8; 4] {
    match format {
        FixedFormat::Q8_24 => MAGIC_Q24,
        _ => MAGIC_Q16,
    }
}

/// Per-layer header describing specs, shape, and payload placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct LayerHeader {
    pub layer_index: u32,
    pub layer_type: LayerType,
    pub weight_spec: TensorSpec,
    pub input_spec: TensorSpec,
    pub bias_spec: TensorSpec,
    pub output_spec: TensorSpec,
    pub weight_rows: u32,
    pub weight_cols: u32,
    pub bias_len: u32,
    /// Byte offset of the weight payload within the model image
    pub weight_offset: u64,
    /// Byte offset of the bias payload within the model image
    pub bias_offset: u64,
    pub dyadic_valid: bool,
}

impl LayerHeader {
    /// Linear layer header with the bias spec derived from the dyadic
    /// constraint (`bias.exp = weight.exp + input.exp`, saturated to the
    /// i8 exponent range; saturation surfaces later as a dyadic failure).
    pub fn linear(
        layer_index: u32,
        rows: u32,
        cols: u32,
        weight_spec: TensorSpec,
        input_spec: TensorSpec,
    ) -> Self {
        let bias_exp = (weight_spec.scale_exp as i16 + input_spec.scale_exp as i16)
            .clamp(i8::MIN as i16, i8::MAX as i16) as i8;
        let bias_spec = TensorSpec {
            scale_exp: bias_exp,
            format: weight_spec.format,
            is_symmetric: weight_spec.is_symmetric && input_spec.is_symmetric,
        };
        Self {
            layer_index,
            layer_type: LayerType::Linear,
            weight_spec,
            input_spec,
            bias_spec,
            output_spec: input_spec,
            weight_rows: rows,
            weight_cols: cols,
            bias_len: rows,
            ..Default::default()
        }
    }

    pub fn param_count(&self) -> u32 {
        self.weight_rows * self.weight_cols + self.bias_len
    }

    fn write_spec(out: &mut [u8], spec: &TensorSpec) {
        out[0] = spec.scale_exp as u8;
        out[1] = spec.format as u8;
        out[2] = spec.is_symmetric as u8;
        out[3] = 0;
    }

    fn read_spec(buf: &[u8]) -> Result<TensorSpec> {
        let format = FixedFormat::from_code(buf[1])
            .ok_or_else(|| Error::InvalidFormat(format!("unknown tensor format {}", buf[1])))?;
        Ok(TensorSpec {
            scale_exp: buf[0] as i8,
            format,
            is_symmetric: buf[2] != 0,
        })
    }

    /// Serialize to the fixed 64-byte layout.
    pub fn to_bytes(&self) -> [u8; LAYER_HEADER_LEN] {
        let mut out = [0u8; LAYER_HEADER_LEN];
        out[0..4].copy_from_slice(&self.layer_index.to_le_bytes());
        out[4..8].copy_from_slice(&(self.layer_type as u32).to_le_bytes());
        Self::write_spec(&mut out[8..12], &self.weight_spec);
        Self::write_spec(&mut out[12..16], &self.input_spec);
        Self::write_spec(&mut out[16..20], &self.bias_spec);
        Self::write_spec(&mut out[20..24], &self.output_spec);
        out[24..28].copy_from_slice(&self.weight_rows.to_le_bytes());
        out[28..32].copy_from_slice(&self.weight_cols.to_le_bytes());
        out[32..36].copy_from_slice(&self.bias_len.to_le_bytes());
        // 36..40 pad
        out[40..48].copy_from_slice(&self.weight_offset.to_le_bytes());
        out[48..56].copy_from_slice(&self.bias_offset.to_le_bytes());
        out[56] = self.dyadic_valid as u8;
        // 57..64 reserved
        out
    }

    /// Deserialize from a 64-byte buffer.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < LAYER_HEADER_LEN {
            return Err(Error::BufferTooSmall {
                expected: LAYER_HEADER_LEN,
                got: buf.len(),
            });
        }

        let read_u32 = |start: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&buf[start..start + 4]);
            u32::from_le_bytes(b)
        };
        let read_u64 = |start: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&buf[start..start + 8]);
            u64::from_le_bytes(b)
        };

        let type_code = read_u32(4);
        let layer_type = LayerType::from_code(type_code)
            .ok_or_else(|| Error::InvalidFormat(format!("unknown layer type {type_code}")))?;

        Ok(Self {
            layer_index: read_u32(0),
            layer_type,
            weight_spec: Self::read_spec(&buf[8..12])?,
            input_spec: Self::read_spec(&buf[12..16])?,
            bias_spec: Self::read_spec(&buf[16..20])?,
            output_spec: Self::read_spec(&buf[20..24])?,
            weight_rows: read_u32(24),
            weight_cols: read_u32(28),
            bias_len: read_u32(32),
            weight_offset: read_u64(40),
            bias_offset: read_u64(48),
            dyadic_valid: buf[56] != 0,
        })
    }
}

/// Fixed model-image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub source_hash: [u8; DIGEST_LEN],
    pub quantized_hash: [u8; DIGEST_LEN],
    pub layer_count: u32,
    pub param_count: u32,
    /// Total image size in bytes
    pub total_size: u64,
    /// Byte offset of the layer-header array
    pub header_offset: u64,
    /// SHA-256 back-reference to the associated certificate
    pub certificate_ref: [u8; DIGEST_LEN],
}

impl ModelHeader {
    /// Serialize to the fixed 152-byte layout (trailing 24 bytes reserved).
    pub fn to_bytes(&self) -> [u8; MODEL_HEADER_LEN] {
        let mut out = [0u8; MODEL_HEADER_LEN];
        out[0..4].copy_from_slice(&self.magic);
        out[4..8].copy_from_slice(&self.version.to_le_bytes());
        out[8..40].copy_from_slice(&self.source_hash);
        out[40..72].copy_from_slice(&self.quantized_hash);
        out[72..76].copy_from_slice(&self.layer_count.to_le_bytes());
        out[76..80].copy_from_slice(&self.param_count.to_le_bytes());
        out[80..88].copy_from_slice(&self.total_size.to_le_bytes());
        out[88..96].copy_from_slice(&self.header_offset.to_le_bytes());
        out[96..128].copy_from_slice(&self.certificate_ref);
        // 128..152 reserved
        out
    }

    /// Deserialize and validate magic + version.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < MODEL_HEADER_LEN {
            return Err(Error::BufferTooSmall {
                expected: MODEL_HEADER_LEN,
                got: buf.len(),
            });
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[0..4]);
        if magic != MAGIC_Q16 && magic != MAGIC_Q24 {
            return Err(Error::InvalidFormat("model magic mismatch".into()));
        }

        let read_u32 = |start: usize| {
            let mut b = [0u8; 4];
            b.copy_from_slice(&buf[start..start + 4]);
            u32::from_le_bytes(b)
        };
        let read_u64 = |start: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&buf[start..start + 8]);
            u64::from_le_bytes(b)
        };
        let read32 = |start: usize| {
            let mut h = [0u8; DIGEST_LEN];
            h.copy_from_slice(&buf[start..start + DIGEST_LEN]);
            h
        };

        let version = read_u32(4);
        if version != MODEL_VERSION {
            return Err(Error::InvalidFormat(format!(
                "unsupported model version {version}"
            )));
        }

        Ok(Self {
            magic,
            version,
            source_hash: read32(8),
            quantized_hash: read32(40),
            layer_count: read_u32(72),
            param_count: read_u32(76),
            total_size: read_u64(80),
            header_offset: read_u64(88),
            certificate_ref: read32(96),
        })
    }
}

/// One quantized layer: header plus its integer payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantLayer {
    pub header: LayerHeader,
    pub weights: Vec<Fixed16>,
    pub bias: Vec<Fixed16>,
}

/// A complete quantized model image.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantModel {
    pub header: ModelHeader,
    pub layers: Vec<QuantLayer>,
}

impl QuantModel {
    /// Assemble an image from quantized layers, computing payload offsets,
    /// counts, total size, and the quantized-payload hash.
    pub fn assemble(
        format: FixedFormat,
        source_hash: [u8; DIGEST_LEN],
        certificate_ref: [u8; DIGEST_LEN],
        mut layers: Vec<QuantLayer>,
    ) -> Result<Self> {
        let header_offset = MODEL_HEADER_LEN as u64;
        let payload_start = header_offset + (layers.len() * LAYER_HEADER_LEN) as u64;

        let mut param_count: u32 = 0;
        let mut offset = payload_start;
        let mut payload = Vec::new();

        for layer in &mut layers {
            let h = &mut layer.header;
            let weight_count = h.weight_rows as usize * h.weight_cols as usize;
            if layer.weights.len() != weight_count {
                return Err(Error::DimensionMismatch {
                    expected: weight_count,
                    got: layer.weights.len(),
                });
            }
            if layer.bias.len() != h.bias_len as usize {
                return Err(Error::DimensionMismatch {
                    expected: h.bias_len as usize,
                    got: layer.bias.len(),
                });
            }

            h.weight_offset = offset;
            for w in &layer.weights {
                payload.extend_from_slice(&w.to_le_bytes());
            }
            offset += (layer.weights.len() * 4) as u64;

            h.bias_offset = offset;
            for b in &layer.bias {
                payload.extend_from_slice(&b.to_le_bytes());
            }
            offset += (layer.bias.len() * 4) as u64;

            param_count += h.param_count();
        }

        let header = ModelHeader {
            magic: magic_for(format),
            version: MODEL_VERSION,
            source_hash,
            quantized_hash: sha256(&payload),
            layer_count: layers.len() as u32,
            param_count,
            total_size: offset,
            header_offset,
            certificate_ref,
        };

        Ok(Self { header, layers })
    }

    /// Serialize the full image.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.header.total_size as usize);
        out.extend_from_slice(&self.header.to_bytes());
        for layer in &self.layers {
            out.extend_from_slice(&layer.header.to_bytes());
        }
        for layer in &self.layers {
            for w in &layer.weights {
                out.extend_from_slice(&w.to_le_bytes());
            }
            for b in &layer.bias {
                out.extend_from_slice(&b.to_le_bytes());
            }
        }
        out
    }

    /// Parse and validate a full image, re-slicing each layer's payload
    /// from its recorded offsets.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        let header = ModelHeader::from_bytes(buf)?;

        if (buf.len() as u64) < header.total_size {
            return Err(Error::BufferTooSmall {
                expected: header.total_size as usize,
                got: buf.len(),
            });
        }

        let mut layers = Vec::with_capacity(header.layer_count as usize);
        for i in 0..header.layer_count as usize {
            let start = header.header_offset as usize + i * LAYER_HEADER_LEN;
            let end = start + LAYER_HEADER_LEN;
            if end > buf.len() {
                return Err(Error::BufferTooSmall {
                    expected: end,
                    got: buf.len(),
                });
            }
            let lh = LayerHeader::from_bytes(&buf[start..end])?;

            let read_payload = |offset: u64, count: usize| -> Result<Vec<Fixed16>> {
                let start = offset as usize;
                let end = start + count * 4;
                if end > buf.len() {
                    return Err(Error::BufferTooSmall {
                        expected: end,
                        got: buf.len(),
                    });
                }
                Ok(buf[start..end]
                    .chunks_exact(4)
                    .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect())
            };

            let weight_count = lh.weight_rows as usize * lh.weight_cols as usize;
            let weights = read_payload(lh.weight_offset, weight_count)?;
            let bias = read_payload(lh.bias_offset, lh.bias_len as usize)?;

            layers.push(QuantLayer {
                header: lh,
                weights,
                bias,
            });
        }

        Ok(Self { header, layers })
    }

    /// Write the serialized image to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_bytes())?;
        Ok(())
    }

    /// Read and validate an image from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}
