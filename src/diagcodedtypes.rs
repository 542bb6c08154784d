//! Diag-Coded Types: the bit-level primitive codec (spec §4.1).
//!
//! Bit numbering within a byte is LSB=0. Multi-byte integers default to
//! high-low (big-endian) byte order; `is_highlow_byte_order = false` selects
//! little-endian. A field whose `bit_position + bit_length` exceeds 8 spans
//! bytes in the stated order.

use crate::error::{DecodeError, EncodeError};
use crate::odxtypes::{BaseDataType, Value};

/// How a [`MinMaxLengthType`] payload ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    EndOfPdu,
    Zero,
    HexFf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StandardLengthType {
    pub base_data_type: BaseDataType,
    pub bit_length: u32,
    pub bit_mask: Option<u64>,
    pub is_highlow_byte_order: bool,
}

impl StandardLengthType {
    pub fn new(base_data_type: BaseDataType, bit_length: u32) -> Self {
        Self {
            base_data_type,
            bit_length,
            bit_mask: None,
            is_highlow_byte_order: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeadingLengthInfoType {
    pub base_data_type: BaseDataType,
    pub bit_length_of_length: u32,
    pub is_highlow_byte_order: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinMaxLengthType {
    pub base_data_type: BaseDataType,
    pub min_length: usize,
    pub max_length: Option<usize>,
    pub termination: Termination,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamLengthInfoType {
    pub base_data_type: BaseDataType,
    pub is_highlow_byte_order: bool,
}

/// One of the four wire-layout strategies a parameter's value can use.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagCodedType {
    StandardLength(StandardLengthType),
    LeadingLengthInfo(LeadingLengthInfoType),
    MinMaxLength(MinMaxLengthType),
    ParamLengthInfo(ParamLengthInfoType),
}

/// Extra context only some variants need: the bit length supplied by a
/// sibling `LengthKey` parameter (for [`DiagCodedType::ParamLengthInfo`]).
#[derive(Debug, Clone, Copy, Default)]
pub struct CodecContext {
    pub length_bits: Option<u32>,
}

fn field_byte_span(bit_pos: u8, bit_length: u32) -> usize {
    ((bit_pos as u32 + bit_length) as usize).div_ceil(8)
}

fn full_mask(bit_length: u32) -> u128 {
    if bit_length >= 128 {
        u128::MAX
    } else {
        (1u128 << bit_length) - 1
    }
}

pub(crate) fn read_bits(
    buf: &[u8],
    byte_pos: usize,
    bit_pos: u8,
    bit_length: u32,
    high_low: bool,
) -> Result<u128, DecodeError> {
    let nbytes = field_byte_span(bit_pos, bit_length);
    if byte_pos + nbytes > buf.len() {
        return Err(DecodeError::BufferTruncated {
            offset: byte_pos,
            needed: nbytes,
            available: buf.len().saturating_sub(byte_pos),
        });
    }
    let mut acc: u128 = 0;
    if high_low {
        for &b in &buf[byte_pos..byte_pos + nbytes] {
            acc = (acc << 8) | u128::from(b);
        }
    } else {
        for &b in buf[byte_pos..byte_pos + nbytes].iter().rev() {
            acc = (acc << 8) | u128::from(b);
        }
    }
    Ok((acc >> bit_pos) & full_mask(bit_length))
}

fn write_bits(
    buf: &mut Vec<u8>,
    byte_pos: usize,
    bit_pos: u8,
    bit_length: u32,
    value: u128,
    high_low: bool,
) -> Result<(), EncodeError> {
    let mask = full_mask(bit_length);
    if value > mask {
        return Err(EncodeError::DoesNotFitBitWidth {
            param: String::new(),
            bit_length,
        });
    }
    let nbytes = field_byte_span(bit_pos, bit_length);
    if buf.len() < byte_pos + nbytes {
        buf.resize(byte_pos + nbytes, 0);
    }
    let full = mask << bit_pos;
    let shifted = value << bit_pos;

    let mut acc: u128 = 0;
    if high_low {
        for &b in &buf[byte_pos..byte_pos + nbytes] {
            acc = (acc << 8) | u128::from(b);
        }
    } else {
        for &b in buf[byte_pos..byte_pos + nbytes].iter().rev() {
            acc = (acc << 8) | u128::from(b);
        }
    }
    acc = (acc & !full) | (shifted & full);

    if high_low {
        for i in (0..nbytes).rev() {
            buf[byte_pos + i] = (acc & 0xFF) as u8;
            acc >>= 8;
        }
    } else {
        for i in 0..nbytes {
            buf[byte_pos + i] = (acc & 0xFF) as u8;
            acc >>= 8;
        }
    }
    Ok(())
}

fn numeric_to_raw(base: BaseDataType, value: &Value, bit_length: u32) -> Result<u128, EncodeError> {
    match base {
        BaseDataType::AUint32 | BaseDataType::ABoolean => {
            let v = value
                .as_u64()
                .ok_or_else(|| EncodeError::OutOfInternalBounds("non-numeric value".into()))?;
            Ok(u128::from(v))
        }
        BaseDataType::AInt32 => {
            let v = value
                .as_i64()
                .ok_or_else(|| EncodeError::OutOfInternalBounds("non-numeric value".into()))?;
            let mask = full_mask(bit_length);
            Ok((v as u128) & mask)
        }
        BaseDataType::AFloat32 => {
            if bit_length != 32 {
                return Err(EncodeError::UnsupportedFloatWidth(format!(
                    "A_FLOAT32 requires bit_length 32, got {bit_length}"
                )));
            }
            let v = value
                .as_f64()
                .ok_or_else(|| EncodeError::OutOfInternalBounds("non-numeric value".into()))?;
            Ok(u128::from((v as f32).to_bits()))
        }
        BaseDataType::AFloat64 => {
            if bit_length != 64 {
                return Err(EncodeError::UnsupportedFloatWidth(format!(
                    "A_FLOAT64 requires bit_length 64, got {bit_length}"
                )));
            }
            let v = value
                .as_f64()
                .ok_or_else(|| EncodeError::OutOfInternalBounds("non-numeric value".into()))?;
            Ok(u128::from(v.to_bits()))
        }
        BaseDataType::AAsciiString
        | BaseDataType::AUtf8String
        | BaseDataType::AUnicode2String
        | BaseDataType::AByteField => Err(EncodeError::OutOfInternalBounds(
            "string/bytefield types are not bit-packed numerics".into(),
        )),
    }
}

fn raw_to_numeric(base: BaseDataType, raw: u128, bit_length: u32) -> Value {
    match base {
        BaseDataType::AUint32 => Value::UInt(raw as u64),
        BaseDataType::ABoolean => Value::Bool(raw != 0),
        BaseDataType::AInt32 => {
            let sign_bit = 1u128 << (bit_length - 1);
            let v = if bit_length < 128 && raw & sign_bit != 0 {
                (raw as i128) - (1i128 << bit_length)
            } else {
                raw as i128
            };
            Value::Int(v as i64)
        }
        BaseDataType::AFloat32 => Value::Float(f32::from_bits(raw as u32) as f64),
        BaseDataType::AFloat64 => Value::Float(f64::from_bits(raw as u64)),
        BaseDataType::AAsciiString
        | BaseDataType::AUtf8String
        | BaseDataType::AUnicode2String
        | BaseDataType::AByteField => unreachable!("handled by byte-oriented path"),
    }
}

fn decode_raw_bytes(base: BaseDataType, bytes: &[u8]) -> Result<Value, DecodeError> {
    match base {
        BaseDataType::AByteField => Ok(Value::Bytes(bytes.to_vec())),
        BaseDataType::AAsciiString => Ok(Value::Text(
            bytes.iter().map(|&b| b as char).collect::<String>(),
        )),
        BaseDataType::AUtf8String => String::from_utf8(bytes.to_vec())
            .map(Value::Text)
            .map_err(|_| DecodeError::LossyConversion {
                value: format!("{bytes:02x?}"),
                target: "A_UTF8STRING".into(),
            }),
        BaseDataType::AUnicode2String => {
            if bytes.len() % 2 != 0 {
                return Err(DecodeError::LossyConversion {
                    value: format!("{bytes:02x?}"),
                    target: "A_UNICODE2STRING".into(),
                });
            }
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16(&units)
                .map(Value::Text)
                .map_err(|_| DecodeError::LossyConversion {
                    value: format!("{bytes:02x?}"),
                    target: "A_UNICODE2STRING".into(),
                })
        }
        _ => unreachable!("handled by numeric path"),
    }
}

fn encode_raw_bytes(base: BaseDataType, value: &Value) -> Result<Vec<u8>, EncodeError> {
    match (base, value) {
        (BaseDataType::AByteField, Value::Bytes(b)) => Ok(b.clone()),
        (BaseDataType::AAsciiString, Value::Text(s)) => Ok(s.bytes().collect()),
        (BaseDataType::AUtf8String, Value::Text(s)) => Ok(s.as_bytes().to_vec()),
        (BaseDataType::AUnicode2String, Value::Text(s)) => Ok(s
            .encode_utf16()
            .flat_map(|u| u.to_be_bytes())
            .collect()),
        _ => Err(EncodeError::OutOfInternalBounds(
            "value does not match byte-oriented base data type".into(),
        )),
    }
}

fn is_byte_oriented(base: BaseDataType) -> bool {
    matches!(
        base,
        BaseDataType::AAsciiString
            | BaseDataType::AUtf8String
            | BaseDataType::AUnicode2String
            | BaseDataType::AByteField
    )
}

impl DiagCodedType {
    /// Encode `value` starting at `(byte_pos, bit_pos)`. Returns the number
    /// of bytes the field occupies, for the structure layout's flowing
    /// cursor (spec §4.4).
    pub fn encode(
        &self,
        value: &Value,
        buf: &mut Vec<u8>,
        byte_pos: usize,
        bit_pos: u8,
        ctx: CodecContext,
    ) -> Result<usize, EncodeError> {
        match self {
            DiagCodedType::StandardLength(t) => {
                if is_byte_oriented(t.base_data_type) {
                    let bytes = encode_raw_bytes(t.base_data_type, value)?;
                    let nbytes = (t.bit_length as usize).div_ceil(8).max(bytes.len());
                    if buf.len() < byte_pos + nbytes {
                        buf.resize(byte_pos + nbytes, 0);
                    }
                    buf[byte_pos..byte_pos + bytes.len()].copy_from_slice(&bytes);
                    Ok(nbytes)
                } else {
                    let mut raw = numeric_to_raw(t.base_data_type, value, t.bit_length)?;
                    if let Some(mask) = t.bit_mask {
                        raw &= u128::from(mask);
                    }
                    write_bits(
                        buf,
                        byte_pos,
                        bit_pos,
                        t.bit_length,
                        raw,
                        t.is_highlow_byte_order,
                    )?;
                    Ok(field_byte_span(bit_pos, t.bit_length))
                }
            }
            DiagCodedType::LeadingLengthInfo(t) => {
                let bytes = encode_raw_bytes(t.base_data_type, value)?;
                let len = bytes.len() as u128;
                if len > full_mask(t.bit_length_of_length) {
                    return Err(EncodeError::DoesNotFitBitWidth {
                        param: "leading-length prefix".into(),
                        bit_length: t.bit_length_of_length,
                    });
                }
                write_bits(
                    buf,
                    byte_pos,
                    0,
                    t.bit_length_of_length,
                    len,
                    t.is_highlow_byte_order,
                )?;
                let prefix_bytes = (t.bit_length_of_length as usize).div_ceil(8);
                let payload_pos = byte_pos + prefix_bytes;
                if buf.len() < payload_pos + bytes.len() {
                    buf.resize(payload_pos + bytes.len(), 0);
                }
                buf[payload_pos..payload_pos + bytes.len()].copy_from_slice(&bytes);
                Ok(prefix_bytes + bytes.len())
            }
            DiagCodedType::MinMaxLength(t) => {
                let bytes = encode_raw_bytes(t.base_data_type, value)?;
                if let Some(max) = t.max_length {
                    if bytes.len() > max {
                        return Err(EncodeError::DoesNotFitBitWidth {
                            param: "min-max payload".into(),
                            bit_length: (max * 8) as u32,
                        });
                    }
                }
                if bytes.len() < t.min_length {
                    return Err(EncodeError::OutOfInternalBounds(format!(
                        "payload shorter than min_length {}",
                        t.min_length
                    )));
                }
                let terminator_len = match t.termination {
                    Termination::EndOfPdu => 0,
                    Termination::Zero | Termination::HexFf => 1,
                };
                if buf.len() < byte_pos + bytes.len() + terminator_len {
                    buf.resize(byte_pos + bytes.len() + terminator_len, 0);
                }
                buf[byte_pos..byte_pos + bytes.len()].copy_from_slice(&bytes);
                match t.termination {
                    Termination::EndOfPdu => {}
                    Termination::Zero => buf[byte_pos + bytes.len()] = 0x00,
                    Termination::HexFf => buf[byte_pos + bytes.len()] = 0xFF,
                }
                Ok(bytes.len() + terminator_len)
            }
            DiagCodedType::ParamLengthInfo(t) => {
                let bit_length = ctx.length_bits.ok_or_else(|| {
                    EncodeError::MissingParameter("param-length-info length key".into())
                })?;
                if is_byte_oriented(t.base_data_type) {
                    let bytes = encode_raw_bytes(t.base_data_type, value)?;
                    let nbytes = (bit_length as usize).div_ceil(8);
                    if buf.len() < byte_pos + nbytes {
                        buf.resize(byte_pos + nbytes, 0);
                    }
                    buf[byte_pos..byte_pos + bytes.len().min(nbytes)]
                        .copy_from_slice(&bytes[..bytes.len().min(nbytes)]);
                    Ok(nbytes)
                } else {
                    let raw = numeric_to_raw(t.base_data_type, value, bit_length)?;
                    write_bits(buf, byte_pos, 0, bit_length, raw, t.is_highlow_byte_order)?;
                    Ok(field_byte_span(0, bit_length))
                }
            }
        }
    }

    /// Decode a value starting at `(byte_pos, bit_pos)`. Returns the value
    /// and the number of bytes consumed.
    pub fn decode(
        &self,
        buf: &[u8],
        byte_pos: usize,
        bit_pos: u8,
        ctx: CodecContext,
    ) -> Result<(Value, usize), DecodeError> {
        match self {
            DiagCodedType::StandardLength(t) => {
                if is_byte_oriented(t.base_data_type) {
                    let nbytes = (t.bit_length as usize).div_ceil(8);
                    if byte_pos + nbytes > buf.len() {
                        return Err(DecodeError::BufferTruncated {
                            offset: byte_pos,
                            needed: nbytes,
                            available: buf.len().saturating_sub(byte_pos),
                        });
                    }
                    let value = decode_raw_bytes(t.base_data_type, &buf[byte_pos..byte_pos + nbytes])?;
                    Ok((value, nbytes))
                } else {
                    let mut raw = read_bits(buf, byte_pos, bit_pos, t.bit_length, t.is_highlow_byte_order)?;
                    if let Some(mask) = t.bit_mask {
                        raw &= u128::from(mask);
                    }
                    Ok((
                        raw_to_numeric(t.base_data_type, raw, t.bit_length),
                        field_byte_span(bit_pos, t.bit_length),
                    ))
                }
            }
            DiagCodedType::LeadingLengthInfo(t) => {
                let len_raw = read_bits(buf, byte_pos, 0, t.bit_length_of_length, t.is_highlow_byte_order)?;
                let prefix_bytes = (t.bit_length_of_length as usize).div_ceil(8);
                let payload_len = len_raw as usize;
                let payload_pos = byte_pos + prefix_bytes;
                if payload_pos + payload_len > buf.len() {
                    return Err(DecodeError::BufferTruncated {
                        offset: payload_pos,
                        needed: payload_len,
                        available: buf.len().saturating_sub(payload_pos),
                    });
                }
                let value =
                    decode_raw_bytes(t.base_data_type, &buf[payload_pos..payload_pos + payload_len])?;
                Ok((value, prefix_bytes + payload_len))
            }
            DiagCodedType::MinMaxLength(t) => {
                let (payload_end, terminator_len) = match t.termination {
                    Termination::EndOfPdu => (buf.len(), 0),
                    Termination::Zero | Termination::HexFf => {
                        let needle = match t.termination {
                            Termination::Zero => 0x00,
                            _ => 0xFF,
                        };
                        let rel = buf[byte_pos..]
                            .iter()
                            .position(|&b| b == needle)
                            .map(|p| byte_pos + p);
                        match rel {
                            Some(p) => (p, 1),
                            None => (buf.len(), 0),
                        }
                    }
                };
                if payload_end < byte_pos {
                    return Err(DecodeError::BufferTruncated {
                        offset: byte_pos,
                        needed: t.min_length,
                        available: 0,
                    });
                }
                let mut payload_len = payload_end - byte_pos;
                if let Some(max) = t.max_length {
                    payload_len = payload_len.min(max);
                }
                if payload_len < t.min_length {
                    if byte_pos + t.min_length > buf.len() {
                        return Err(DecodeError::MinLengthNotReached {
                            param: "min-max field".into(),
                            got: payload_len,
                            min: t.min_length,
                        });
                    }
                    payload_len = t.min_length;
                }
                let value = decode_raw_bytes(
                    t.base_data_type,
                    &buf[byte_pos..byte_pos + payload_len],
                )?;
                Ok((value, payload_len + terminator_len))
            }
            DiagCodedType::ParamLengthInfo(t) => {
                let bit_length = ctx
                    .length_bits
                    .ok_or_else(|| DecodeError::MissingLengthParameter("length key".into()))?;
                if is_byte_oriented(t.base_data_type) {
                    let nbytes = (bit_length as usize).div_ceil(8);
                    if byte_pos + nbytes > buf.len() {
                        return Err(DecodeError::BufferTruncated {
                            offset: byte_pos,
                            needed: nbytes,
                            available: buf.len().saturating_sub(byte_pos),
                        });
                    }
                    let value = decode_raw_bytes(t.base_data_type, &buf[byte_pos..byte_pos + nbytes])?;
                    Ok((value, nbytes))
                } else {
                    let raw = read_bits(buf, byte_pos, 0, bit_length, t.is_highlow_byte_order)?;
                    Ok((
                        raw_to_numeric(t.base_data_type, raw, bit_length),
                        field_byte_span(0, bit_length),
                    ))
                }
            }
        }
    }
}
