//! Parameters: the closed sum type occupying one slot of a [`crate::structure::Structure`]
//! (spec §4.3 "Parameters"). Matched exhaustively everywhere, never extended
//! by inheritance.

use std::sync::Arc;

use crate::dataobjectproperty::DataObjectProperty;
use crate::diagcodedtypes::{CodecContext, DiagCodedType};
use crate::error::{DecodeError, EncodeError};
use crate::odxtypes::{ParamValue, Value};
use crate::structure::Structure;

/// Cross-parameter state a single parameter's decode needs: values already
/// decoded earlier in the same structure (for `TableKey`/`LengthKey`
/// lookups) and, for a response's `MatchingRequest`, the request bytes it is
/// being matched against.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeScope<'a> {
    pub already_decoded: Option<&'a crate::odxtypes::ParamMap>,
    pub request_bytes: Option<&'a [u8]>,
}

impl<'a> DecodeScope<'a> {
    pub fn sibling(&self, short_name: &str) -> Option<&'a Value> {
        self.already_decoded
            .and_then(|m| m.get(short_name))
            .and_then(ParamValue::as_scalar)
    }
}

/// The same cross-parameter state, needed while encoding instead of decoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeScope<'a> {
    pub already_encoded: Option<&'a crate::odxtypes::ParamMap>,
    pub request_bytes: Option<&'a [u8]>,
}

impl<'a> EncodeScope<'a> {
    pub fn sibling(&self, short_name: &str) -> Option<&'a Value> {
        self.already_encoded
            .and_then(|m| m.get(short_name))
            .and_then(ParamValue::as_scalar)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodedConstParam {
    pub short_name: String,
    pub diag_coded_type: DiagCodedType,
    pub coded_value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchingRequestParam {
    pub short_name: String,
    pub request_byte_position: usize,
    pub byte_length: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueParam {
    pub short_name: String,
    pub dop: DataObjectProperty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalConstantParam {
    pub short_name: String,
    pub dop: DataObjectProperty,
    pub physical_constant_value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReservedParam {
    pub short_name: String,
    pub bit_length: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NrcConstParam {
    pub short_name: String,
    pub diag_coded_type: DiagCodedType,
    pub coded_values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableKeyParam {
    pub short_name: String,
    pub dop: DataObjectProperty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableStructParam {
    pub short_name: String,
    pub key_param_short_name: String,
    pub cases: Vec<(i64, Arc<Structure>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LengthKeyParam {
    pub short_name: String,
    pub dop: DataObjectProperty,
    /// Short name of the `ParamLengthInfo`-typed sibling this key supplies
    /// the length for; fixed up after that sibling is encoded (spec §4.4
    /// "length-key fix-up pass").
    pub target_param_short_name: String,
}

/// One parameter slot. Matching on this exhaustively is how the rest of the
/// crate enumerates "all the ways a byte range can be described" instead of
/// going through an open trait object.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    CodedConst(CodedConstParam),
    MatchingRequest(MatchingRequestParam),
    Value(ValueParam),
    PhysicalConstant(PhysicalConstantParam),
    Reserved(ReservedParam),
    NrcConst(NrcConstParam),
    TableKey(TableKeyParam),
    TableStruct(TableStructParam),
    LengthKey(LengthKeyParam),
}

impl Parameter {
    pub fn short_name(&self) -> &str {
        match self {
            Parameter::CodedConst(p) => &p.short_name,
            Parameter::MatchingRequest(p) => &p.short_name,
            Parameter::Value(p) => &p.short_name,
            Parameter::PhysicalConstant(p) => &p.short_name,
            Parameter::Reserved(p) => &p.short_name,
            Parameter::NrcConst(p) => &p.short_name,
            Parameter::TableKey(p) => &p.short_name,
            Parameter::TableStruct(p) => &p.short_name,
            Parameter::LengthKey(p) => &p.short_name,
        }
    }

    /// Static bit length, when the parameter's wire width does not depend on
    /// its value (`None` for dynamic-length dispatch like `TABLE-STRUCT` or
    /// a DOP built on `MIN-MAX-LENGTH`/`LEADING-LENGTH-INFO`/`PARAM-LENGTH-INFO`).
    pub fn bit_length(&self) -> Option<u32> {
        match self {
            Parameter::CodedConst(p) => static_bit_length(&p.diag_coded_type),
            Parameter::MatchingRequest(p) => Some((p.byte_length * 8) as u32),
            Parameter::Value(p) => static_bit_length(&p.dop.diag_coded_type),
            Parameter::PhysicalConstant(p) => static_bit_length(&p.dop.diag_coded_type),
            Parameter::Reserved(p) => Some(p.bit_length),
            Parameter::NrcConst(p) => static_bit_length(&p.diag_coded_type),
            Parameter::TableKey(p) => static_bit_length(&p.dop.diag_coded_type),
            Parameter::TableStruct(_) => None,
            Parameter::LengthKey(p) => static_bit_length(&p.dop.diag_coded_type),
        }
    }

    /// Whether an encoder caller must supply this parameter's value
    /// explicitly. `false` means the value is fixed, computed, or filled in
    /// automatically by the enclosing structure's layout pass.
    pub fn is_required_for_encoding(&self) -> bool {
        matches!(
            self,
            Parameter::Value(_) | Parameter::TableKey(_) | Parameter::TableStruct(_)
        )
    }

    pub fn decode(
        &self,
        buf: &[u8],
        byte_pos: usize,
        bit_pos: u8,
        ctx: CodecContext,
        scope: DecodeScope,
    ) -> Result<(ParamValue, usize), DecodeError> {
        match self {
            Parameter::CodedConst(p) => {
                let (found, consumed) = p.diag_coded_type.decode(buf, byte_pos, bit_pos, ctx)?;
                if found != p.coded_value {
                    return Err(DecodeError::CodedConstMismatch {
                        param: p.short_name.clone(),
                        expected: p.coded_value.as_u64().unwrap_or_default(),
                        found: found.as_u64().unwrap_or_default(),
                    });
                }
                Ok((ParamValue::Scalar(found), consumed))
            }
            Parameter::MatchingRequest(p) => {
                let req = scope.request_bytes.ok_or_else(|| {
                    DecodeError::MissingLengthParameter(format!(
                        "{} needs the matched request bytes",
                        p.short_name
                    ))
                })?;
                if p.request_byte_position + p.byte_length > req.len() {
                    return Err(DecodeError::BufferTruncated {
                        offset: p.request_byte_position,
                        needed: p.byte_length,
                        available: req.len().saturating_sub(p.request_byte_position),
                    });
                }
                let slice = &req[p.request_byte_position..p.request_byte_position + p.byte_length];
                Ok((ParamValue::Scalar(Value::Bytes(slice.to_vec())), p.byte_length))
            }
            Parameter::Value(p) => {
                let (v, n) = p.dop.decode(buf, byte_pos, bit_pos, ctx)?;
                Ok((ParamValue::Scalar(v), n))
            }
            Parameter::PhysicalConstant(p) => {
                let (physical, consumed) = p.dop.decode(buf, byte_pos, bit_pos, ctx)?;
                if physical != p.physical_constant_value {
                    return Err(DecodeError::PhysicalConstantMismatch {
                        param: p.short_name.clone(),
                    });
                }
                Ok((ParamValue::Scalar(physical), consumed))
            }
            Parameter::Reserved(p) => {
                let nbytes = field_byte_span(bit_pos, p.bit_length);
                let raw = crate::diagcodedtypes::read_bits(buf, byte_pos, bit_pos, p.bit_length, true)?;
                if raw != 0 {
                    log::warn!(
                        "reserved field {:?} is non-zero ({raw:#x}), tolerating it and reporting 0",
                        p.short_name
                    );
                }
                Ok((ParamValue::Scalar(Value::UInt(0)), nbytes))
            }
            Parameter::NrcConst(p) => {
                let (found, consumed) = p.diag_coded_type.decode(buf, byte_pos, bit_pos, ctx)?;
                if !p.coded_values.contains(&found) {
                    return Err(DecodeError::CodedConstMismatch {
                        param: p.short_name.clone(),
                        expected: p.coded_values.first().and_then(Value::as_u64).unwrap_or_default(),
                        found: found.as_u64().unwrap_or_default(),
                    });
                }
                Ok((ParamValue::Scalar(found), consumed))
            }
            Parameter::TableKey(p) => {
                let (v, n) = p.dop.decode(buf, byte_pos, bit_pos, ctx)?;
                Ok((ParamValue::Scalar(v), n))
            }
            Parameter::TableStruct(p) => {
                let key = scope
                    .sibling(&p.key_param_short_name)
                    .and_then(Value::as_i64)
                    .ok_or_else(|| {
                        DecodeError::MissingLengthParameter(p.key_param_short_name.clone())
                    })?;
                let (_, structure) = p
                    .cases
                    .iter()
                    .find(|(k, _)| *k == key)
                    .ok_or_else(|| {
                        DecodeError::OutOfPhysicalBounds(format!("no TABLE-STRUCT case for key {key}"))
                    })?;
                let (params, consumed) = structure.decode_params(&buf[byte_pos..], scope.request_bytes)?;
                Ok((ParamValue::Struct(params), consumed))
            }
            Parameter::LengthKey(p) => {
                let (v, n) = p.dop.decode(buf, byte_pos, bit_pos, ctx)?;
                Ok((ParamValue::Scalar(v), n))
            }
        }
    }

    pub fn encode(
        &self,
        value: Option<&ParamValue>,
        buf: &mut Vec<u8>,
        byte_pos: usize,
        bit_pos: u8,
        ctx: CodecContext,
        scope: EncodeScope,
    ) -> Result<usize, EncodeError> {
        match self {
            Parameter::CodedConst(p) => {
                p.diag_coded_type.encode(&p.coded_value, buf, byte_pos, bit_pos, ctx)
            }
            Parameter::MatchingRequest(p) => {
                let req = scope.request_bytes.ok_or_else(|| {
                    EncodeError::MissingParameter(format!(
                        "{} needs the matched request bytes",
                        p.short_name
                    ))
                })?;
                if p.request_byte_position + p.byte_length > req.len() {
                    return Err(EncodeError::OutOfInternalBounds(
                        "matching-request source range exceeds request length".into(),
                    ));
                }
                let nbytes = p.byte_length;
                if buf.len() < byte_pos + nbytes {
                    buf.resize(byte_pos + nbytes, 0);
                }
                buf[byte_pos..byte_pos + nbytes]
                    .copy_from_slice(&req[p.request_byte_position..p.request_byte_position + p.byte_length]);
                Ok(nbytes)
            }
            Parameter::Value(p) => {
                let v = scalar_of(value, &p.short_name)?;
                p.dop.encode(v, buf, byte_pos, bit_pos, ctx)
            }
            Parameter::PhysicalConstant(p) => {
                p.dop.encode(&p.physical_constant_value, buf, byte_pos, bit_pos, ctx)
            }
            Parameter::Reserved(p) => {
                let nbytes = field_byte_span(bit_pos, p.bit_length);
                if buf.len() < byte_pos + nbytes {
                    buf.resize(byte_pos + nbytes, 0);
                }
                Ok(nbytes)
            }
            Parameter::NrcConst(p) => {
                let v = p
                    .coded_values
                    .first()
                    .ok_or_else(|| EncodeError::MissingParameter(p.short_name.clone()))?;
                p.diag_coded_type.encode(v, buf, byte_pos, bit_pos, ctx)
            }
            Parameter::TableKey(p) => {
                let v = scalar_of(value, &p.short_name)?;
                p.dop.encode(v, buf, byte_pos, bit_pos, ctx)
            }
            Parameter::TableStruct(p) => {
                let key = scope
                    .sibling(&p.key_param_short_name)
                    .and_then(Value::as_i64)
                    .ok_or_else(|| EncodeError::MissingParameter(p.key_param_short_name.clone()))?;
                let (_, structure) = p
                    .cases
                    .iter()
                    .find(|(k, _)| *k == key)
                    .ok_or_else(|| {
                        EncodeError::OutOfInternalBounds(format!("no TABLE-STRUCT case for key {key}"))
                    })?;
                let nested = match value {
                    Some(ParamValue::Struct(m)) => m.clone(),
                    _ => Default::default(),
                };
                let encoded = structure.encode_params(&nested, scope.request_bytes)?;
                if buf.len() < byte_pos + encoded.len() {
                    buf.resize(byte_pos + encoded.len(), 0);
                }
                buf[byte_pos..byte_pos + encoded.len()].copy_from_slice(&encoded);
                Ok(encoded.len())
            }
            Parameter::LengthKey(p) => {
                // Filled with a placeholder here; the enclosing structure's
                // length-key fix-up pass overwrites it once the sibling it
                // describes has actually been encoded.
                let placeholder = Value::UInt(0);
                let v = value.and_then(ParamValue::as_scalar).unwrap_or(&placeholder);
                p.dop.encode(v, buf, byte_pos, bit_pos, ctx)
            }
        }
    }
}

fn scalar_of<'a>(value: Option<&'a ParamValue>, short_name: &str) -> Result<&'a Value, EncodeError> {
    match value {
        Some(ParamValue::Scalar(v)) => Ok(v),
        _ => Err(EncodeError::MissingParameter(short_name.to_string())),
    }
}

fn static_bit_length(dct: &DiagCodedType) -> Option<u32> {
    match dct {
        DiagCodedType::StandardLength(t) => Some(t.bit_length),
        _ => None,
    }
}

fn field_byte_span(bit_pos: u8, bit_length: u32) -> usize {
    ((bit_pos as u32 + bit_length) as usize).div_ceil(8)
}
