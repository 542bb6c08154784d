//! Structures: ordered parameter lists with a two-pass byte/bit layout
//! (spec §4.4 "Structures"). `Request`, `Response` and `EndOfPduField` are
//! all thin wrappers around the same [`Structure`] engine.

use fnv::FnvBuildHasher;
use indexmap::IndexMap;

use crate::diagcodedtypes::CodecContext;
use crate::error::{DecodeError, EncodeError, ResolutionError};
use crate::odxtypes::{ParamMap, ParamValue, Value};
use crate::parameters::{DecodeScope, EncodeScope, Parameter};

/// One parameter plus its placement. `byte_position: None` means "flowing":
/// its position is the structure's running cursor at the point it is
/// reached, not a value fixed in the description.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureParam {
    pub parameter: Parameter,
    pub byte_position: Option<usize>,
    pub bit_position: u8,
}

impl StructureParam {
    pub fn flowing(parameter: Parameter) -> Self {
        Self {
            parameter,
            byte_position: None,
            bit_position: 0,
        }
    }

    pub fn placed(parameter: Parameter, byte_position: usize, bit_position: u8) -> Self {
        Self {
            parameter,
            byte_position: Some(byte_position),
            bit_position,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    byte: usize,
    bit: u8,
}

impl Cursor {
    const ZERO: Cursor = Cursor { byte: 0, bit: 0 };

    fn advance_bits(self, bit_length: u32) -> Cursor {
        let total = self.bit as u32 + bit_length;
        Cursor {
            byte: self.byte + (total / 8) as usize,
            bit: (total % 8) as u8,
        }
    }

    fn advance_bytes(self, nbytes: usize) -> Cursor {
        debug_assert_eq!(self.bit, 0, "byte-oriented field did not start byte aligned");
        Cursor {
            byte: self.byte + nbytes,
            bit: 0,
        }
    }

    fn byte_aligned(self) -> Cursor {
        if self.bit == 0 {
            self
        } else {
            Cursor { byte: self.byte + 1, bit: 0 }
        }
    }

    fn max(self, other: Cursor) -> Cursor {
        if (other.byte, other.bit) > (self.byte, self.bit) {
            other
        } else {
            self
        }
    }
}

/// A parameter-carrying block: `REQUEST`, `POS-RESPONSE`, `NEG-RESPONSE`, a
/// nested `STRUCTURE`, or an `END-OF-PDU-FIELD`'s repeated element.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub short_name: String,
    pub params: Vec<StructureParam>,
    /// Fixed wire size; shorter encodings are zero-padded, longer ones are
    /// an error. `None` means the structure's size is whatever its
    /// parameters add up to.
    pub byte_size: Option<usize>,
}

impl Structure {
    pub fn new(short_name: impl Into<String>, params: Vec<StructureParam>) -> Self {
        Self {
            short_name: short_name.into(),
            params,
            byte_size: None,
        }
    }

    pub fn with_byte_size(mut self, byte_size: usize) -> Self {
        self.byte_size = Some(byte_size);
        self
    }

    /// Reject explicitly-positioned parameters whose statically known bit
    /// extents overlap (spec §3 invariant, §6 `Config::strict_positions`).
    /// A placed parameter whose size is only known at codec time (no static
    /// `bit_length`, e.g. a nested variable-length structure) is skipped:
    /// its extent can't be checked without decoding or encoding a value.
    pub fn check_positions(&self) -> Result<(), ResolutionError> {
        let mut placed: Vec<(u64, u64, &str)> = Vec::new();
        for sp in &self.params {
            let (Some(byte_position), Some(bit_length)) = (sp.byte_position, sp.parameter.bit_length()) else {
                continue;
            };
            let start = byte_position as u64 * 8 + sp.bit_position as u64;
            placed.push((start, start + bit_length as u64, sp.parameter.short_name()));
        }
        for i in 0..placed.len() {
            for j in (i + 1)..placed.len() {
                let (a_start, a_end, a_name) = placed[i];
                let (b_start, b_end, b_name) = placed[j];
                if a_start < b_end && b_start < a_end {
                    return Err(ResolutionError::OverlappingPositions {
                        structure: self.short_name.clone(),
                        a: a_name.to_string(),
                        b: b_name.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Decode every parameter in declaration order, threading the running
    /// cursor and the sibling lookup scope. Returns the decoded map and the
    /// number of bytes consumed from `buf`.
    ///
    /// Two independent cursors are tracked: `cursor` advances only across
    /// flowing (unpositioned) parameters, and `placed_bound` is the highest
    /// byte touched by any explicitly-positioned parameter, plus one. A
    /// flowing parameter always starts at `max(cursor, placed_bound)`, so an
    /// out-of-declaration-order run of fixed positions never gets walked
    /// over by a flowing field that follows it (spec §4.4).
    pub fn decode_params(
        &self,
        buf: &[u8],
        request_bytes: Option<&[u8]>,
    ) -> Result<(ParamMap, usize), DecodeError> {
        let mut decoded: ParamMap = IndexMap::with_hasher(FnvBuildHasher::default());
        let mut cursor = Cursor::ZERO;
        let mut placed_bound = Cursor::ZERO;
        for sp in &self.params {
            let is_placed = sp.byte_position.is_some();
            let raw_start = match sp.byte_position {
                Some(b) => Cursor { byte: b, bit: sp.bit_position },
                None => cursor.max(placed_bound),
            };
            let bits = sp.parameter.bit_length();
            let start = if bits.is_none() && !is_placed {
                raw_start.byte_aligned()
            } else {
                raw_start
            };
            let scope = DecodeScope {
                already_decoded: Some(&decoded),
                request_bytes,
            };
            let (value, end) = match bits {
                Some(bits) => {
                    let (v, _) = sp.parameter.decode(
                        buf,
                        start.byte,
                        start.bit,
                        CodecContext::default(),
                        scope,
                    )?;
                    (v, start.advance_bits(bits))
                }
                None => {
                    let (v, n) = sp.parameter.decode(
                        buf,
                        start.byte,
                        start.bit,
                        CodecContext::default(),
                        scope,
                    )?;
                    (v, start.advance_bytes(n))
                }
            };
            if is_placed {
                placed_bound = placed_bound.max(end.byte_aligned());
            } else {
                cursor = end;
            }
            decoded.insert(sp.parameter.short_name().to_string(), value);
        }
        let consumed = if let Some(size) = self.byte_size {
            size
        } else {
            cursor.byte_aligned().max(placed_bound).byte
        };
        if let Some(size) = self.byte_size {
            if size > buf.len() {
                return Err(DecodeError::BufferTruncated {
                    offset: 0,
                    needed: size,
                    available: buf.len(),
                });
            }
        }
        Ok((decoded, consumed))
    }

    /// Encode `values` (keyed by parameter short name) in declaration order,
    /// then run the length-key fix-up pass so `LengthKey` parameters reflect
    /// the actual encoded size of the sibling they describe. Uses the same
    /// `cursor`/`placed_bound` tracking as [`Structure::decode_params`], so a
    /// flowing parameter following an out-of-order run of fixed positions is
    /// placed after all of them, not at the flowing cursor's stale position.
    pub fn encode_params(
        &self,
        values: &ParamMap,
        request_bytes: Option<&[u8]>,
    ) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::new();
        let mut cursor = Cursor::ZERO;
        let mut placed_bound = Cursor::ZERO;
        // (short_name, byte_position, bit_position, bytes_occupied)
        let mut field_spans: Vec<(String, usize, u8, usize)> = Vec::new();

        for sp in &self.params {
            let is_placed = sp.byte_position.is_some();
            let raw_start = match sp.byte_position {
                Some(b) => Cursor { byte: b, bit: sp.bit_position },
                None => cursor.max(placed_bound),
            };
            let bits = sp.parameter.bit_length();
            let start = if bits.is_none() && !is_placed {
                raw_start.byte_aligned()
            } else {
                raw_start
            };
            let scope = EncodeScope {
                already_encoded: Some(values),
                request_bytes,
            };
            let value = values.get(sp.parameter.short_name());

            let (end, nbytes) = match bits {
                Some(bits) => {
                    sp.parameter
                        .encode(value, &mut buf, start.byte, start.bit, CodecContext::default(), scope)?;
                    let end = start.advance_bits(bits);
                    (end, end.byte_aligned().byte - start.byte)
                }
                None => {
                    let n = sp.parameter.encode(
                        value,
                        &mut buf,
                        start.byte,
                        start.bit,
                        CodecContext::default(),
                        scope,
                    )?;
                    (start.advance_bytes(n), n)
                }
            };
            if is_placed {
                placed_bound = placed_bound.max(end.byte_aligned());
            } else {
                cursor = end;
            }
            field_spans.push((
                sp.parameter.short_name().to_string(),
                start.byte,
                start.bit,
                nbytes,
            ));
        }

        self.fixup_length_keys(&mut buf, &field_spans)?;

        if let Some(size) = self.byte_size {
            match buf.len().cmp(&size) {
                std::cmp::Ordering::Less => buf.resize(size, 0),
                std::cmp::Ordering::Greater => {
                    return Err(EncodeError::OutOfInternalBounds(format!(
                        "{} encoded to {} bytes, exceeding its fixed byte_size {}",
                        self.short_name,
                        buf.len(),
                        size
                    )))
                }
                std::cmp::Ordering::Equal => {}
            }
        }
        Ok(buf)
    }

    fn fixup_length_keys(
        &self,
        buf: &mut [u8],
        field_spans: &[(String, usize, u8, usize)],
    ) -> Result<(), EncodeError> {
        for sp in &self.params {
            let Parameter::LengthKey(lk) = &sp.parameter else {
                continue;
            };
            let Some((_, _, _, nbytes)) = field_spans
                .iter()
                .find(|(name, _, _, _)| name == &lk.target_param_short_name)
            else {
                continue;
            };
            let Some((_, byte_pos, bit_pos, _)) = field_spans
                .iter()
                .find(|(name, _, _, _)| name == &lk.short_name)
            else {
                continue;
            };
            let mut scratch = buf.to_vec();
            lk.dop.encode(
                &Value::UInt(*nbytes as u64),
                &mut scratch,
                *byte_pos,
                *bit_pos,
                CodecContext::default(),
            )?;
            let len = buf.len();
            buf.copy_from_slice(&scratch[..len]);
        }
        Ok(())
    }
}

pub type Request = Structure;
pub type Response = Structure;

/// `END-OF-PDU-FIELD`: a structure repeated until the enclosing buffer is
/// exhausted (spec §4.4 "edge cases": repetition inside and outside a
/// structure both terminate on remaining-bytes-empty).
#[derive(Debug, Clone, PartialEq)]
pub struct EndOfPduField {
    pub short_name: String,
    pub element: Structure,
}

impl EndOfPduField {
    pub fn decode(&self, buf: &[u8], request_bytes: Option<&[u8]>) -> Result<ParamValue, DecodeError> {
        let mut items = Vec::new();
        let mut pos = 0;
        while pos < buf.len() {
            let (params, consumed) = self.element.decode_params(&buf[pos..], request_bytes)?;
            if consumed == 0 {
                break;
            }
            items.push(ParamValue::Struct(params));
            pos += consumed;
        }
        Ok(ParamValue::List(items))
    }

    pub fn encode(&self, items: &[ParamMap], request_bytes: Option<&[u8]>) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::new();
        for item in items {
            buf.extend(self.element.encode_params(item, request_bytes)?);
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataobjectproperty::DataObjectProperty;
    use crate::diagcodedtypes::{DiagCodedType, StandardLengthType};
    use crate::odxtypes::BaseDataType;
    use crate::parameters::{CodedConstParam, ValueParam};
    use crate::physicaltype::PhysicalType;

    fn sid_const(sid: u64) -> StructureParam {
        StructureParam::flowing(Parameter::CodedConst(CodedConstParam {
            short_name: "sid".into(),
            diag_coded_type: DiagCodedType::StandardLength(StandardLengthType::new(
                BaseDataType::AUint32,
                8,
            )),
            coded_value: Value::UInt(sid),
        }))
    }

    fn rpm_value() -> StructureParam {
        StructureParam::flowing(Parameter::Value(ValueParam {
            short_name: "rpm".into(),
            dop: DataObjectProperty {
                short_name: "rpm_dop".into(),
                diag_coded_type: DiagCodedType::StandardLength(StandardLengthType::new(
                    BaseDataType::AUint32,
                    8,
                )),
                compu_method: crate::compumethods::CompuMethod::Identity,
                physical_type: PhysicalType::new(BaseDataType::AUint32),
            },
        }))
    }

    #[test]
    fn flowing_params_advance_the_cursor() {
        let s = Structure::new("req", vec![sid_const(0x10), rpm_value()]);
        let mut values: ParamMap = IndexMap::with_hasher(FnvBuildHasher::default());
        values.insert("rpm".into(), ParamValue::Scalar(Value::UInt(42)));
        let buf = s.encode_params(&values, None).unwrap();
        assert_eq!(buf, vec![0x10, 42]);

        let (decoded, consumed) = s.decode_params(&buf, None).unwrap();
        assert_eq!(consumed, 2);
        assert_eq!(decoded.get("sid"), Some(&ParamValue::Scalar(Value::UInt(0x10))));
        assert_eq!(decoded.get("rpm"), Some(&ParamValue::Scalar(Value::UInt(42))));
    }

    #[test]
    fn byte_size_pads_short_encodings() {
        let s = Structure::new("req", vec![sid_const(0x22)]).with_byte_size(3);
        let values: ParamMap = IndexMap::with_hasher(FnvBuildHasher::default());
        let buf = s.encode_params(&values, None).unwrap();
        assert_eq!(buf, vec![0x22, 0, 0]);
    }

    #[test]
    fn byte_size_rejects_overflowing_encodings() {
        let s = Structure::new("req", vec![sid_const(0x22), rpm_value()]).with_byte_size(1);
        let mut values: ParamMap = IndexMap::with_hasher(FnvBuildHasher::default());
        values.insert("rpm".into(), ParamValue::Scalar(Value::UInt(1)));
        assert!(s.encode_params(&values, None).is_err());
    }

    #[test]
    fn check_positions_accepts_disjoint_placed_params() {
        let s = Structure::new(
            "req",
            vec![
                StructureParam::placed(Parameter::CodedConst(CodedConstParam {
                    short_name: "a".into(),
                    diag_coded_type: DiagCodedType::StandardLength(StandardLengthType::new(
                        BaseDataType::AUint32,
                        8,
                    )),
                    coded_value: Value::UInt(0x12),
                }), 0, 0),
                StructureParam::placed(Parameter::CodedConst(CodedConstParam {
                    short_name: "b".into(),
                    diag_coded_type: DiagCodedType::StandardLength(StandardLengthType::new(
                        BaseDataType::AUint32,
                        8,
                    )),
                    coded_value: Value::UInt(0x34),
                }), 1, 0),
            ],
        );
        assert!(s.check_positions().is_ok());
    }

    #[test]
    fn check_positions_rejects_overlapping_placed_params() {
        let s = Structure::new(
            "req",
            vec![
                StructureParam::placed(Parameter::CodedConst(CodedConstParam {
                    short_name: "a".into(),
                    diag_coded_type: DiagCodedType::StandardLength(StandardLengthType::new(
                        BaseDataType::AUint32,
                        16,
                    )),
                    coded_value: Value::UInt(0x1234),
                }), 0, 0),
                StructureParam::placed(Parameter::CodedConst(CodedConstParam {
                    short_name: "b".into(),
                    diag_coded_type: DiagCodedType::StandardLength(StandardLengthType::new(
                        BaseDataType::AUint32,
                        8,
                    )),
                    coded_value: Value::UInt(0x56),
                }), 1, 0),
            ],
        );
        let err = s.check_positions().unwrap_err();
        assert!(matches!(err, crate::error::ResolutionError::OverlappingPositions { .. }));
    }

    #[test]
    fn end_of_pdu_field_decodes_repeated_elements() {
        let element = Structure::new("item", vec![rpm_value()]);
        let field = EndOfPduField { short_name: "items".into(), element };
        let buf = vec![1u8, 2, 3];
        let decoded = field.decode(&buf, None).unwrap();
        let items = decoded.as_list().unwrap();
        assert_eq!(items.len(), 3);
    }
}
