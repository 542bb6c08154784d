//! Diagnostic services: a request structure bundled with its positive and
//! negative response structures (spec §4.5 "Services").

use crate::error::{DecodeError, EncodeError};
use crate::odxtypes::ParamMap;
use crate::structure::Structure;

#[derive(Debug, Clone, PartialEq)]
pub struct DiagService {
    pub short_name: String,
    pub request: Structure,
    pub pos_responses: Vec<Structure>,
    pub neg_responses: Vec<Structure>,
}

/// The outcome of matching response bytes against a service's declared
/// responses: which structure matched and what it decoded to.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedResponse {
    pub structure_short_name: String,
    pub is_negative: bool,
    pub params: ParamMap,
}

impl DiagService {
    pub fn encode_request(&self, values: &ParamMap) -> Result<Vec<u8>, EncodeError> {
        self.request.encode_params(values, None)
    }

    /// Decode `bytes` against every declared response, positive ones first,
    /// returning the first structure whose fixed/constant parameters match.
    /// Constant-parameter mismatches are how a candidate is ruled out, not a
    /// fatal error for the whole call.
    pub fn decode_response(&self, bytes: &[u8], request_bytes: &[u8]) -> Result<DecodedResponse, DecodeError> {
        for resp in &self.pos_responses {
            if let Ok((params, _)) = resp.decode_params(bytes, Some(request_bytes)) {
                return Ok(DecodedResponse {
                    structure_short_name: resp.short_name.clone(),
                    is_negative: false,
                    params,
                });
            }
        }
        for resp in &self.neg_responses {
            if let Ok((params, _)) = resp.decode_params(bytes, Some(request_bytes)) {
                return Ok(DecodedResponse {
                    structure_short_name: resp.short_name.clone(),
                    is_negative: true,
                    params,
                });
            }
        }
        Err(DecodeError::CodedConstMismatch {
            param: self.short_name.clone(),
            expected: 0,
            found: bytes.first().copied().unwrap_or(0) as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataobjectproperty::DataObjectProperty;
    use crate::diagcodedtypes::{DiagCodedType, StandardLengthType};
    use crate::odxtypes::{BaseDataType, ParamValue, Value};
    use crate::parameters::{CodedConstParam, Parameter, ValueParam};
    use crate::physicaltype::PhysicalType;
    use crate::structure::StructureParam;
    use fnv::FnvBuildHasher;
    use indexmap::IndexMap;

    fn coded_const(name: &str, value: u64) -> StructureParam {
        StructureParam::flowing(Parameter::CodedConst(CodedConstParam {
            short_name: name.into(),
            diag_coded_type: DiagCodedType::StandardLength(StandardLengthType::new(
                BaseDataType::AUint32,
                8,
            )),
            coded_value: Value::UInt(value),
        }))
    }

    #[test]
    fn request_roundtrip_and_response_dispatch() {
        let request = Structure::new("req", vec![coded_const("sid", 0x22)]);
        let pos = Structure::new(
            "pos",
            vec![
                coded_const("sid", 0x62),
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
                })),
            ],
        );
        let neg = Structure::new("neg", vec![coded_const("sid", 0x7F)]);
        let svc = DiagService {
            short_name: "read_rpm".into(),
            request,
            pos_responses: vec![pos],
            neg_responses: vec![neg],
        };

        let mut values: ParamMap = IndexMap::with_hasher(FnvBuildHasher::default());
        let req_bytes = svc.encode_request(&values).unwrap();
        assert_eq!(req_bytes, vec![0x22]);

        let resp_bytes = vec![0x62u8, 99];
        let decoded = svc.decode_response(&resp_bytes, &req_bytes).unwrap();
        assert!(!decoded.is_negative);
        assert_eq!(decoded.params.get("rpm"), Some(&ParamValue::Scalar(Value::UInt(99))));

        let _ = &mut values;
        let neg_bytes = vec![0x7Fu8];
        let decoded_neg = svc.decode_response(&neg_bytes, &req_bytes).unwrap();
        assert!(decoded_neg.is_negative);
    }
}
