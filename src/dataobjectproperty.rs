//! Data Object Properties: diag-coded-type + computation-method + physical
//! type bound together (spec §3 "Data Object Properties"), plus the DTC
//! specialization (`DTC-DOP`).

use fnv::FnvBuildHasher;
use indexmap::IndexMap;

use crate::compumethods::CompuMethod;
use crate::diagcodedtypes::{CodecContext, DiagCodedType};
use crate::error::{DecodeError, EncodeError};
use crate::odxtypes::Value;
use crate::physicaltype::PhysicalType;

/// A single diagnostic trouble code entry of a [`DtcDop`]'s table.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticTroubleCode {
    pub short_name: String,
    pub trouble_code: u32,
    pub display_trouble_code: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataObjectProperty {
    pub short_name: String,
    pub diag_coded_type: DiagCodedType,
    pub compu_method: CompuMethod,
    pub physical_type: PhysicalType,
}

impl DataObjectProperty {
    pub fn decode(
        &self,
        buf: &[u8],
        byte_pos: usize,
        bit_pos: u8,
        ctx: CodecContext,
    ) -> Result<(Value, usize), DecodeError> {
        let (internal, consumed) = self.diag_coded_type.decode(buf, byte_pos, bit_pos, ctx)?;
        let physical = self.compu_method.convert_to_physical(&internal)?;
        Ok((physical, consumed))
    }

    pub fn encode(
        &self,
        physical: &Value,
        buf: &mut Vec<u8>,
        byte_pos: usize,
        bit_pos: u8,
        ctx: CodecContext,
    ) -> Result<usize, EncodeError> {
        let internal = self.compu_method.convert_to_internal(physical)?;
        self.diag_coded_type.encode(&internal, buf, byte_pos, bit_pos, ctx)
    }
}

/// `DTC-DOP`: a [`DataObjectProperty`] whose decoded internal value is
/// additionally looked up in a trouble-code table instead of (or alongside)
/// its computation method.
#[derive(Debug, Clone, PartialEq)]
pub struct DtcDop {
    pub base: DataObjectProperty,
    pub dtcs: IndexMap<u32, DiagnosticTroubleCode, FnvBuildHasher>,
}

impl DtcDop {
    pub fn new(base: DataObjectProperty, dtcs: Vec<DiagnosticTroubleCode>) -> Self {
        let mut map = IndexMap::default();
        for dtc in dtcs {
            map.insert(dtc.trouble_code, dtc);
        }
        Self { base, dtcs: map }
    }

    /// Decode the raw trouble-code number and resolve it against the table.
    /// A code with no table entry still decodes, carrying `None` in its
    /// `display_trouble_code`/`text` slot rather than failing — a DTC-DOP
    /// instance is allowed to report codes it does not recognize.
    pub fn decode_dtc(
        &self,
        buf: &[u8],
        byte_pos: usize,
        bit_pos: u8,
        ctx: CodecContext,
    ) -> Result<(DiagnosticTroubleCode, usize), DecodeError> {
        let (internal, consumed) = self.base.diag_coded_type.decode(buf, byte_pos, bit_pos, ctx)?;
        let code = internal
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| DecodeError::OutOfPhysicalBounds("DTC value does not fit u32".into()))?;
        let dtc = self.dtcs.get(&code).cloned().unwrap_or_else(|| {
            log::warn!("DTC-DOP {} has no table entry for code {code:#X}", self.base.short_name);
            DiagnosticTroubleCode {
                short_name: format!("DTC_{code:X}"),
                trouble_code: code,
                display_trouble_code: None,
                text: String::new(),
            }
        });
        Ok((dtc, consumed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compumethods::LinearCompuMethod;
    use crate::diagcodedtypes::StandardLengthType;
    use crate::odxtypes::{BaseDataType, LimitRange};

    fn identity_dop() -> DataObjectProperty {
        DataObjectProperty {
            short_name: "temperature".into(),
            diag_coded_type: DiagCodedType::StandardLength(StandardLengthType::new(
                BaseDataType::AUint32,
                8,
            )),
            compu_method: CompuMethod::Linear(LinearCompuMethod {
                offset: -40.0,
                factor_numerator: 1.0,
                factor_denominator: 1.0,
                internal_limits: LimitRange::UNBOUNDED,
                physical_limits: LimitRange::UNBOUNDED,
            }),
            physical_type: PhysicalType::new(BaseDataType::AInt32),
        }
    }

    #[test]
    fn dop_decode_applies_compu_method() {
        let dop = identity_dop();
        let buf = vec![50u8];
        let (v, n) = dop.decode(&buf, 0, 0, CodecContext::default()).unwrap();
        assert_eq!(v, Value::Int(10));
        assert_eq!(n, 1);
    }

    #[test]
    fn dop_encode_inverts_compu_method() {
        let dop = identity_dop();
        let mut buf = Vec::new();
        dop.encode(&Value::Int(10), &mut buf, 0, 0, CodecContext::default())
            .unwrap();
        assert_eq!(buf, vec![50]);
    }

    #[test]
    fn dtc_dop_unknown_code_still_decodes() {
        let dtc_dop = DtcDop::new(
            DataObjectProperty {
                short_name: "dtc".into(),
                diag_coded_type: DiagCodedType::StandardLength(StandardLengthType::new(
                    BaseDataType::AUint32,
                    8,
                )),
                compu_method: CompuMethod::Identity,
                physical_type: PhysicalType::new(BaseDataType::AUint32),
            },
            vec![DiagnosticTroubleCode {
                short_name: "P0001".into(),
                trouble_code: 1,
                display_trouble_code: Some("P0001".into()),
                text: "Fuel volume regulator".into(),
            }],
        );
        let (known, _) = dtc_dop
            .decode_dtc(&[1], 0, 0, CodecContext::default())
            .unwrap();
        assert_eq!(known.text, "Fuel volume regulator");
        let (unknown, _) = dtc_dop
            .decode_dtc(&[2], 0, 0, CodecContext::default())
            .unwrap();
        assert_eq!(unknown.trouble_code, 2);
        assert!(unknown.display_trouble_code.is_none());
    }
}
