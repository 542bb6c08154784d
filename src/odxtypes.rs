//! Scalar types shared by diag-coded types, computation methods and DOPs
//! (spec §3 "Scalar and physical types").

use std::fmt;

use fnv::FnvBuildHasher;
use indexmap::IndexMap;

/// The base scalar kinds ODX distinguishes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseDataType {
    AUint32,
    AInt32,
    AFloat32,
    AFloat64,
    AAsciiString,
    AUtf8String,
    AUnicode2String,
    AByteField,
    ABoolean,
}

impl BaseDataType {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::AUint32 | Self::AInt32 | Self::AFloat32 | Self::AFloat64
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Self::AInt32 | Self::AFloat32 | Self::AFloat64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::AFloat32 | Self::AFloat64)
    }
}

/// A single internal or physical scalar value. Used on both sides of a
/// computation method, and as the decoded value of a leaf parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    UInt(u64),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Bool(bool),
}

impl Value {
    /// Best-effort conversion to a rational `f64`, used by computation
    /// methods that need to compare against limits or interpolate.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::UInt(v) => Some(*v as f64),
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Value::Text(_) | Value::Bytes(_) => None,
        }
    }

    /// Best-effort conversion to `i64`, used when a value needs to be an
    /// index into a text table or bit pattern.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::UInt(v) => i64::try_from(*v).ok(),
            Value::Int(v) => Some(*v),
            Value::Bool(v) => Some(if *v { 1 } else { 0 }),
            Value::Float(_) | Value::Text(_) | Value::Bytes(_) => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            Value::Int(v) => u64::try_from(*v).ok(),
            Value::Bool(v) => Some(if *v { 1 } else { 0 }),
            Value::Float(_) | Value::Text(_) | Value::Bytes(_) => None,
        }
    }

    pub fn is_whole(&self) -> bool {
        match self {
            Value::UInt(_) | Value::Int(_) | Value::Bool(_) => true,
            Value::Float(v) => v.fract() == 0.0,
            Value::Text(_) | Value::Bytes(_) => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::UInt(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v:?}"),
            Value::Bytes(v) => write!(f, "{v:02x?}"),
            Value::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// An inclusive/exclusive/unbounded endpoint of a computation method or
/// internal-constraint limit (spec §3 "Computation Methods").
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Limit {
    Inclusive(f64),
    Exclusive(f64),
    Unbounded,
}

impl Limit {
    pub fn allows_min(self, v: f64) -> bool {
        match self {
            Limit::Inclusive(l) => v >= l,
            Limit::Exclusive(l) => v > l,
            Limit::Unbounded => true,
        }
    }

    pub fn allows_max(self, v: f64) -> bool {
        match self {
            Limit::Inclusive(l) => v <= l,
            Limit::Exclusive(l) => v < l,
            Limit::Unbounded => true,
        }
    }
}

/// A `(lower, upper)` limit pair; `None` means no constraint was declared.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LimitRange {
    pub lower: Option<Limit>,
    pub upper: Option<Limit>,
}

impl LimitRange {
    pub const UNBOUNDED: Self = Self {
        lower: None,
        upper: None,
    };

    pub fn contains(&self, v: f64) -> bool {
        self.lower.is_none_or(|l| l.allows_min(v)) && self.upper.is_none_or(|u| u.allows_max(v))
    }
}

/// The decoded shape of one structure's worth of parameters: leaf scalars,
/// nested structures, and repeated (end-of-PDU) lists all nest inside this
/// one type (spec §4.4 "Structures" decode result).
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Scalar(Value),
    Struct(IndexMap<String, ParamValue, FnvBuildHasher>),
    List(Vec<ParamValue>),
}

impl ParamValue {
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            ParamValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&IndexMap<String, ParamValue, FnvBuildHasher>> {
        match self {
            ParamValue::Struct(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::List(v) => Some(v),
            _ => None,
        }
    }
}

pub type ParamMap = IndexMap<String, ParamValue, FnvBuildHasher>;
