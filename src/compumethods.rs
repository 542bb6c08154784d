//! Computation methods: internal <-> physical scalar conversion (spec §3
//! "Computation Methods", §4.2).

use crate::error::{DecodeError, EncodeError};
use crate::odxtypes::{LimitRange, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct LinearCompuMethod {
    pub offset: f64,
    pub factor_numerator: f64,
    pub factor_denominator: f64,
    pub internal_limits: LimitRange,
    pub physical_limits: LimitRange,
}

impl LinearCompuMethod {
    fn phys_of(&self, internal: f64) -> f64 {
        self.offset + (internal * self.factor_numerator) / self.factor_denominator
    }

    fn internal_of(&self, physical: f64) -> f64 {
        ((physical - self.offset) * self.factor_denominator) / self.factor_numerator
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextTableEntry {
    pub internal_value: i64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabEntry {
    pub internal_value: i64,
    pub physical_value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabIntpPoint {
    pub internal_value: f64,
    pub physical_value: f64,
}

/// The internal <-> physical conversion rule bound to a
/// [`crate::dataobjectproperty::DataObjectProperty`].
#[derive(Debug, Clone, PartialEq)]
pub enum CompuMethod {
    Identity,
    Linear(LinearCompuMethod),
    /// `SCALE-LINEAR`: one [`LinearCompuMethod`] segment per internal range,
    /// first matching segment wins.
    ScaleLinear(Vec<LinearCompuMethod>),
    TextTable(Vec<TextTableEntry>),
    Tab(Vec<TabEntry>),
    TabIntp(Vec<TabIntpPoint>),
}

impl CompuMethod {
    /// internal -> physical, used while decoding.
    pub fn convert_to_physical(&self, internal: &Value) -> Result<Value, DecodeError> {
        match self {
            CompuMethod::Identity => Ok(internal.clone()),
            CompuMethod::Linear(lin) => {
                let i = internal
                    .as_f64()
                    .ok_or_else(|| DecodeError::OutOfPhysicalBounds("non-numeric internal value".into()))?;
                if !lin.internal_limits.contains(i) {
                    return Err(DecodeError::OutOfPhysicalBounds("internal value outside declared limits".into()));
                }
                let p = lin.phys_of(i);
                if !lin.physical_limits.contains(p) {
                    return Err(DecodeError::OutOfPhysicalBounds("computed physical value outside declared limits".into()));
                }
                Ok(numeric_like(internal, p))
            }
            CompuMethod::ScaleLinear(segments) => {
                let i = internal
                    .as_f64()
                    .ok_or_else(|| DecodeError::OutOfPhysicalBounds("non-numeric internal value".into()))?;
                let seg = segments
                    .iter()
                    .find(|s| s.internal_limits.contains(i))
                    .ok_or_else(|| DecodeError::OutOfPhysicalBounds("no scale segment covers internal value".into()))?;
                let p = seg.phys_of(i);
                if !seg.physical_limits.contains(p) {
                    return Err(DecodeError::OutOfPhysicalBounds("computed physical value outside declared limits".into()));
                }
                Ok(numeric_like(internal, p))
            }
            CompuMethod::TextTable(entries) => {
                let i = internal
                    .as_i64()
                    .ok_or_else(|| DecodeError::OutOfPhysicalBounds("non-numeric internal value".into()))?;
                match entries.iter().find(|e| e.internal_value == i) {
                    Some(e) => Ok(Value::Text(e.text.clone())),
                    // An internal value with no table entry decodes to itself,
                    // matching an unassigned raw reading rather than an error.
                    None => {
                        log::warn!("TEXTTABLE has no entry for internal value {i}, passing it through");
                        Ok(internal.clone())
                    }
                }
            }
            CompuMethod::Tab(entries) => {
                let i = internal
                    .as_i64()
                    .ok_or_else(|| DecodeError::OutOfPhysicalBounds("non-numeric internal value".into()))?;
                entries
                    .iter()
                    .find(|e| e.internal_value == i)
                    .map(|e| Value::Float(e.physical_value))
                    .ok_or_else(|| DecodeError::UnknownTextTableEntry(i.to_string(), "TAB".into()))
            }
            CompuMethod::TabIntp(points) => {
                let i = internal
                    .as_f64()
                    .ok_or_else(|| DecodeError::OutOfPhysicalBounds("non-numeric internal value".into()))?;
                interpolate(points, i, |p| p.internal_value, |p| p.physical_value)
                    .map(Value::Float)
                    .ok_or_else(|| DecodeError::OutOfPhysicalBounds("internal value outside interpolation table range".into()))
            }
        }
    }

    /// physical -> internal, used while encoding. Every variant here must be
    /// invertible; [`CompuMethod::Tab`] with duplicate physical values is not.
    pub fn convert_to_internal(&self, physical: &Value) -> Result<Value, EncodeError> {
        match self {
            CompuMethod::Identity => Ok(physical.clone()),
            CompuMethod::Linear(lin) => {
                let p = physical
                    .as_f64()
                    .ok_or_else(|| EncodeError::OutOfInternalBounds("non-numeric physical value".into()))?;
                if !lin.physical_limits.contains(p) {
                    return Err(EncodeError::OutOfInternalBounds("physical value outside declared limits".into()));
                }
                let i = lin.internal_of(p);
                if !lin.internal_limits.contains(i) {
                    return Err(EncodeError::OutOfInternalBounds("computed internal value outside declared limits".into()));
                }
                Ok(numeric_like(physical, i))
            }
            CompuMethod::ScaleLinear(segments) => {
                let p = physical
                    .as_f64()
                    .ok_or_else(|| EncodeError::OutOfInternalBounds("non-numeric physical value".into()))?;
                let seg = segments
                    .iter()
                    .find(|s| s.physical_limits.contains(p))
                    .ok_or_else(|| EncodeError::NotInvertible("no scale segment covers physical value".into()))?;
                let i = seg.internal_of(p);
                if !seg.internal_limits.contains(i) {
                    return Err(EncodeError::OutOfInternalBounds("computed internal value outside declared limits".into()));
                }
                Ok(numeric_like(physical, i))
            }
            CompuMethod::TextTable(entries) => match physical {
                Value::Text(s) => entries
                    .iter()
                    .find(|e| &e.text == s)
                    .map(|e| Value::Int(e.internal_value))
                    .ok_or_else(|| EncodeError::OutOfInternalBounds(format!("{s:?} has no table entry"))),
                other => Ok(other.clone()),
            },
            CompuMethod::Tab(entries) => {
                let p = physical
                    .as_f64()
                    .ok_or_else(|| EncodeError::OutOfInternalBounds("non-numeric physical value".into()))?;
                let matches: Vec<_> = entries.iter().filter(|e| e.physical_value == p).collect();
                match matches.as_slice() {
                    [single] => Ok(Value::Int(single.internal_value)),
                    [] => Err(EncodeError::OutOfInternalBounds("physical value has no table entry".into())),
                    _ => Err(EncodeError::NotInvertible("TAB has multiple entries for this physical value".into())),
                }
            }
            CompuMethod::TabIntp(points) => {
                let p = physical
                    .as_f64()
                    .ok_or_else(|| EncodeError::OutOfInternalBounds("non-numeric physical value".into()))?;
                interpolate(points, p, |pt| pt.physical_value, |pt| pt.internal_value)
                    .map(Value::Float)
                    .ok_or_else(|| EncodeError::OutOfInternalBounds("physical value outside interpolation table range".into()))
            }
        }
    }
}

/// Keep integral inputs integral: a `Linear` method over `A_UINT32` internal
/// values that happens to compute a whole number should not surface as a
/// `Float` just because the arithmetic ran through `f64`.
fn numeric_like(template: &Value, computed: f64) -> Value {
    match template {
        Value::UInt(_) if computed >= 0.0 && computed.fract() == 0.0 => Value::UInt(computed as u64),
        Value::Int(_) if computed.fract() == 0.0 => Value::Int(computed as i64),
        _ => Value::Float(computed),
    }
}

fn interpolate<T>(
    points: &[T],
    x: f64,
    get_x: impl Fn(&T) -> f64,
    get_y: impl Fn(&T) -> f64,
) -> Option<f64> {
    if points.is_empty() {
        return None;
    }
    let mut sorted: Vec<&T> = points.iter().collect();
    sorted.sort_by(|a, b| get_x(a).partial_cmp(&get_x(b)).unwrap());
    if x < get_x(sorted[0]) || x > get_x(sorted[sorted.len() - 1]) {
        return None;
    }
    for w in sorted.windows(2) {
        let (x0, x1) = (get_x(w[0]), get_x(w[1]));
        if x >= x0 && x <= x1 {
            if x1 == x0 {
                return Some(get_y(w[0]));
            }
            let t = (x - x0) / (x1 - x0);
            return Some(get_y(w[0]) + t * (get_y(w[1]) - get_y(w[0])));
        }
    }
    Some(get_y(sorted[sorted.len() - 1]))
}
