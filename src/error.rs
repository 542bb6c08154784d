//! The error taxonomy from the design spec: each kind is a distinct type so
//! callers can match on what actually went wrong instead of parsing strings.

use thiserror::Error;

/// Structural problem in an already-parsed XML tree: a required attribute or
/// element is missing, or a value cannot be parsed into the type it claims.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("missing required attribute {attribute:?} on {element}")]
    MissingAttribute {
        element: String,
        attribute: String,
    },
    #[error("element {element} is missing required child {child:?}")]
    MissingChild { element: String, child: String },
    #[error("could not parse {value:?} as {expected} in {context}")]
    InvalidValue {
        context: String,
        value: String,
        expected: String,
    },
    #[error("document declares both PDX archive and single-file input")]
    ConflictingSource,
}

/// Phase 1/2 failures of the link resolver.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolutionError {
    #[error("duplicate OdxId {0:?}")]
    Duplicate(String),
    #[error("unresolved reference {0:?}")]
    Unresolved(String),
    #[error("cyclic PARENT-REF chain involving layer {0:?}")]
    CyclicParents(String),
    #[error("structure {structure:?} has overlapping fixed positions: {a:?} and {b:?}")]
    OverlappingPositions {
        structure: String,
        a: String,
        b: String,
    },
}

/// Failures while turning bytes into values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    #[error("buffer truncated: needed {needed} bytes at offset {offset}, had {available}")]
    BufferTruncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("coded-const mismatch on {param}: expected {expected:#x}, found {found:#x}")]
    CodedConstMismatch {
        param: String,
        expected: u64,
        found: u64,
    },
    #[error("physical-constant mismatch on {param}")]
    PhysicalConstantMismatch { param: String },
    #[error("length parameter {0:?} not found in decode scope")]
    MissingLengthParameter(String),
    #[error("value out of physical bounds for {0:?}")]
    OutOfPhysicalBounds(String),
    #[error("value {0:?} has no entry in text table {1:?}")]
    UnknownTextTableEntry(String, String),
    #[error("minimum length not reached for {param}: got {got}, need at least {min}")]
    MinLengthNotReached {
        param: String,
        got: usize,
        min: usize,
    },
    #[error("numeric conversion of {value} into {target} loses information")]
    LossyConversion { value: String, target: String },
}

/// Failures while turning values into bytes.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EncodeError {
    #[error("required parameter {0:?} missing from the value map")]
    MissingParameter(String),
    #[error("value out of internal bounds for {0:?}")]
    OutOfInternalBounds(String),
    #[error("value does not fit in {bit_length}-bit field for {param}")]
    DoesNotFitBitWidth { param: String, bit_length: u32 },
    #[error("computation method for {0:?} is not invertible for this value")]
    NotInvertible(String),
    #[error("floating-point internal types in non-standard bit widths are unsupported ({0:?})")]
    UnsupportedFloatWidth(String),
}

/// Failures flattening a diag layer's inheritance chain.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InheritanceError {
    #[error("{child_layer:?} overrides inherited short name {short_name:?} ambiguously")]
    ConflictingOverride {
        child_layer: String,
        short_name: String,
    },
    #[error("rename target {target:?} in {layer:?} collides with an existing short name")]
    RenameCollision { layer: String, target: String },
}

/// The crate-wide error type every public fallible operation returns.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OdxError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Inheritance(#[from] InheritanceError),
}

pub type Result<T> = std::result::Result<T, OdxError>;
