//! Object graph, link resolver and bit-level codec for ODX diagnostic
//! descriptions.
//!
//! This crate never parses XML: a host supplies already-parsed documents
//! through [`archive::DocumentLoader`]. From there it resolves cross-document
//! references, lays out and codes messages bit-by-bit, flattens diag layer
//! inheritance, and dispatches incoming bytes to candidate services through
//! a byte-wise prefix tree.

pub mod archive;
pub mod comparam;
pub mod compumethods;
pub mod database;
pub mod dataobjectproperty;
pub mod diagcodedtypes;
pub mod diaglayer;
pub mod error;
pub mod identifier;
pub mod odxlink;
pub mod odxtypes;
pub mod parameters;
pub mod physicaltype;
pub mod service;
pub mod structure;

pub mod prelude {
    pub use crate::archive::{Archive, DocumentLoader, ParsedDocument};
    pub use crate::comparam::{Comparam, ComparamSubset};
    pub use crate::compumethods::CompuMethod;
    pub use crate::database::{Config, Database, Version};
    pub use crate::dataobjectproperty::{DataObjectProperty, DiagnosticTroubleCode, DtcDop};
    pub use crate::diagcodedtypes::{CodecContext, DiagCodedType, Termination};
    pub use crate::diaglayer::{DiagLayer, DiagLayerType, Message, ParentRef};
    pub use crate::error::{DecodeError, EncodeError, OdxError, ParseError, Result};
    pub use crate::odxlink::{OdxDocFragment, OdxId, OdxLinkDatabase, OdxRef};
    pub use crate::odxtypes::{BaseDataType, Limit, LimitRange, ParamMap, ParamValue, Value};
    pub use crate::parameters::Parameter;
    pub use crate::physicaltype::PhysicalType;
    pub use crate::service::DiagService;
    pub use crate::structure::{EndOfPduField, Request, Response, Structure};
}
