//! Communication parameters (`COMPARAM-SUBSET`): protocol-level settings
//! (timeouts, baud rates, addressing mode) that sit alongside the diag layer
//! object graph and participate in the same link database (spec §2
//! "Archive/DocumentLoader", grounded on `database.py`'s
//! `_build_odxlinks`/`_resolve_references` two-phase pass over every
//! top-level container, comparam subsets included).

use crate::odxlink::OdxId;
use crate::odxtypes::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct ComplexValue {
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparam {
    pub short_name: String,
    pub param_class: String,
    pub cptype: String,
    pub physical_default_value: Option<Value>,
}

/// One `COMPARAM-SUBSET` document: a named collection of communication
/// parameters a protocol or ECU variant can reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparamSubset {
    pub id: OdxId,
    pub short_name: String,
    pub comparams: Vec<Comparam>,
}

impl ComparamSubset {
    pub fn find(&self, short_name: &str) -> Option<&Comparam> {
        self.comparams.iter().find(|c| c.short_name == short_name)
    }
}
