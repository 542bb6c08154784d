//! The archive/document boundary: XML-to-object unmarshalling is out of
//! scope, so this crate only ever sees already-parsed containers. A host
//! supplies both the raw entries of a PDX archive (or a bare `.odx-d` file)
//! and a parser that turns each entry into the object-graph pieces this
//! crate links and resolves (spec §2 "Archive/DocumentLoader").

use crate::comparam::ComparamSubset;
use crate::diaglayer::DiagLayer;
use crate::error::Result;

/// One named byte blob inside a PDX (zip) archive, or the sole entry of a
/// bare `.odx-d` file. Entries are iterated in lexicographic order by name,
/// matching how a PDX's `zip` central directory is walked.
pub trait Archive {
    fn entries(&self) -> Result<Vec<(String, Vec<u8>)>>;
}

/// One already-parsed ODX document: its declared `MODEL-VERSION`, the diag
/// layers it defines (if it is a container document), and the comparam
/// subset it defines (if it is one).
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub model_version: Option<String>,
    pub diag_layers: Vec<DiagLayer>,
    pub comparam_subset: Option<ComparamSubset>,
}

/// Host-supplied parser: turns one archive entry's bytes into a
/// [`ParsedDocument`]. This crate never parses XML itself; it only resolves
/// links and runs the codec over the object graph a `DocumentLoader`
/// produces.
pub trait DocumentLoader {
    fn parse(&self, entry_name: &str, bytes: &[u8]) -> Result<ParsedDocument>;
}
