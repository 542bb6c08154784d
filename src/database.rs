//! The top-level `Database`: loads an archive through a host-supplied
//! [`DocumentLoader`], orders and links every document, and exposes the
//! resolved diag layers and comparam subsets (spec §2, grounded on
//! `database.py`'s load/finalize sequence).

use fnv::FnvBuildHasher;
use indexmap::IndexMap;

use crate::archive::{Archive, DocumentLoader};
use crate::comparam::ComparamSubset;
use crate::diaglayer::{DiagLayer, DiagLayerType, LayerRegistry};
use crate::error::{OdxError, ResolutionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// When set, loading rejects any structure (a service's request or one
    /// of its responses) containing two explicitly-positioned parameters
    /// whose statically known bit extents overlap, instead of silently
    /// letting one trample the other's bytes (spec §3, §6; enforced via
    /// [`crate::structure::Structure::check_positions`]).
    pub strict_positions: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self { strict_positions: true }
    }
}

/// `MODEL-VERSION` as a `(major, minor)` pair; versions before 2.2.0 shared
/// one flat `COMPARAM-SPEC` document instead of per-protocol
/// `COMPARAM-SUBSET`s (spec §9 Open Question: "MODEL-VERSION<2.2 shim").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub fn parse(s: &str) -> Option<Version> {
        let mut parts = s.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().unwrap_or("0").parse().ok()?;
        Some(Version { major, minor })
    }

    pub const V2_2: Version = Version { major: 2, minor: 2 };
}

#[derive(Debug, Clone, Default)]
pub struct Database {
    pub layers: LayerRegistry,
    pub comparam_subsets: IndexMap<String, ComparamSubset, FnvBuildHasher>,
    pub model_version: Option<Version>,
    pub config: Config,
}

impl Database {
    /// Read every entry of `archive` whose suffix starts with `.odx` (a PDX
    /// archive also carries images, a `.odx-cs` comparam spec sits next to
    /// `.odx-d` diag layer containers, and non-`.odx*` members such as a
    /// flash container's binaries are not XML at all and are skipped) in
    /// lexicographic order, parse each with `loader`, then link comparam
    /// subsets first and diag layers second (ordered `PROTOCOL` ->
    /// `FUNCTIONAL-GROUP` -> `BASE-VARIANT` -> `ECU-VARIANT` ->
    /// `ECU-SHARED-DATA`, matching the dependency direction `PARENT-REF` is
    /// allowed to point in).
    pub fn load(archive: &impl Archive, loader: &impl DocumentLoader, config: Config) -> Result<Self> {
        let mut entries = archive.entries()?;
        entries.retain(|(name, _)| is_odx_document(name));
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut model_version = None;
        let mut comparam_subsets: IndexMap<String, ComparamSubset, FnvBuildHasher> = IndexMap::default();
        let mut all_layers: Vec<DiagLayer> = Vec::new();

        for (name, bytes) in &entries {
            let doc = loader.parse(name, bytes)?;
            if let Some(v) = doc.model_version.as_deref().and_then(Version::parse) {
                model_version = Some(model_version.map_or(v, |existing: Version| existing.max(v)));
            }
            if let Some(subset) = doc.comparam_subset {
                if comparam_subsets.contains_key(&subset.short_name) {
                    return Err(OdxError::Resolution(ResolutionError::Duplicate(subset.short_name)));
                }
                comparam_subsets.insert(subset.short_name.clone(), subset);
            }
            all_layers.extend(doc.diag_layers);
        }

        if config.strict_positions {
            for layer in &all_layers {
                for svc in &layer.services {
                    svc.request.check_positions()?;
                    for resp in svc.pos_responses.iter().chain(svc.neg_responses.iter()) {
                        resp.check_positions()?;
                    }
                }
            }
        }

        all_layers.sort_by_key(|l| l.variant_type.rank());
        let mut layers: LayerRegistry = IndexMap::default();
        for layer in all_layers {
            if layers.contains_key(&layer.short_name) {
                return Err(OdxError::Resolution(ResolutionError::Duplicate(layer.short_name)));
            }
            layers.insert(layer.short_name.clone(), layer);
        }

        Ok(Self {
            layers,
            comparam_subsets,
            model_version,
            config,
        })
    }

    /// Look up a comparam subset by name. Documents older than
    /// `MODEL-VERSION` 2.2 described one global `COMPARAM-SPEC`; a loader
    /// for such documents is expected to have surfaced it as a
    /// `ComparamSubset` under the spec's own short name, so lookups are
    /// uniform regardless of which shape the source document used.
    pub fn select_comparam_subset(&self, short_name: &str) -> Option<&ComparamSubset> {
        self.comparam_subsets.get(short_name)
    }

    pub fn protocols(&self) -> impl Iterator<Item = &DiagLayer> {
        self.layers.values().filter(|l| l.variant_type == DiagLayerType::Protocol)
    }

    pub fn ecus(&self) -> impl Iterator<Item = &DiagLayer> {
        self.layers.values().filter(|l| l.variant_type == DiagLayerType::EcuVariant)
    }

    pub fn diag_layers(&self) -> impl Iterator<Item = &DiagLayer> {
        self.layers.values()
    }
}

/// Whether an archive entry's suffix (the part from its last `.` onward,
/// e.g. `.odx-d`, `.odx-cs`) starts with `.odx` (spec §6; ported from
/// `odxtools.database`'s `Path(zip_member).suffix.startswith(".odx")`).
/// Anything else in the archive — images, flash binaries, a PDX's own
/// `index.xml` — is not an ODX document and is skipped.
fn is_odx_document(entry_name: &str) -> bool {
    match entry_name.rfind('.') {
        Some(i) => entry_name[i..].starts_with(".odx"),
        None => false,
    }
}
