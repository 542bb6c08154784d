//! Identifiers and the two-phase link registry (spec §3 "Identifiers and
//! references", §4.8).

use fnv::FnvBuildHasher;
use indexmap::IndexMap;

use crate::error::ResolutionError;

/// One `(doc_name, doc_type)` pair. A document's position in a collection of
/// ODX files that were packed together; two [`OdxId`]s compare equal only if
/// their fragment lists agree, which is how two documents are allowed to
/// reuse the same local name without colliding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OdxDocFragment {
    pub doc_name: String,
    pub doc_type: String,
}

impl OdxDocFragment {
    pub fn new(doc_name: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            doc_name: doc_name.into(),
            doc_type: doc_type.into(),
        }
    }
}

/// A local name scoped by the documents it was declared in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OdxId {
    pub local_id: String,
    pub doc_fragments: Vec<OdxDocFragment>,
}

impl OdxId {
    pub fn new(local_id: impl Into<String>, doc_fragments: Vec<OdxDocFragment>) -> Self {
        Self {
            local_id: local_id.into(),
            doc_fragments,
        }
    }

    fn display_key(&self) -> String {
        let frags: Vec<String> = self
            .doc_fragments
            .iter()
            .map(|f| format!("{}/{}", f.doc_name, f.doc_type))
            .collect();
        format!("{}#{}", frags.join(","), self.local_id)
    }
}

/// How an [`OdxRef`] is meant to be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefResolutionMode {
    /// Resolve against the global [`OdxLinkDatabase`].
    ById,
    /// Resolve against the short names visible in the enclosing scope
    /// (`SNREF`), not the global id map.
    ByShortName,
}

/// A reference to another object, not yet bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OdxRef {
    pub target: OdxId,
    pub mode: RefResolutionMode,
}

impl OdxRef {
    pub fn by_id(target: OdxId) -> Self {
        Self {
            target,
            mode: RefResolutionMode::ById,
        }
    }

    pub fn by_short_name(local_name: impl Into<String>, scope: Vec<OdxDocFragment>) -> Self {
        Self {
            target: OdxId::new(local_name, scope),
            mode: RefResolutionMode::ByShortName,
        }
    }
}

/// An id that has been bound to a concrete value of type `T`. Produced by
/// [`OdxLinkDatabase::resolve`]; carries no further indirection, matching the
/// spec's "objects are immutable after resolution" lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<T>(pub T);

/// Phase 1/phase 2 registry mapping [`OdxId`] to an opaque handle `H`. The
/// database owns nothing about what `H` means; callers plug in whatever
/// handle type (index, `Rc`, arena key, ...) fits the object graph they're
/// building, matching the "link database owns the objects, peers hold
/// opaque handles" design note (spec §9).
#[derive(Debug, Clone)]
pub struct OdxLinkDatabase<H> {
    entries: IndexMap<String, H, FnvBuildHasher>,
}

impl<H> Default for OdxLinkDatabase<H> {
    fn default() -> Self {
        Self {
            entries: IndexMap::default(),
        }
    }
}

impl<H> OdxLinkDatabase<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase 1: register one id. Duplicate ids are rejected outright rather
    /// than silently overwritten, per the uniqueness invariant in spec §3.
    pub fn insert(&mut self, id: &OdxId, handle: H) -> Result<(), ResolutionError> {
        let key = id.display_key();
        if self.entries.contains_key(&key) {
            return Err(ResolutionError::Duplicate(key));
        }
        self.entries.insert(key, handle);
        Ok(())
    }

    /// Phase 1 bulk form: collect `(id, handle)` pairs from one owning
    /// object, failing the whole build on the first duplicate.
    pub fn extend(
        &mut self,
        pairs: impl IntoIterator<Item = (OdxId, H)>,
    ) -> Result<(), ResolutionError> {
        for (id, handle) in pairs {
            self.insert(&id, handle)?;
        }
        Ok(())
    }

    /// Phase 2: look up a by-id reference. `ByShortName` references must be
    /// resolved by the caller against its own enclosing scope instead; this
    /// database only ever holds global ids.
    pub fn resolve(&self, id: &OdxId) -> Result<&H, ResolutionError>
    where
        H: Clone,
    {
        self.entries
            .get(&id.display_key())
            .ok_or_else(|| ResolutionError::Unresolved(id.display_key()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolve a [`RefResolutionMode::ByShortName`] reference against a flat list
/// of `(short_name, handle)` pairs visible in the enclosing scope (a
/// structure's parameter list, a layer's service list, a DOP list, ...).
pub fn resolve_short_name<'a, H>(
    scope: impl IntoIterator<Item = (&'a str, &'a H)>,
    local_name: &str,
) -> Result<&'a H, ResolutionError> {
    scope
        .into_iter()
        .find(|(name, _)| *name == local_name)
        .map(|(_, handle)| handle)
        .ok_or_else(|| ResolutionError::Unresolved(local_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag() -> Vec<OdxDocFragment> {
        vec![OdxDocFragment::new("UnitTest", "WinneThePoh")]
    }

    #[test]
    fn equal_ids_need_matching_fragments() {
        let a = OdxId::new("req", frag());
        let b = OdxId::new("req", vec![OdxDocFragment::new("Other", "Doc")]);
        assert_ne!(a, b);
        assert_eq!(a, OdxId::new("req", frag()));
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut db = OdxLinkDatabase::new();
        let id = OdxId::new("request_id", frag());
        db.insert(&id, 1usize).unwrap();
        let err = db.insert(&id, 2usize).unwrap_err();
        assert!(matches!(err, ResolutionError::Duplicate(_)));
    }

    #[test]
    fn resolve_missing_id_fails() {
        let db: OdxLinkDatabase<usize> = OdxLinkDatabase::new();
        let id = OdxId::new("ghost", frag());
        assert!(matches!(
            db.resolve(&id),
            Err(ResolutionError::Unresolved(_))
        ));
    }

    #[test]
    fn short_name_resolution_ignores_global_db() {
        let scope = vec![("a", &1usize), ("b", &2usize)];
        let found = resolve_short_name(scope.into_iter(), "b").unwrap();
        assert_eq!(*found, 2);
    }
}
