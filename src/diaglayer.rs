//! Diagnostic layers and their `PARENT-REF` inheritance (spec §4.7 "Diag
//! Layers"), plus the top-level `decode` entry point that combines service
//! identification with response decoding.

use fnv::FnvBuildHasher;
use indexmap::IndexMap;

use crate::diagcodedtypes::{DiagCodedType, StandardLengthType};
use crate::error::{InheritanceError, OdxError, Result};
use crate::identifier::{PrefixField, ServiceIdentifier};
use crate::odxtypes::{BaseDataType, ParamMap, Value};
use crate::parameters::Parameter;
use crate::service::DiagService;
use crate::structure::Structure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLayerType {
    Protocol,
    FunctionalGroup,
    BaseVariant,
    EcuVariant,
    EcuSharedData,
}

impl DiagLayerType {
    /// Resolution order parent layers are applied in when a variant
    /// inherits from more than one kind at once (spec §4.7).
    pub fn rank(self) -> u8 {
        match self {
            DiagLayerType::Protocol => 0,
            DiagLayerType::FunctionalGroup => 1,
            DiagLayerType::BaseVariant => 2,
            DiagLayerType::EcuVariant => 3,
            DiagLayerType::EcuSharedData => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParentRef {
    pub layer_short_name: String,
    pub not_inherited: Vec<String>,
    pub renames: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagLayer {
    pub short_name: String,
    pub variant_type: DiagLayerType,
    pub parent_refs: Vec<ParentRef>,
    pub services: Vec<DiagService>,
}

pub type LayerRegistry = IndexMap<String, DiagLayer, FnvBuildHasher>;

/// One decoded candidate produced by [`DiagLayer::decode`]: the service and
/// response structure that matched, plus the values it decoded to (spec §3
/// "Message").
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub coded_message: Vec<u8>,
    pub service_short_name: String,
    pub structure_short_name: String,
    pub is_negative_response: bool,
    pub param_dict: ParamMap,
}

impl DiagLayer {
    /// Resolve `PARENT-REF` inheritance into one flat `short_name -> service`
    /// map: parents are flattened first (in declaration order, each
    /// contributing after skipping its `not_inherited` list and applying its
    /// renames), then this layer's own services are layered on top,
    /// silently winning any short-name collision.
    pub fn flatten(&self, registry: &LayerRegistry) -> Result<IndexMap<String, DiagService, FnvBuildHasher>> {
        let mut path = Vec::new();
        self.flatten_rec(registry, &mut path)
    }

    fn flatten_rec(
        &self,
        registry: &LayerRegistry,
        path: &mut Vec<String>,
    ) -> Result<IndexMap<String, DiagService, FnvBuildHasher>> {
        if path.contains(&self.short_name) {
            return Err(OdxError::Resolution(crate::error::ResolutionError::CyclicParents(
                self.short_name.clone(),
            )));
        }
        path.push(self.short_name.clone());

        let mut merged: IndexMap<String, DiagService, FnvBuildHasher> = IndexMap::default();
        for pref in &self.parent_refs {
            let parent = registry.get(&pref.layer_short_name).ok_or_else(|| {
                OdxError::Resolution(crate::error::ResolutionError::Unresolved(
                    pref.layer_short_name.clone(),
                ))
            })?;
            let parent_services = parent.flatten_rec(registry, path)?;
            for (name, svc) in parent_services {
                if pref.not_inherited.contains(&name) {
                    continue;
                }
                let rename = pref.renames.iter().find(|(from, _)| from == &name);
                let final_name = rename.map(|(_, to)| to.clone()).unwrap_or_else(|| name.clone());
                if merged.contains_key(&final_name) {
                    return Err(if rename.is_some() {
                        OdxError::Inheritance(InheritanceError::RenameCollision {
                            layer: self.short_name.clone(),
                            target: final_name,
                        })
                    } else {
                        OdxError::Inheritance(InheritanceError::ConflictingOverride {
                            child_layer: self.short_name.clone(),
                            short_name: final_name,
                        })
                    });
                }
                let mut renamed_svc = svc;
                renamed_svc.short_name = final_name.clone();
                merged.insert(final_name, renamed_svc);
            }
        }
        path.pop();

        for svc in &self.services {
            merged.insert(svc.short_name.clone(), svc.clone());
        }
        Ok(merged)
    }

    /// Identify and decode every candidate service whose request prefix
    /// matches `bytes`. Never fails outright: an unrecognized message yields
    /// an empty `Vec`, matching the prefix tree's own "no match" behaviour.
    pub fn decode(&self, bytes: &[u8], registry: &LayerRegistry) -> Result<Vec<Message>> {
        let services = self.flatten(registry)?;
        let mut trie: ServiceIdentifier<&str> = ServiceIdentifier::new();
        for (name, svc) in &services {
            trie.insert_fields(&request_prefix(&svc.request), name);
        }
        let mut out = Vec::new();
        for name in trie.identify(bytes) {
            let svc = &services[name];
            // The request half of the round trip isn't available here; a
            // service is matched against its own encoded request bytes only
            // when decoding a response elsewhere. For direct message
            // identification we decode `bytes` as the request itself.
            if let Ok((params, consumed)) = svc.request.decode_params(bytes, None) {
                out.push(Message {
                    coded_message: bytes[..consumed].to_vec(),
                    service_short_name: svc.short_name.clone(),
                    structure_short_name: svc.request.short_name.clone(),
                    is_negative_response: false,
                    param_dict: params,
                });
                continue;
            }
            for resp in svc.pos_responses.iter().chain(svc.neg_responses.iter()) {
                if let Ok((params, consumed)) = resp.decode_params(bytes, None) {
                    out.push(Message {
                        coded_message: bytes[..consumed].to_vec(),
                        service_short_name: svc.short_name.clone(),
                        structure_short_name: resp.short_name.clone(),
                        is_negative_response: svc.neg_responses.iter().any(|r| r.short_name == resp.short_name),
                        param_dict: params,
                    });
                }
            }
        }
        if out.len() > 1 {
            log::warn!(
                "{} candidate message(s) matched {} bytes of input; disambiguation is left to the caller",
                out.len(),
                bytes.len()
            );
        }
        Ok(out)
    }
}

/// The leading run of constant-valued fields in a request, registered with
/// the service identifier trie. A field need not be byte-aligned or a full
/// byte wide: a `CODED-CONST` as narrow as a nibble still contributes its
/// own trie level, so two services sharing a leading byte but diverging on
/// a trailing sub-byte sub-function remain distinguishable (spec §4.7).
fn request_prefix(request: &Structure) -> Vec<PrefixField> {
    let mut prefix = Vec::new();
    for sp in &request.params {
        match &sp.parameter {
            Parameter::CodedConst(cc) => {
                if let DiagCodedType::StandardLength(StandardLengthType {
                    base_data_type: BaseDataType::AUint32,
                    bit_length,
                    bit_mask: None,
                    ..
                }) = &cc.diag_coded_type
                {
                    if let Value::UInt(v) = cc.coded_value {
                        let fits = *bit_length >= 64 || v < (1u64 << *bit_length);
                        if fits {
                            prefix.push(PrefixField {
                                value: v,
                                bit_length: *bit_length as u8,
                            });
                            continue;
                        }
                    }
                }
                break;
            }
            _ => break,
        }
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagcodedtypes::{DiagCodedType, StandardLengthType};
    use crate::parameters::{CodedConstParam, Parameter};
    use crate::structure::StructureParam;

    fn coded_const_request(sid: u64) -> Structure {
        Structure::new(
            "req",
            vec![StructureParam::flowing(Parameter::CodedConst(CodedConstParam {
                short_name: "sid".into(),
                diag_coded_type: DiagCodedType::StandardLength(StandardLengthType::new(
                    BaseDataType::AUint32,
                    8,
                )),
                coded_value: Value::UInt(sid),
            }))],
        )
    }

    fn service(name: &str, sid: u64) -> DiagService {
        DiagService {
            short_name: name.into(),
            request: coded_const_request(sid),
            pos_responses: vec![],
            neg_responses: vec![],
        }
    }

    #[test]
    fn flatten_merges_parent_and_child_services() {
        let mut registry: LayerRegistry = IndexMap::default();
        let parent = DiagLayer {
            short_name: "protocol".into(),
            variant_type: DiagLayerType::Protocol,
            parent_refs: vec![],
            services: vec![service("ping", 0x01)],
        };
        registry.insert(parent.short_name.clone(), parent);

        let child = DiagLayer {
            short_name: "ecu".into(),
            variant_type: DiagLayerType::EcuVariant,
            parent_refs: vec![ParentRef {
                layer_short_name: "protocol".into(),
                not_inherited: vec![],
                renames: vec![],
            }],
            services: vec![service("read_data", 0x22)],
        };

        let flattened = child.flatten(&registry).unwrap();
        assert_eq!(flattened.len(), 2);
        assert!(flattened.contains_key("ping"));
        assert!(flattened.contains_key("read_data"));
    }

    #[test]
    fn child_service_overrides_parent_on_name_collision() {
        let mut registry: LayerRegistry = IndexMap::default();
        let parent = DiagLayer {
            short_name: "protocol".into(),
            variant_type: DiagLayerType::Protocol,
            parent_refs: vec![],
            services: vec![service("ping", 0x01)],
        };
        registry.insert(parent.short_name.clone(), parent);

        let child = DiagLayer {
            short_name: "ecu".into(),
            variant_type: DiagLayerType::EcuVariant,
            parent_refs: vec![ParentRef {
                layer_short_name: "protocol".into(),
                not_inherited: vec![],
                renames: vec![],
            }],
            services: vec![service("ping", 0x99)],
        };

        let flattened = child.flatten(&registry).unwrap();
        assert_eq!(flattened.len(), 1);
        let merged = &flattened["ping"];
        assert_eq!(merged.request.decode_params(&[0x99], None).unwrap().0.len(), 1);
    }

    #[test]
    fn cyclic_parent_refs_are_rejected() {
        let mut registry: LayerRegistry = IndexMap::default();
        let a = DiagLayer {
            short_name: "a".into(),
            variant_type: DiagLayerType::BaseVariant,
            parent_refs: vec![ParentRef {
                layer_short_name: "b".into(),
                not_inherited: vec![],
                renames: vec![],
            }],
            services: vec![],
        };
        let b = DiagLayer {
            short_name: "b".into(),
            variant_type: DiagLayerType::BaseVariant,
            parent_refs: vec![ParentRef {
                layer_short_name: "a".into(),
                not_inherited: vec![],
                renames: vec![],
            }],
            services: vec![],
        };
        registry.insert(a.short_name.clone(), a.clone());
        registry.insert(b.short_name.clone(), b);

        let err = a.flatten(&registry).unwrap_err();
        assert!(matches!(
            err,
            OdxError::Resolution(crate::error::ResolutionError::CyclicParents(_))
        ));
    }

    #[test]
    fn decode_identifies_and_decodes_a_request() {
        let mut registry: LayerRegistry = IndexMap::default();
        let layer = DiagLayer {
            short_name: "ecu".into(),
            variant_type: DiagLayerType::EcuVariant,
            parent_refs: vec![],
            services: vec![service("read_data", 0x22)],
        };
        registry.insert(layer.short_name.clone(), layer.clone());

        let messages = layer.decode(&[0x22], &registry).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].service_short_name, "read_data");
    }
}
