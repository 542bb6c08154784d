//! Drives `Database::load` through a real filesystem-backed `Archive`
//! instead of an in-memory stub, the way the teacher's own round-trip
//! tests write fixtures to a `tempfile::tempdir()` and read them back.

use std::fs;

use odx::archive::{Archive, DocumentLoader, ParsedDocument};
use odx::database::{Config, Database};
use odx::diaglayer::{DiagLayer, DiagLayerType};
use odx::error::Result;

struct DirArchive {
    dir: std::path::PathBuf,
}

impl Archive for DirArchive {
    fn entries(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir).expect("read temp dir") {
            let entry = entry.expect("dir entry");
            let name = entry.file_name().to_string_lossy().into_owned();
            let bytes = fs::read(entry.path()).expect("read entry bytes");
            out.push((name, bytes));
        }
        Ok(out)
    }
}

struct NameEchoLoader;
impl DocumentLoader for NameEchoLoader {
    fn parse(&self, entry_name: &str, bytes: &[u8]) -> Result<ParsedDocument> {
        let layer = DiagLayer {
            short_name: entry_name.trim_end_matches(".odx-d").into(),
            variant_type: DiagLayerType::EcuVariant,
            parent_refs: vec![],
            services: vec![],
        };
        Ok(ParsedDocument {
            model_version: Some(String::from_utf8_lossy(bytes).into_owned()),
            diag_layers: vec![layer],
            comparam_subset: None,
        })
    }
}

#[test]
fn database_loads_entries_from_a_real_directory() {
    let tmp_dir = tempfile::tempdir().expect("failed to create temporary directory");
    fs::write(tmp_dir.path().join("ecu_b.odx-d"), b"2.2.0").unwrap();
    fs::write(tmp_dir.path().join("ecu_a.odx-d"), b"2.0.0").unwrap();

    let archive = DirArchive { dir: tmp_dir.path().to_path_buf() };
    let db = Database::load(&archive, &NameEchoLoader, Config::default()).unwrap();

    assert_eq!(db.layers.len(), 2);
    assert!(db.layers.contains_key("ecu_a"));
    assert!(db.layers.contains_key("ecu_b"));
    assert_eq!(db.model_version.unwrap().major, 2);
    assert_eq!(db.model_version.unwrap().minor, 2);
}
