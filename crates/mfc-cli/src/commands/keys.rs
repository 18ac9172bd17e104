use std::fs;
use std::path::Path;

use anyhow::Context as _;
use mfc_keys::{ClassicKeySet, KeySetKind};

use super::load_dictionary;

/// Summarise a key file, optionally resolving hashed entries against a
/// dictionary.
pub fn cmd_keys(path: &Path, dictionary: Option<&Path>) -> anyhow::Result<()> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let bundle = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("keys")
        .to_string();
    let mut keys = ClassicKeySet::from_json(&text, &bundle)
        .with_context(|| format!("parsing {}", path.display()))?;

    let kind = match keys.kind {
        KeySetKind::PerTag => "per-tag",
        KeySetKind::Static => "static",
    };
    println!("Key file: {}", path.display());
    println!("  Kind: {kind}");
    if let Some(tag_id) = &keys.tag_id {
        println!("  Tag ID: {tag_id}");
    }
    if let Some(description) = &keys.description {
        println!("  Description: {description}");
    }

    if let Some(dictionary) = dictionary {
        let dictionary = load_dictionary(dictionary)?;
        let pending = keys.pending_hashes().len();
        let resolved = keys.qualify(&dictionary);
        println!("  Hashed entries resolved: {resolved} of {pending}");
    } else if !keys.pending_hashes().is_empty() {
        println!(
            "  Hashed entries: {} (pass --dictionary to resolve)",
            keys.pending_hashes().len()
        );
    }

    println!("  Distinct keys: {}", keys.key_count());
    for (sector, sector_keys) in keys.sectors() {
        for key in sector_keys {
            println!("    sector {sector:2} {:?} {} [{}]", key.key_type, key.key, key.bundle);
        }
    }
    Ok(())
}
