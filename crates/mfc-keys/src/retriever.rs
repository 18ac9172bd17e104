//! Key retrieval
//!
//! A retriever hands the authenticator the key set for a card. Per-tag key
//! files live in `<root>/classic/<uid-hex>.json`; static key files in
//! `<root>/static/*.json` are merged into one set.

use std::fs;
use std::path::{Path, PathBuf};

use mfc_common::Buffer;
use tracing::{debug, info, warn};

use crate::file::{KeyFile, TYPE_CLASSIC_STATIC};
use crate::keyset::ClassicKeySet;
use crate::KeyError;

/// Source of key sets for the authenticator.
pub trait KeyRetriever {
    /// Keys dumped from the card with this UID, if any.
    fn for_tag_id(&self, tag_id: &[u8]) -> Option<ClassicKeySet>;

    /// All fleet-wide static keys merged into one set, if any.
    fn for_classic_static(&self) -> Option<ClassicKeySet>;
}

/// A retriever that never has keys; scans use the well-known keys only.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoKeys;

impl KeyRetriever for NoKeys {
    fn for_tag_id(&self, _tag_id: &[u8]) -> Option<ClassicKeySet> {
        None
    }

    fn for_classic_static(&self) -> Option<ClassicKeySet> {
        None
    }
}

/// Reads key files from a directory tree.
#[derive(Debug, Clone)]
pub struct DirectoryKeyRetriever {
    root: PathBuf,
    dictionary: Vec<Buffer>,
}

impl DirectoryKeyRetriever {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dictionary: Vec::new(),
        }
    }

    /// Keys used to resolve hashed entries in static key files.
    pub fn with_dictionary(mut self, dictionary: Vec<Buffer>) -> Self {
        self.dictionary = dictionary;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn load(path: &Path, bundle: &str) -> Result<(KeyFile, String), KeyError> {
        let text = fs::read_to_string(path)?;
        Ok((KeyFile::parse(&text)?, bundle.to_string()))
    }

    /// Every `.json` file in a subdirectory, sorted by name.
    fn json_files(&self, dir: &str) -> Vec<PathBuf> {
        let entries = match fs::read_dir(self.root.join(dir)) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir, error = %e, "key directory not readable");
                return Vec::new();
            }
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();
        files
    }
}

impl KeyRetriever for DirectoryKeyRetriever {
    fn for_tag_id(&self, tag_id: &[u8]) -> Option<ClassicKeySet> {
        let name = format!("classic/{}", hex::encode(tag_id));
        let path = self.root.join(format!("{name}.json"));
        if !path.exists() {
            return None;
        }

        match Self::load(&path, &name).and_then(|(file, bundle)| file.into_key_set(&bundle)) {
            Ok(keys) => {
                info!(file = %path.display(), keys = keys.key_count(), "loaded per-tag keys");
                Some(keys)
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "failed to load per-tag keys");
                None
            }
        }
    }

    fn for_classic_static(&self) -> Option<ClassicKeySet> {
        let mut merged: Option<ClassicKeySet> = None;

        for path in self.json_files("static") {
            let bundle = format!(
                "static/{}",
                path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
            );
            let loaded = Self::load(&path, &bundle).and_then(|(file, bundle)| {
                if file.key_type != TYPE_CLASSIC_STATIC {
                    debug!(file = %path.display(), "not a static key file, skipping");
                    return Ok(None);
                }
                file.into_key_set(&bundle).map(Some)
            });

            match loaded {
                Ok(Some(keys)) => match merged.as_mut() {
                    Some(all) => all.merge(keys),
                    None => merged = Some(keys),
                },
                Ok(None) => {}
                Err(e) => warn!(file = %path.display(), error = %e, "failed to load static keys"),
            }
        }

        let mut merged = merged?;
        if !merged.pending_hashes().is_empty() {
            let resolved = merged.qualify(&self.dictionary);
            debug!(resolved, "qualified hashed static keys");
        }
        info!(keys = merged.key_count(), "loaded static keys");
        Some(merged)
    }
}
