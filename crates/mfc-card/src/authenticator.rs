//! Per-sector key search
//!
//! For each sector the authenticator first tries the keys the key source
//! associates with that sector, ordered so that bundles which already worked
//! on this card come first. If that fails it falls back to every key the
//! source knows. Both phases repeat up to the retry limit, which also
//! absorbs flaky radio links: a lost frame looks the same as a wrong key.

use mfc_common::Buffer;
use mfc_keys::{ClassicKeySet, ClassicKeys, KeyRetriever, KeyType, SectorKey};
use tracing::{debug, info};

use crate::feedback::TagReaderFeedback;
use crate::tech::ClassicCardTech;
use crate::CardError;

pub struct ClassicAuthenticator {
    keys: Box<dyn ClassicKeys>,
    is_fallback: bool,
    is_dynamic: bool,
    max_progress: usize,
    retry_limit: usize,
    preferred_bundles: Vec<String>,
}

impl ClassicAuthenticator {
    pub fn new(
        keys: Box<dyn ClassicKeys>,
        is_fallback: bool,
        is_dynamic: bool,
        max_progress: usize,
        retry_limit: usize,
    ) -> Self {
        Self {
            keys,
            is_fallback,
            is_dynamic,
            max_progress,
            retry_limit,
            preferred_bundles: Vec::new(),
        }
    }

    /// Pick the best key source for a card: keys dumped from this very card,
    /// then fleet-wide static keys, then the well-known keys alone.
    pub fn make_authenticator(
        tag_id: &Buffer,
        retriever: &dyn KeyRetriever,
        max_progress: usize,
        retry_limit: usize,
    ) -> Self {
        if let Some(keys) = retriever.for_tag_id(tag_id) {
            info!(tag_id = %tag_id, "using per-tag keys");
            return Self::new(Box::new(keys), false, true, max_progress, retry_limit);
        }
        if let Some(keys) = retriever.for_classic_static() {
            info!("using static keys");
            return Self::new(Box::new(keys), false, false, max_progress, retry_limit);
        }
        info!("no keys for this card, trying well-known keys");
        Self::new(
            Box::new(ClassicKeySet::fallback()),
            true,
            false,
            max_progress,
            retry_limit,
        )
    }

    pub fn is_fallback(&self) -> bool {
        self.is_fallback
    }

    pub fn is_dynamic(&self) -> bool {
        self.is_dynamic
    }

    /// Bundles that authenticated on this card, most recent first.
    pub fn preferred_bundles(&self) -> &[String] {
        &self.preferred_bundles
    }

    fn promote(&mut self, bundle: &str) {
        self.preferred_bundles.retain(|b| b != bundle);
        self.preferred_bundles.insert(0, bundle.to_string());
    }

    fn try_key(
        &mut self,
        tech: &mut dyn ClassicCardTech,
        sector: usize,
        key: &SectorKey,
    ) -> Result<bool, CardError> {
        match tech.authenticate(sector, key) {
            Ok(true) => {
                debug!(sector, bundle = %key.bundle, key_type = ?key.key_type, "authenticated");
                self.promote(&key.bundle);
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) if e.is_card_lost() => Err(e),
            Err(e) => {
                debug!(sector, error = %e, "authentication attempt failed");
                Ok(false)
            }
        }
    }

    fn try_candidates_sub(
        &mut self,
        tech: &mut dyn ClassicCardTech,
        sector: usize,
        candidates: impl Iterator<Item = SectorKey>,
    ) -> Result<Option<SectorKey>, CardError> {
        for key in candidates {
            if self.try_key(tech, sector, &key)? {
                return Ok(Some(key));
            }
        }
        Ok(None)
    }

    fn try_candidates(
        &mut self,
        tech: &mut dyn ClassicCardTech,
        sector: usize,
        candidates: &[SectorKey],
        key_type: KeyType,
    ) -> Result<Option<SectorKey>, CardError> {
        if key_type != KeyType::Unknown {
            let typed = candidates.iter().map(|k| k.with_type(key_type));
            return self.try_candidates_sub(tech, sector, typed);
        }
        let canonical = candidates.iter().map(SectorKey::canon_type);
        if let Some(key) = self.try_candidates_sub(tech, sector, canonical)? {
            return Ok(Some(key));
        }
        self.try_candidates_sub(tech, sector, candidates.iter().map(SectorKey::invert_type))
    }

    /// Find a working key for `sector`.
    ///
    /// `expect_dynamic` comes from the decoder that recognised the card: when
    /// it says the sector uses per-card keys and our key source is not
    /// per-card, one pass over the candidates is all that is attempted.
    ///
    /// Returns `Ok(None)` when no key worked. Only a lost card is an error.
    pub fn authenticate(
        &mut self,
        tech: &mut dyn ClassicCardTech,
        feedback: &mut dyn TagReaderFeedback,
        sector: usize,
        expect_dynamic: bool,
        key_type: KeyType,
    ) -> Result<Option<SectorKey>, CardError> {
        let fail_fast = !self.is_dynamic && expect_dynamic;

        feedback.update_progress_bar(sector * 5, self.max_progress);
        if self.is_fallback {
            feedback.update_status_text(&format!("Trying default keys for sector {sector}..."));
        } else {
            feedback.update_status_text(&format!(
                "Authenticating sector {sector} with known keys..."
            ));
        }

        let tries = if fail_fast { 1 } else { self.retry_limit };
        for attempt in 0..tries {
            debug!(sector, attempt, "authenticating with sector candidates");
            let candidates = self.keys.candidates(sector, &self.preferred_bundles);
            if let Some(key) = self.try_candidates(tech, sector, &candidates, key_type)? {
                return Ok(Some(key));
            }
        }

        if fail_fast {
            debug!(sector, "sector uses per-card keys, giving up");
            return Ok(None);
        }

        feedback.update_progress_bar(sector * 5 + 2, self.max_progress);

        for attempt in 0..self.retry_limit {
            debug!(sector, attempt, "authenticating with all keys");
            feedback.update_status_text(&format!("Trying other keys for sector {sector}..."));
            let all_keys = self.keys.all_keys();
            if let Some(key) = self.try_candidates(tech, sector, &all_keys, key_type)? {
                info!(sector, "authenticated with a key not listed for this sector");
                return Ok(Some(key));
            }
        }

        debug!(sector, "no key found");
        Ok(None)
    }
}
