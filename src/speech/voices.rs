//! Voice selection
//!
//! Platforms expose voices with loosely formatted language tags ("en-US",
//! "en_GB", "cmn-Hans-CN"). Selection ranks them against the requested tag
//! in three tiers and breaks ties deterministically, so the same voice list
//! always yields the same voice.

use crate::lang::{normalize_tag, primary_subtag};
use serde::Serialize;
use std::cmp::Ordering;

/// A synthesis voice exposed by the platform
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Voice {
    /// Backend-specific identifier used to select the voice
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Language tag as reported by the platform
    pub lang: String,
    /// Whether synthesis happens on this machine (vs. a network service)
    pub local_service: bool,
}

impl Voice {
    pub fn new(id: &str, name: &str, lang: &str, local_service: bool) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            lang: lang.to_string(),
            local_service,
        }
    }
}

/// Pick the voice that best matches `target_lang`
///
/// Tiers, first non-empty wins:
/// 1. exact tag match (case-insensitive)
/// 2. voice tag starts with the target's language portion
/// 3. voice tag contains the target's language portion
///
/// Within a tier, local voices beat network ones, then names sort
/// lexicographically.
pub fn pick_best_voice<'a>(voices: &'a [Voice], target_lang: &str) -> Option<&'a Voice> {
    let target = normalize_tag(target_lang);
    if target.is_empty() {
        return None;
    }
    let primary = primary_subtag(target_lang);

    let tiers: [&dyn Fn(&str) -> bool; 3] = [
        &|lang: &str| lang == target,
        &|lang: &str| !primary.is_empty() && lang.starts_with(primary.as_str()),
        &|lang: &str| !primary.is_empty() && lang.contains(primary.as_str()),
    ];

    tiers.iter().find_map(|matches| {
        voices
            .iter()
            .filter(|voice| matches(normalize_tag(&voice.lang).as_str()))
            .min_by(|a, b| rank(a, b))
    })
}

/// Ordering within a tier: local first, then name, lang, id
fn rank(a: &Voice, b: &Voice) -> Ordering {
    b.local_service
        .cmp(&a.local_service)
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.lang.cmp(&b.lang))
        .then_with(|| a.id.cmp(&b.id))
}
