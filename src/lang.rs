//! Language tag helpers
//!
//! The reader stores short language codes ("en", "zh", "ms", "ta") in its
//! preferences, while voice backends want full locale tags. These helpers
//! bridge the two and answer the one question the playback engine asks of a
//! tag: is it English?

/// Default tag used when a caller does not name a language
pub const DEFAULT_LANG: &str = "en-US";

/// Short reader codes and the speech tags they map to
const SPEECH_TAGS: &[(&str, &str)] = &[
    ("en", "en-US"),
    ("zh", "zh-CN"),
    ("ms", "ms-MY"),
    ("ta", "ta-IN"),
];

/// Language portion of a tag, lowercased ("zh-CN" -> "zh", "pt_BR" -> "pt")
pub fn primary_subtag(tag: &str) -> String {
    tag.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or("")
        .to_lowercase()
}

/// Is this an English tag?
///
/// An empty tag counts as English since playback falls back to
/// [`DEFAULT_LANG`] in that case.
pub fn is_english(tag: &str) -> bool {
    let primary = primary_subtag(tag);
    primary.is_empty() || primary == "en"
}

/// Map a reader language code to a speech tag
///
/// Known short codes expand to their regional tag; anything else (including
/// tags that already carry a region) passes through trimmed.
pub fn speech_tag(code: &str) -> String {
    let code = code.trim();
    if code.is_empty() {
        return DEFAULT_LANG.to_string();
    }

    SPEECH_TAGS
        .iter()
        .find(|(short, _)| short.eq_ignore_ascii_case(code))
        .map(|(_, tag)| tag.to_string())
        .unwrap_or_else(|| code.to_string())
}

/// Normalize a tag for comparison: lowercase, `_` treated as `-`
pub(crate) fn normalize_tag(tag: &str) -> String {
    tag.trim().replace('_', "-").to_lowercase()
}
