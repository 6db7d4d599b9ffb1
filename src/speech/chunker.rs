//! Text segmentation for playback
//!
//! Speech backends choke on long utterances (the remote endpoint rejects
//! them outright, platform synthesizers stall or drop audio), so text is cut
//! into bounded chunks before it is queued. Chunks follow sentence
//! boundaries where possible, then softer break characters, and only as a
//! last resort a hard cut.

use crate::speech::input::SpeechInput;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

/// Runs of whitespace collapse to a single space
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// A sentence: anything up to and including a run of terminators, or the
/// unterminated tail of the text
static SENTENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^.!?。！？]*[.!?。！？]+|[^.!?。！？]+$").expect("valid regex")
});

/// Punctuation a long sentence may be broken after
const BREAK_PUNCTUATION: &[char] = &[',', ':', ';', '，', '、', '：', '；'];

/// A piece of text waiting to be merged into a chunk
struct Unit {
    text: String,
    /// Whether a space separated this unit from the previous one
    spaced: bool,
}

/// Collapse whitespace runs to one space and trim the ends
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Split input into playback chunks of at most `max_chars` characters
///
/// Each item of the input is chunked separately. Empty or whitespace-only
/// input produces no chunks.
pub fn chunk(input: &SpeechInput, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();

    for item in input.items() {
        chunk_item(item, max_chars, &mut chunks);
    }

    debug!(
        "Chunked input into {} chunks (max {} chars)",
        chunks.len(),
        max_chars
    );
    chunks
}

/// Convenience wrapper for a single block of text
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    chunk(&SpeechInput::from(text), max_chars)
}

fn chunk_item(item: &str, max_chars: usize, chunks: &mut Vec<String>) {
    let normalized = normalize_whitespace(item);
    if normalized.is_empty() {
        return;
    }

    let mut units = Vec::new();
    for m in SENTENCE.find_iter(&normalized) {
        let raw = m.as_str();
        let sentence = raw.trim();
        if sentence.is_empty() {
            continue;
        }
        split_long(sentence, raw.starts_with(' '), max_chars, &mut units);
    }

    merge_units(units, max_chars, chunks);
}

/// Push `sentence` as one or more units no longer than `max_chars`
fn split_long(sentence: &str, spaced: bool, max_chars: usize, units: &mut Vec<Unit>) {
    let mut rest = sentence;
    let mut spaced = spaced;

    while !rest.is_empty() {
        if rest.chars().count() <= max_chars {
            units.push(Unit {
                text: rest.to_string(),
                spaced,
            });
            return;
        }

        let (head, tail, tail_spaced) = split_at_break(rest, max_chars);
        units.push(Unit {
            text: head.to_string(),
            spaced,
        });
        rest = tail;
        spaced = tail_spaced;
    }
}

/// Cut `text` (longer than `max_chars`) at the last break inside the window
///
/// Returns the head, the remaining text, and whether a space separated them.
/// Whitespace breaks are dropped; punctuation stays with the head. Without
/// any break the text is cut at exactly `max_chars`.
fn split_at_break(text: &str, max_chars: usize) -> (&str, &str, bool) {
    let window: Vec<(usize, char)> = text.char_indices().take(max_chars + 1).collect();

    for pos in (1..window.len()).rev() {
        let (byte, c) = window[pos];
        if c.is_whitespace() {
            let head = text[..byte].trim_end();
            if head.is_empty() {
                continue;
            }
            return (head, text[byte + c.len_utf8()..].trim_start(), true);
        }
        if pos < max_chars && BREAK_PUNCTUATION.contains(&c) {
            let end = byte + c.len_utf8();
            let tail = &text[end..];
            return (&text[..end], tail.trim_start(), tail.starts_with(' '));
        }
    }

    let cut = window
        .get(max_chars)
        .map(|&(byte, _)| byte)
        .unwrap_or(text.len());
    (&text[..cut], &text[cut..], false)
}

/// Greedily merge adjacent units while the chunk stays within `max_chars`
fn merge_units(units: Vec<Unit>, max_chars: usize, chunks: &mut Vec<String>) {
    let mut current = String::new();
    let mut current_len = 0;

    for unit in units {
        let unit_len = unit.text.chars().count();
        if current.is_empty() {
            current = unit.text;
            current_len = unit_len;
            continue;
        }

        let sep = usize::from(unit.spaced);
        if current_len + sep + unit_len <= max_chars {
            if unit.spaced {
                current.push(' ');
            }
            current.push_str(&unit.text);
            current_len += sep + unit_len;
        } else {
            chunks.push(std::mem::take(&mut current));
            current = unit.text;
            current_len = unit_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
}
