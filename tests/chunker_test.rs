//! Chunking tests
//!
//! Check the properties playback relies on: every chunk fits the backend,
//! no text is lost or invented, and the same input always chunks the same
//! way.

use readaloud::speech::{chunk, chunk_text, normalize_whitespace, SpeechInput};

const ARTICLE: &str = "The committee met on Tuesday to review the proposal. \
    After a long discussion, which covered funding, staffing, and the timeline for \
    the first phase, members agreed to revisit the budget next month! Was the outcome \
    surprising? Not really: most observers expected a delay, given the scale of the \
    project and the number of agencies involved in approving each stage of the work.";

/// Chunks rejoined with single spaces must reproduce the normalized text
fn assert_rejoins(text: &str, chunks: &[String]) {
    assert_eq!(chunks.join(" "), normalize_whitespace(text));
}

/// Weaker check for hard cuts, which split words without a separator
fn assert_covers_characters(text: &str, chunks: &[String]) {
    let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
    let joined: String = chunks.iter().map(|c| strip(c)).collect();
    assert_eq!(joined, strip(&normalize_whitespace(text)));
}

fn assert_bounded(chunks: &[String], max: usize) {
    for chunk in chunks {
        assert!(!chunk.is_empty());
        assert!(
            chunk.chars().count() <= max,
            "chunk of {} chars exceeds {}: {:?}",
            chunk.chars().count(),
            max,
            chunk
        );
        assert_eq!(chunk.trim(), chunk, "chunk has outer whitespace: {:?}", chunk);
    }
}

#[test]
fn test_article_chunks_fit_every_backend_limit() {
    // Every word fits, so each break falls on a space
    for max in [20, 45, 80, 180, 220] {
        let chunks = chunk_text(ARTICLE, max);
        assert_bounded(&chunks, max);
        assert_rejoins(ARTICLE, &chunks);
    }

    // Words longer than the limit get hard cuts
    for max in [1, 7] {
        let chunks = chunk_text(ARTICLE, max);
        assert_bounded(&chunks, max);
        assert_covers_characters(ARTICLE, &chunks);
    }
}

#[test]
fn test_separators_are_neither_lost_nor_doubled() {
    let text = "  First line,\n\tsecond   line; third:   fourth.\n\nNext paragraph! ";
    for max in [12, 20, 220] {
        let chunks = chunk_text(text, max);
        assert_bounded(&chunks, max);
        assert_rejoins(text, &chunks);
    }
}

#[test]
fn test_short_text_is_one_chunk() {
    let chunks = chunk_text("Hello world. This is a test.", 220);
    assert_eq!(chunks, vec!["Hello world. This is a test."]);
}

#[test]
fn test_sentences_are_preferred_breaks() {
    let chunks = chunk_text(ARTICLE, 180);
    assert!(chunks[0].ends_with("proposal."));
    assert!(chunks.iter().all(|c| !c.starts_with(',')));
}

#[test]
fn test_long_unbroken_text_is_hard_cut() {
    let text = "x".repeat(10_000);
    let chunks = chunk_text(&text, 220);

    assert_eq!(chunks.len(), 46);
    assert!(chunks[..45].iter().all(|c| c.len() == 220));
    assert_eq!(chunks[45].len(), 100);
    assert_eq!(chunks.concat(), text);
}

#[test]
fn test_chinese_text_chunks_on_cjk_punctuation() {
    let text = "今天天气很好，我们去公园散步。公园里有很多人，有的在跑步，有的在下棋。晚上我们回家吃饭。";
    let chunks = chunk_text(text, 12);

    assert_bounded(&chunks, 12);
    assert_eq!(chunks.concat(), text);
    assert_eq!(chunks[0], "今天天气很好，");
}

#[test]
fn test_whitespace_only_input_has_no_chunks() {
    assert!(chunk_text("", 220).is_empty());
    assert!(chunk_text(" \n\t  ", 220).is_empty());
    assert!(chunk(&SpeechInput::Items(vec!["  ".into(), "\n".into()]), 220).is_empty());
}

#[test]
fn test_items_chunk_independently() {
    let input = SpeechInput::from(vec!["Summary", "Point one.", "Point two."]);
    assert_eq!(
        chunk(&input, 220),
        vec!["Summary", "Point one.", "Point two."]
    );
}

#[test]
fn test_json_summary_chunks_in_document_order() {
    let value = serde_json::json!({
        "title": "Weekly report",
        "points": ["Sales rose.", "Costs fell."],
        "count": 2
    });
    let input = SpeechInput::from_json(&value);
    assert_eq!(
        chunk(&input, 220),
        vec!["Weekly report", "Sales rose.", "Costs fell."]
    );
}

#[test]
fn test_chunking_is_deterministic() {
    let first = chunk_text(ARTICLE, 45);
    for _ in 0..5 {
        assert_eq!(chunk_text(ARTICLE, 45), first);
    }
}
