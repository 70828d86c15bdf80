//! End-to-end properties of the chunking pipeline at production parameters.

use wagescope::chunking::{chunk_text, split_sentences};

fn corpus_text(sentences: usize) -> String {
    (0..sentences)
        .map(|i| {
            format!(
                "Sentence number {i} covers payroll rule {} with deductions and allowances.",
                i * 7 % 13
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[test]
fn every_sentence_appears_once_in_order() {
    let text = corpus_text(60);
    let sentences = split_sentences(&text);
    assert_eq!(sentences.len(), 60);

    let chunks = chunk_text(&text, 400, 80);
    assert!(chunks.len() > 1, "60 sentences must span several chunks");

    let joined = chunks.join(" ");
    let mut cursor = 0usize;
    for sentence in &sentences {
        let at = joined[cursor..]
            .find(sentence.as_str())
            .unwrap_or_else(|| panic!("missing sentence: {sentence}"));
        cursor += at + sentence.len();
    }
}

#[test]
fn adjacent_chunks_share_the_overlap_tail() {
    let text = corpus_text(40);
    let overlap = 80usize;
    let chunks = chunk_text(&text, 400, overlap);
    assert!(chunks.len() > 1);

    for pair in chunks.windows(2) {
        let prev = &pair[0];
        let next = &pair[1];
        let prev_chars: Vec<char> = prev.chars().collect();
        let tail: String = prev_chars[prev_chars.len().saturating_sub(overlap)..]
            .iter()
            .collect();
        assert!(
            next.starts_with(&tail),
            "chunk must start with the previous tail:\n tail: {tail:?}\n next: {next:?}"
        );
    }
}

#[test]
fn chunks_never_exceed_the_budget() {
    let text = corpus_text(80);
    for (max_chars, overlap) in [(200, 40), (400, 80), (1200, 200)] {
        for chunk in chunk_text(&text, max_chars, overlap) {
            assert!(
                chunk.chars().count() <= max_chars,
                "budget {max_chars} exceeded: {} chars",
                chunk.chars().count()
            );
        }
    }
}

#[test]
fn default_parameters_are_deterministic() {
    let text = corpus_text(50);
    let first = chunk_text(&text, 1200, 200);
    let second = chunk_text(&text, 1200, 200);
    assert_eq!(first, second);
}

#[test]
fn whitespace_only_input_produces_nothing() {
    assert!(chunk_text("", 1200, 200).is_empty());
    assert!(chunk_text(" \n\t \r\n ", 1200, 200).is_empty());
}
