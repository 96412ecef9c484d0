//! Recursive character text splitter.
//!
//! Documents are cut into bounded chunks with a fixed character overlap,
//! preferring to break on paragraph boundaries, then lines, then words,
//! and only then mid-word. Retrieval quality depends on these boundaries,
//! so the constants here are the single source of truth for ingestion.

/// Maximum chunk length, in characters.
pub const CHUNK_SIZE: usize = 500;
/// Characters shared between neighboring chunks.
pub const CHUNK_OVERLAP: usize = 50;
/// Split separators in priority order; the empty string means
/// character-level splitting as the last resort.
pub const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

pub fn chunk_text(text: &str) -> Vec<String> {
    chunk_text_with(text, CHUNK_SIZE, CHUNK_OVERLAP)
}

pub fn chunk_text_with(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    recursive_split(text, chunk_size, overlap, &SEPARATORS)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// First separator actually present in the text, plus the finer ones left
/// to recurse into for oversized pieces.
fn pick_separator<'a>(text: &str, separators: &'a [&'a str]) -> (&'a str, &'a [&'a str]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() || text.contains(sep) {
            return (sep, &separators[i + 1..]);
        }
    }
    ("", &[])
}

fn recursive_split(text: &str, chunk_size: usize, overlap: usize, separators: &[&str]) -> Vec<String> {
    let (separator, finer) = pick_separator(text, separators);

    let pieces: Vec<String> = if separator.is_empty() {
        text.chars().map(|c| c.to_string()).collect()
    } else {
        text.split(separator).map(|s| s.to_string()).collect()
    };

    let mut chunks = Vec::new();
    let mut fitting: Vec<String> = Vec::new();

    for piece in pieces {
        if char_len(&piece) <= chunk_size {
            fitting.push(piece);
        } else {
            if !fitting.is_empty() {
                merge_pieces(&mut chunks, &fitting, separator, chunk_size, overlap);
                fitting.clear();
            }
            chunks.extend(recursive_split(&piece, chunk_size, overlap, finer));
        }
    }
    if !fitting.is_empty() {
        merge_pieces(&mut chunks, &fitting, separator, chunk_size, overlap);
    }

    chunks
}

/// Greedily pack pieces into chunks up to `chunk_size`, carrying a tail of
/// at most `overlap` characters into the next chunk.
fn merge_pieces(
    chunks: &mut Vec<String>,
    pieces: &[String],
    separator: &str,
    chunk_size: usize,
    overlap: usize,
) {
    let sep_len = char_len(separator);
    let mut window: Vec<&String> = Vec::new();
    let mut total = 0usize;

    for piece in pieces {
        let piece_len = char_len(piece);
        let joined = piece_len + if window.is_empty() { 0 } else { sep_len };

        if total + joined > chunk_size && !window.is_empty() {
            emit(chunks, &window, separator);
            while total > overlap
                || (total > 0
                    && total + piece_len + if window.is_empty() { 0 } else { sep_len }
                        > chunk_size)
            {
                let removed = char_len(window[0]);
                total -= removed + if window.len() > 1 { sep_len } else { 0 };
                window.remove(0);
            }
        }

        total += piece_len + if window.is_empty() { 0 } else { sep_len };
        window.push(piece);
    }

    emit(chunks, &window, separator);
}

fn emit(chunks: &mut Vec<String>, window: &[&String], separator: &str) {
    let chunk = window
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(separator)
        .trim()
        .to_string();
    if !chunk.is_empty() {
        chunks.push(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(chunk_text("").is_empty());
        assert!(chunk_text("   \n\n  ").is_empty());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = chunk_text("Our return policy is 30 days.");
        assert_eq!(chunks, vec!["Our return policy is 30 days."]);
    }

    #[test]
    fn test_paragraph_boundaries_preferred() {
        let para_a = "a".repeat(300);
        let para_b = "b".repeat(300);
        let text = format!("{para_a}\n\n{para_b}");

        let chunks = chunk_text(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], para_a);
        assert_eq!(chunks[1], para_b);
    }

    #[test]
    fn test_word_level_overlap() {
        let words: Vec<String> = (0..200).map(|i| format!("w{i}")).collect();
        let text = words.join(" ");

        let chunks = chunk_text_with(&text, 100, 20);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
        }
        // The head of each chunk after the first repeats words from its
        // predecessor.
        for pair in chunks.windows(2) {
            let first_word = pair[1].split(' ').next().unwrap();
            assert!(
                pair[0].split(' ').any(|w| w == first_word),
                "no overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_character_fallback_for_unbroken_text() {
        let text = "a".repeat(1200);
        let chunks = chunk_text(&text);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 500);
        assert_eq!(chunks[1].len(), 500);
        for chunk in &chunks {
            assert!(chunk.len() <= CHUNK_SIZE);
        }
    }

    #[test]
    fn test_multibyte_counts_characters_not_bytes() {
        // 300 three-byte characters; byte-based splitting would cut this
        let text = "あ".repeat(300);
        let chunks = chunk_text(&text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chars().count(), 300);
    }
}
