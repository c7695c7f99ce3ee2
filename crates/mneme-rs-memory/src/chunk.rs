//! Splitting event text into archive chunks.

/// Split text into chunks of at most `max_chars` characters.
///
/// Chunks break at whitespace; a single word longer than `max_chars` is cut
/// into character slices. Whitespace runs collapse to one space. The output
/// depends only on the input, so re-chunking the same text yields the same
/// chunk indices.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars = word.chars().collect::<Vec<_>>();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        let needed = if current.is_empty() {
            word_len
        } else {
            current_len + 1 + word_len
        };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::chunk_text;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(chunk_text("  hello   world ", 100), vec!["hello world"]);
    }

    #[test]
    fn splits_at_word_boundaries() {
        assert_eq!(
            chunk_text("alpha beta gamma delta", 11),
            vec!["alpha beta", "gamma delta"]
        );
    }

    #[test]
    fn long_words_are_sliced() {
        assert_eq!(chunk_text("ab abcdefg", 3), vec!["ab", "abc", "def", "g"]);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(chunk_text(" \n\t", 10).is_empty());
    }
}
