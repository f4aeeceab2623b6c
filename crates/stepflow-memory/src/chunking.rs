/// Words per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Words shared between consecutive chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Split `text` on whitespace into windows of `chunk_size` words, each
/// starting `chunk_size - overlap` words after the previous one.
///
/// The final windows may be shorter than `chunk_size`.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let size = chunk_size.max(1);
    let step = size.saturating_sub(overlap).max(1);

    (0..words.len())
        .step_by(step)
        .map(|start| words[start..(start + size).min(words.len())].join(" "))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 10, 2).is_empty());
        assert!(chunk_text("   \n\t", 10, 2).is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("the  quick\nbrown fox", 1000, 200);
        assert_eq!(chunks, vec!["the quick brown fox"]);
    }

    #[test]
    fn test_windows_overlap() {
        let chunks = chunk_text(&words(10), 4, 1);
        assert_eq!(chunks[0], "w0 w1 w2 w3");
        assert_eq!(chunks[1], "w3 w4 w5 w6");
        assert_eq!(chunks[2], "w6 w7 w8 w9");
        assert_eq!(chunks[3], "w9");
        assert_eq!(chunks.len(), 4);
    }

    #[test]
    fn test_default_window() {
        let chunks = chunk_text(&words(2000), DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP);
        // starts at 0, 800, 1600
        assert_eq!(chunks.len(), 3);
        assert!(chunks[1].starts_with("w800 "));
        assert_eq!(chunks[2].split(' ').count(), 400);
    }

    #[test]
    fn test_overlap_not_smaller_than_size() {
        let chunks = chunk_text(&words(3), 2, 5);
        assert_eq!(chunks, vec!["w0 w1", "w1 w2", "w2"]);
    }
}
