use atlas_core::error::{AtlasError, Result};

/// Fixed-size overlapping windows over a text, measured in characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunks {
    pub chunks: Vec<String>,
    /// The text needed more than `max_chunks` windows; the tail was dropped.
    pub truncated: bool,
}

fn check_window(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(AtlasError::Validation("chunkSize must be greater than 0".into()));
    }
    if chunk_overlap >= chunk_size {
        return Err(AtlasError::Validation(format!(
            "chunkOverlap ({chunk_overlap}) must be smaller than chunkSize ({chunk_size})"
        )));
    }
    Ok(())
}

/// Number of windows needed to cover `len` characters:
/// `ceil((len - overlap) / (size - overlap))`, at least 1 for non-empty input.
pub fn chunk_count(len: usize, chunk_size: usize, chunk_overlap: usize) -> Result<usize> {
    check_window(chunk_size, chunk_overlap)?;
    if len == 0 {
        return Ok(0);
    }
    if len <= chunk_overlap {
        return Ok(1);
    }
    let step = chunk_size - chunk_overlap;
    Ok((len - chunk_overlap).div_ceil(step).max(1))
}

pub fn split_into_chunks(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    max_chunks: usize,
) -> Result<Chunks> {
    let chars: Vec<char> = text.chars().collect();
    let needed = chunk_count(chars.len(), chunk_size, chunk_overlap)?;
    let step = chunk_size - chunk_overlap;
    let kept = needed.min(max_chunks);

    let chunks = (0..kept)
        .map(|i| {
            let start = i * step;
            let end = (start + chunk_size).min(chars.len());
            chars[start..end].iter().collect()
        })
        .collect();

    Ok(Chunks {
        chunks,
        truncated: needed > max_chunks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_has_no_chunks() {
        let result = split_into_chunks("", 10, 2, 100).unwrap();
        assert!(result.chunks.is_empty());
        assert!(!result.truncated);
    }

    #[test]
    fn short_text_is_one_chunk() {
        let result = split_into_chunks("hello", 10, 2, 100).unwrap();
        assert_eq!(result.chunks, vec!["hello"]);
    }

    #[test]
    fn count_matches_formula() {
        // ceil((25 - 2) / (10 - 2)) = ceil(23 / 8) = 3
        assert_eq!(chunk_count(25, 10, 2).unwrap(), 3);
        assert_eq!(chunk_count(10, 10, 2).unwrap(), 1);
        assert_eq!(chunk_count(11, 10, 2).unwrap(), 2);
        assert_eq!(chunk_count(2, 10, 2).unwrap(), 1);
        assert_eq!(chunk_count(3000, 1000, 200).unwrap(), 4);

        let text = "x".repeat(25);
        assert_eq!(split_into_chunks(&text, 10, 2, 100).unwrap().chunks.len(), 3);
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text: String = ('a'..='z').collect();
        let result = split_into_chunks(&text, 10, 3, 100).unwrap();
        assert_eq!(result.chunks[0], "abcdefghij");
        assert_eq!(result.chunks[1], "hijklmnopq");
        assert_eq!(result.chunks.last().unwrap().chars().last(), Some('z'));
    }

    #[test]
    fn slicing_is_by_character_not_byte() {
        let text = "héllo wörld ünïcode";
        let result = split_into_chunks(text, 5, 0, 100).unwrap();
        assert_eq!(result.chunks[0], "héllo");
        assert_eq!(result.chunks.concat(), text);
    }

    #[test]
    fn max_chunks_bounds_output() {
        let text = "x".repeat(100);
        let result = split_into_chunks(&text, 10, 0, 3).unwrap();
        assert_eq!(result.chunks.len(), 3);
        assert!(result.truncated);
    }

    #[test]
    fn invalid_window_is_rejected() {
        assert!(matches!(
            split_into_chunks("abc", 0, 0, 10),
            Err(AtlasError::Validation(_))
        ));
        assert!(matches!(
            split_into_chunks("abc", 10, 10, 10),
            Err(AtlasError::Validation(_))
        ));
    }
}
