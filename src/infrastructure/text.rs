//! Tokenization shared by the lexical index and the hashing embedder

use unicode_segmentation::UnicodeSegmentation;

/// Lower-cased Unicode word tokens; punctuation and whitespace are dropped
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words().map(str::to_lowercase).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("What's the capital of France?"),
            vec!["what's", "the", "capital", "of", "france"]
        );
        assert_eq!(tokenize("Café   crème!"), vec!["café", "crème"]);
        assert!(tokenize("  ?! ").is_empty());
    }
}
