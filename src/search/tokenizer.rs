//! Shared text tokenizer
//!
//! One tokenizer serves every text consumer (the BM25 index today), so
//! indexing and querying can never drift apart. Mixed-script text is split
//! without a segmentation dictionary:
//!
//! - CJK runs emit every character (unigram) plus every overlapping
//!   character pair (bigram), so multi-character words still match
//! - Latin/digit runs emit the whole run, lowercased
//!
//! ```text
//! "火焰Attack250" → ["火", "火焰", "焰", "attack250"]
//! ```

/// True for characters tokenized per-character (Han ideographs, kana, Hangul)
fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'    // CJK Unified Ideographs
        | '\u{3400}'..='\u{4DBF}'  // CJK Extension A
        | '\u{F900}'..='\u{FAFF}'  // CJK Compatibility Ideographs
        | '\u{3040}'..='\u{309F}'  // Hiragana
        | '\u{30A0}'..='\u{30FF}'  // Katakana
        | '\u{AC00}'..='\u{D7AF}'  // Hangul Syllables
    )
}

/// True for characters that join into a single Latin/digit token
fn is_word(c: char) -> bool {
    c.is_alphanumeric() && !is_cjk(c)
}

/// Split text into unigram/bigram CJK tokens and lowercased word tokens
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut cjk_run: Vec<char> = Vec::new();

    let flush_word = |word: &mut String, tokens: &mut Vec<String>| {
        if !word.is_empty() {
            tokens.push(word.to_lowercase());
            word.clear();
        }
    };
    let flush_cjk = |run: &mut Vec<char>, tokens: &mut Vec<String>| {
        for (i, c) in run.iter().enumerate() {
            tokens.push(c.to_string());
            if let Some(next) = run.get(i + 1) {
                let mut bigram = String::with_capacity(8);
                bigram.push(*c);
                bigram.push(*next);
                tokens.push(bigram);
            }
        }
        run.clear();
    };

    for c in text.chars() {
        if is_cjk(c) {
            flush_word(&mut word, &mut tokens);
            cjk_run.push(c);
        } else if is_word(c) {
            flush_cjk(&mut cjk_run, &mut tokens);
            word.push(c);
        } else {
            flush_word(&mut word, &mut tokens);
            flush_cjk(&mut cjk_run, &mut tokens);
        }
    }
    flush_word(&mut word, &mut tokens);
    flush_cjk(&mut cjk_run, &mut tokens);

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin_runs_lowercased() {
        assert_eq!(tokenize("Fireball Attack"), vec!["fireball", "attack"]);
    }

    #[test]
    fn test_digits_join_word_runs() {
        assert_eq!(tokenize("damage250"), vec!["damage250"]);
        assert_eq!(tokenize("250 damage"), vec!["250", "damage"]);
    }

    #[test]
    fn test_cjk_unigrams_and_bigrams() {
        assert_eq!(tokenize("火焰伤害"), vec!["火", "火焰", "焰", "焰伤", "伤", "伤害", "害"]);
    }

    #[test]
    fn test_single_cjk_char_has_no_bigram() {
        assert_eq!(tokenize("火"), vec!["火"]);
    }

    #[test]
    fn test_mixed_script_boundaries() {
        assert_eq!(
            tokenize("火焰Attack"),
            vec!["火", "火焰", "焰", "attack"]
        );
    }

    #[test]
    fn test_punctuation_separates() {
        assert_eq!(tokenize("base_damage: 250!"), vec!["base", "damage", "250"]);
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t\n").is_empty());
    }
}
