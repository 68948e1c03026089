//! Transcript text post-processing.
//!
//! Cleanup applied to every recognized piece before it reaches the live
//! transcript: filler removal, terminal punctuation, and sentence splitting
//! for providers that return plain text with no segment breakdown.

/// Spoken fillers stripped from recognized Japanese text.
const FILLERS: &[&str] = &["えー", "あー", "そのー", "えっと", "あのー"];

/// Characters that terminate a sentence (Japanese and Latin).
const TERMINALS: &[char] = &['。', '．', '！', '？', '!', '?', '.'];

/// Removes spoken fillers and collapses the whitespace they leave behind.
pub fn remove_fillers(text: &str) -> String {
    let mut out = text.to_string();
    for filler in FILLERS {
        out = out.replace(filler, "");
    }
    while out.contains("  ") {
        out = out.replace("  ", " ");
    }
    out.trim().to_string()
}

/// Ensures the text ends with sentence punctuation, appending 。 when missing.
pub fn basic_punctuate(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    match trimmed.chars().last() {
        Some(c) if TERMINALS.contains(&c) => trimmed.to_string(),
        _ => format!("{}。", trimmed),
    }
}

/// Splits text into sentences at Japanese/English sentence endings.
pub fn split_sentences(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut sentences = Vec::new();
    let mut current = String::new();
    for c in normalized.chars() {
        if c == '\n' {
            push_sentence(&mut sentences, &mut current);
            continue;
        }
        current.push(c);
        if TERMINALS.contains(&c) {
            push_sentence(&mut sentences, &mut current);
        }
    }
    push_sentence(&mut sentences, &mut current);
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_fillers_strips_tokens() {
        assert_eq!(remove_fillers("えーと思います"), "と思います");
        assert_eq!(remove_fillers("あのー それは そのー 違います"), "それは 違います");
    }

    #[test]
    fn test_remove_fillers_keeps_clean_text() {
        assert_eq!(remove_fillers("こんにちは"), "こんにちは");
    }

    #[test]
    fn test_basic_punctuate_appends_terminal() {
        assert_eq!(basic_punctuate("こんにちは"), "こんにちは。");
        assert_eq!(basic_punctuate("hello"), "hello。");
    }

    #[test]
    fn test_basic_punctuate_keeps_existing_terminal() {
        assert_eq!(basic_punctuate("こんにちは。"), "こんにちは。");
        assert_eq!(basic_punctuate("Done."), "Done.");
        assert_eq!(basic_punctuate("really?"), "really?");
    }

    #[test]
    fn test_basic_punctuate_empty() {
        assert_eq!(basic_punctuate("   "), "");
    }

    #[test]
    fn test_split_sentences_japanese_and_english() {
        let sentences = split_sentences("おはようございます。会議を始めます。OK.");
        assert_eq!(
            sentences,
            vec!["おはようございます。", "会議を始めます。", "OK."]
        );
    }

    #[test]
    fn test_split_sentences_newlines() {
        let sentences = split_sentences("一行目\r\n二行目\n");
        assert_eq!(sentences, vec!["一行目", "二行目"]);
    }

    #[test]
    fn test_split_sentences_trailing_fragment() {
        let sentences = split_sentences("終わりました。続きはまだ");
        assert_eq!(sentences, vec!["終わりました。", "続きはまだ"]);
    }

    #[test]
    fn test_split_sentences_empty() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("  \n ").is_empty());
    }
}
