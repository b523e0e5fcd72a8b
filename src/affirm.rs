/// Replies that count as permission to run a requested command.
const AFFIRMATIVE_WORDS: &[&str] = &[
    // English
    "y", "yes", "ok", "sure", "yeah", "yep", "yup", "go ahead", "do it", "please",
    // Thai
    "ได้", "เอาเลย", "จัดไป", "ใช่", "ตกลง", "แน่นอน", "เชิญเลย", "ทำเลย", "ได้เลย",
];

/// Exact, case-insensitive match of the trimmed answer against the known
/// affirmative words. Everything else, including an empty answer, is a refusal.
pub fn is_affirmative(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    AFFIRMATIVE_WORDS.contains(&normalized.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_case_and_whitespace_variants() {
        assert!(is_affirmative("YES "));
        assert!(is_affirmative("yes"));
        assert!(is_affirmative("Yes"));
        assert!(is_affirmative("  Go Ahead\n"));
        assert!(is_affirmative("ได้เลย"));
    }

    #[test]
    fn rejects_anything_outside_the_set() {
        assert!(!is_affirmative("yesplease"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("   "));
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative("not yes"));
    }
}
