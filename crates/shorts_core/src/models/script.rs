//! Script text helpers: spoken-duration estimation and word extraction.

/// Estimate how long a script takes to narrate, from its word count.
///
/// Used to size the visual clip list before narration audio exists.
pub fn estimate_spoken_seconds(text: &str, words_per_minute: u32) -> f64 {
    let words = text.split_whitespace().count();
    let wpm = words_per_minute.max(1) as f64;
    words as f64 * 60.0 / wpm
}

/// Extract usable words from a topic string.
///
/// Lowercased, longer than 3 characters, order-preserving, deduplicated.
/// Serves as the degraded default for keyword extraction and as extra
/// publish tags.
pub fn topic_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    for raw in text.split_whitespace() {
        let word: String = raw
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        if word.len() > 3 && !words.contains(&word) {
            words.push(word);
        }
    }
    words
}
