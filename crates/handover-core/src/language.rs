//! Language detection for incoming customer messages.
//!
//! Three-way classification: Devanagari-script Nepali, romanized Nepali
//! (Nepali words in Latin script), or English as the default. Detection
//! runs on every customer message and tags the conversation so replies
//! and fallbacks come back in the customer's language.

use handover_types::conversation::Language;

/// Common romanized Nepali words checked as substrings, lowercase.
const ROMANIZED_NEPALI_WORDS: &[&str] = &[
    "namaste",
    "dhanyabad",
    "kasto",
    "cha",
    "chha",
    "huncha",
    "garna",
    "paisa",
    "rupiya",
    "masu",
    "khana",
    "ramro",
    "mitho",
    "sasto",
    "mahango",
    "kati",
    "kaha",
    "kasari",
];

/// Detect the language of a message.
///
/// Any Devanagari codepoint (U+0900..U+097F) wins outright. Otherwise a
/// romanized Nepali vocabulary match classifies the text as romanized
/// Nepali, and everything else defaults to English.
pub fn detect(text: &str) -> Language {
    if text.chars().any(|c| ('\u{0900}'..='\u{097F}').contains(&c)) {
        return Language::NepaliDevanagari;
    }

    let lower = text.to_lowercase();
    if ROMANIZED_NEPALI_WORDS.iter().any(|w| lower.contains(w)) {
        return Language::NepaliRomanized;
    }

    Language::English
}

/// Build the system prompt sent with provider calls for a language.
///
/// The base persona is shared; a language-specific instruction block is
/// appended so the provider answers in the customer's language.
pub fn system_prompt(language: Language) -> String {
    let base = "You are the support assistant for an online shop. Answer questions \
about products, prices, delivery, and orders. Be helpful, friendly, and concise. \
If you do not know current prices or availability, suggest checking the website \
or calling the shop.";

    let instructions = match language {
        Language::NepaliDevanagari => {
            "\n\nRespond in Nepali using Devanagari script. Be polite and use \
\u{0924}\u{092a}\u{093e}\u{0908}\u{0902} for formal address."
        }
        Language::NepaliRomanized => {
            "\n\nRespond in Romanized Nepali (Nepali written in English letters). \
Use 'tapai' for formal address, and mix in English words for technical terms \
where natural."
        }
        Language::English => "\n\nRespond in clear, friendly English.",
    };

    format!("{base}{instructions}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_devanagari_detected() {
        assert_eq!(
            detect("\u{0928}\u{092e}\u{0938}\u{094d}\u{0924}\u{0947}"),
            Language::NepaliDevanagari
        );
    }

    #[test]
    fn test_devanagari_wins_over_romanized_words() {
        // Mixed script with a romanized keyword still classifies as Devanagari.
        assert_eq!(
            detect("namaste \u{0915}\u{0924}\u{093f}"),
            Language::NepaliDevanagari
        );
    }

    #[test]
    fn test_romanized_nepali_detected() {
        assert_eq!(detect("kati paisa ho?"), Language::NepaliRomanized);
        assert_eq!(detect("Namaste! delivery huncha?"), Language::NepaliRomanized);
    }

    #[test]
    fn test_english_default() {
        assert_eq!(detect("what is the price of chicken"), Language::English);
        assert_eq!(detect(""), Language::English);
    }

    #[test]
    fn test_system_prompt_varies_by_language() {
        let en = system_prompt(Language::English);
        let dev = system_prompt(Language::NepaliDevanagari);
        let rom = system_prompt(Language::NepaliRomanized);
        assert_ne!(en, dev);
        assert_ne!(en, rom);
        assert!(en.contains("English"));
        assert!(rom.contains("Romanized"));
    }
}
