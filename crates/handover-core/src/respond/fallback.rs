//! Intent-matched fallback replies.
//!
//! When the provider is unavailable (breaker open or retries exhausted)
//! the responder still has to answer something useful. Keyword matching
//! picks an intent and a canned reply localized to the detected language.

use handover_types::conversation::Language;

/// Keyword sets per intent, checked as lowercase substrings in order.
/// First match wins.
const PRICE_WORDS: &[&str] = &["price", "cost", "rate", "paisa", "rupiya", "kati"];
const DELIVERY_WORDS: &[&str] = &["delivery", "deliver", "order", "pathau"];
const PRODUCT_WORDS: &[&str] = &["chicken", "mutton", "fish", "meat", "masu", "kukhura", "khasi"];
const GREETING_WORDS: &[&str] = &["hello", "hi", "namaste", "hey"];

/// A synthesized fallback reply with its matched intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackReply {
    pub content: String,
    /// Intent label, e.g. "price_inquiry" or "generic".
    pub intent: &'static str,
}

/// Classify a customer message into an intent label.
///
/// Used for every reply regardless of where it comes from, not just the
/// fallback path.
pub fn classify_intent(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    let contains_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if contains_any(PRICE_WORDS) {
        "price_inquiry"
    } else if contains_any(DELIVERY_WORDS) {
        "delivery_inquiry"
    } else if contains_any(PRODUCT_WORDS) {
        "product_inquiry"
    } else if contains_any(GREETING_WORDS) {
        "greeting"
    } else {
        "generic"
    }
}

/// Synthesize a fallback reply for a message in the detected language.
pub fn reply_for(message: &str, language: Language) -> FallbackReply {
    let intent = classify_intent(message);
    let content = match intent {
        "price_inquiry" => price_text(language),
        "delivery_inquiry" => delivery_text(language),
        "product_inquiry" => product_text(language),
        "greeting" => greeting_text(language),
        _ => generic_text(language),
    };
    FallbackReply {
        content: content.to_string(),
        intent,
    }
}

fn price_text(language: Language) -> &'static str {
    match language {
        Language::NepaliDevanagari => {
            "नमस्ते! मूल्यहरूको बारेमा जानकारीको लागि कृपया हाम्रो वेबसाइट हेर्नुहोस् वा फोन गर्नुहोस्।"
        }
        Language::NepaliRomanized => {
            "Namaste! Mulyaharu ko bare ma jankari ko lagi kripaya hamro website hernuhos wa phone garnuhos."
        }
        Language::English => {
            "Hello! For current pricing information, please check our website or give us a call."
        }
    }
}

fn delivery_text(language: Language) -> &'static str {
    match language {
        Language::NepaliDevanagari => {
            "हामी काठमाडौं उपत्यकामा २-४ घण्टामा डिलिभरी गर्छौं। अर्डरको लागि वेबसाइट प्रयोग गर्नुहोस्।"
        }
        Language::NepaliRomanized => {
            "Hami Kathmandu upatyaka ma 2-4 ghanta ma delivery garchhaun. Order ko lagi website prayog garnuhos."
        }
        Language::English => {
            "We deliver within the Kathmandu valley in 2-4 hours. You can place orders through our website."
        }
    }
}

fn product_text(language: Language) -> &'static str {
    match language {
        Language::NepaliDevanagari => {
            "हामीसँग ताजा कुखुरा, खसी, माछा र अन्य मासुहरू छन्। उपलब्धताको लागि वेबसाइट हेर्नुहोस्।"
        }
        Language::NepaliRomanized => {
            "Hami sanga taja kukhura, khasi, machha ra anya masuharu chhan. Upalabdhata ko lagi website hernuhos."
        }
        Language::English => {
            "We have fresh chicken, mutton, fish, and other premium meats available. Check our website for current availability."
        }
    }
}

fn greeting_text(language: Language) -> &'static str {
    match language {
        Language::NepaliDevanagari => {
            "नमस्ते! म तपाईंको AI सहायक हुँ। म तपाईंलाई कसरी मद्दत गर्न सक्छु?"
        }
        Language::NepaliRomanized => {
            "Namaste! Ma tapai ko AI sahayak hun. Ma tapai lai kasari maddat garna sakchhu?"
        }
        Language::English => "Hello! I'm your support assistant. How can I help you today?",
    }
}

fn generic_text(language: Language) -> &'static str {
    match language {
        Language::NepaliDevanagari => {
            "अहिले सेवामा समस्या छ, तर म तपाईंलाई मद्दत गर्न चाहन्छु। कृपया वेबसाइट हेर्नुहोस् वा फोन गर्नुहोस्।"
        }
        Language::NepaliRomanized => {
            "Ahile seva ma samasya chha, tara ma tapai lai maddat garna chhanchu. Kripaya website hernuhos wa phone garnuhos."
        }
        Language::English => {
            "I'm experiencing some technical difficulties right now, but I'm here to help! Please check our website or give us a call for immediate assistance."
        }
    }
}
