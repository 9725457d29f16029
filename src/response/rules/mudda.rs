//! Rules answering questions with the inevitable.

use crate::response::adjective::{AdjectivePhraseFinder, LexiconTagger, Tagger};
use crate::response::rule::{ResponseContext, ResponseRule};
use crate::response::ResponseManager;
use lazy_regex::lazy_regex;
use moka::sync::Cache;
use rand::{Rng, RngCore};

static RE_WEN: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"(?i)(^| )wen(\?| .+)");
static RE_WESSEN: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"(?i)(^| )wessen");
static RE_WEM: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"(?i)(^| )wem");
static RE_WHO_GERMAN: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"(?i)(^| )(irgend)?(wer|jemand)( .+)?\?");
static RE_WHO_ENGLISH: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"(?i)who( .+)?\?");
static RE_WHY: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"(?i)(^| )(warum|wieso|weshalb|weswegen|why)");
static RE_YOUR_MOTHER: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"(?i)^dei(ne)? (mudda|mutter|mama)");

/// Last words of an adjective phrase that never make a good answer
const ADJECTIVE_STOP_WORDS: &[&str] = &[
    "vermutlich",
    "selbe",
    "gute",
    "lieber",
    "eigentlich",
    "jam",
    "neues",
    "leid",
    "gleich",
    "du",
];

fn mudda_or_member(context: &ResponseContext<'_>, rng: &mut dyn RngCore, generic: &str) -> String {
    context
        .maybe_member_name(rng)
        .map_or_else(|| generic.to_string(), |name| format!("{name}'s mudda"))
}

/// Answers `wen` questions
pub struct GenitiveFirstRule;

impl ResponseRule for GenitiveFirstRule {
    fn id(&self) -> &'static str {
        "GenitiveFirstRule"
    }

    fn description(&self) -> &'static str {
        "Respond to 'wen' questions in german"
    }

    fn matches(&self, message: &str) -> bool {
        RE_WEN.is_match(message)
    }

    fn get_response(
        &self,
        context: &ResponseContext<'_>,
        _message: &str,
        rng: &mut dyn RngCore,
    ) -> Option<String> {
        Some(mudda_or_member(context, rng, "deine mudda"))
    }
}

/// Answers `wessen` questions
pub struct GenitiveSecondRule;

impl ResponseRule for GenitiveSecondRule {
    fn id(&self) -> &'static str {
        "GenitiveSecondRule"
    }

    fn description(&self) -> &'static str {
        "Respond to 'wessen' questions in german"
    }

    fn matches(&self, message: &str) -> bool {
        RE_WESSEN.is_match(message)
    }

    fn get_response(
        &self,
        context: &ResponseContext<'_>,
        _message: &str,
        rng: &mut dyn RngCore,
    ) -> Option<String> {
        Some(context.maybe_member_name(rng).map_or_else(
            || "von deiner mudda".to_string(),
            |name| format!("von {name}'s mudda"),
        ))
    }
}

/// Answers `wem` questions
pub struct DativRule;

impl ResponseRule for DativRule {
    fn id(&self) -> &'static str {
        "DativRule"
    }

    fn description(&self) -> &'static str {
        "Respond to 'wem' questions in german"
    }

    fn matches(&self, message: &str) -> bool {
        RE_WEM.is_match(message)
    }

    fn get_response(
        &self,
        context: &ResponseContext<'_>,
        _message: &str,
        rng: &mut dyn RngCore,
    ) -> Option<String> {
        Some(mudda_or_member(context, rng, "deiner mudda"))
    }
}

/// Answers `wer` and `jemand` questions
pub struct WhoGermanRule;

impl ResponseRule for WhoGermanRule {
    fn id(&self) -> &'static str {
        "WhoGermanRule"
    }

    fn description(&self) -> &'static str {
        "Respond to 'who' questions in german"
    }

    fn matches(&self, message: &str) -> bool {
        RE_WHO_GERMAN.is_match(message)
    }

    fn get_response(
        &self,
        context: &ResponseContext<'_>,
        _message: &str,
        rng: &mut dyn RngCore,
    ) -> Option<String> {
        Some(mudda_or_member(context, rng, "deine mudda"))
    }
}

/// Answers `who` questions
pub struct WhoEnglishRule;

impl ResponseRule for WhoEnglishRule {
    fn id(&self) -> &'static str {
        "WhoEnglishRule"
    }

    fn description(&self) -> &'static str {
        "Respond to 'who' questions in english"
    }

    fn matches(&self, message: &str) -> bool {
        RE_WHO_ENGLISH.is_match(message)
    }

    fn get_response(
        &self,
        _context: &ResponseContext<'_>,
        _message: &str,
        _rng: &mut dyn RngCore,
    ) -> Option<String> {
        Some("your momma".to_string())
    }
}

/// Answers `why` questions
pub struct WhyRule;

impl ResponseRule for WhyRule {
    fn id(&self) -> &'static str {
        "WhyRule"
    }

    fn description(&self) -> &'static str {
        "Respond to 'why' questions"
    }

    fn matches(&self, message: &str) -> bool {
        RE_WHY.is_match(message)
    }

    fn get_response(
        &self,
        _context: &ResponseContext<'_>,
        _message: &str,
        _rng: &mut dyn RngCore,
    ) -> Option<String> {
        Some("sex".to_string())
    }
}

/// Turns "deine mudda" back on the sender
pub struct ReflectCounterIntelligenceRule;

impl ResponseRule for ReflectCounterIntelligenceRule {
    fn id(&self) -> &'static str {
        "ReflectCounterIntelligenceRule"
    }

    fn description(&self) -> &'static str {
        "Respond to messages containing phrases similar to 'your mother'"
    }

    fn matches(&self, message: &str) -> bool {
        RE_YOUR_MOTHER.is_match(message)
    }

    fn get_response(
        &self,
        _context: &ResponseContext<'_>,
        message: &str,
        _rng: &mut dyn RngCore,
    ) -> Option<String> {
        RE_YOUR_MOTHER
            .find(message)
            .map(|hit| format!("nee, {}", hit.as_str()))
    }
}

fn is_usable_phrase(phrase: &[String]) -> bool {
    phrase
        .last()
        .is_some_and(|word| !ADJECTIVE_STOP_WORDS.contains(&word.to_lowercase().as_str()))
}

const MATCHED_PHRASES_CAPACITY: u64 = 1_000;

/// Claims that the mother of someone has the property just mentioned
pub struct AdjectiveCounterIntelligenceRule {
    finder: AdjectivePhraseFinder,
    /// Phrases found in raw messages, keyed by the normalized message
    matched: Cache<String, Vec<String>>,
}

impl AdjectiveCounterIntelligenceRule {
    /// Creates the rule using the built-in lexicon tagger
    #[must_use]
    pub fn new() -> Self {
        Self::with_tagger(Box::new(LexiconTagger::default()))
    }

    /// Creates the rule using a custom tagger
    #[must_use]
    pub fn with_tagger(tagger: Box<dyn Tagger>) -> Self {
        Self {
            finder: AdjectivePhraseFinder::new(tagger),
            matched: Cache::new(MATCHED_PHRASES_CAPACITY),
        }
    }

    /// The first adjective phrase of `message`, word by word
    #[must_use]
    pub fn find_adjective_phrase(&self, message: &str) -> Vec<String> {
        self.finder.find(message)
    }
}

impl Default for AdjectiveCounterIntelligenceRule {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseRule for AdjectiveCounterIntelligenceRule {
    fn id(&self) -> &'static str {
        "AdjectiveCounterIntelligenceRule"
    }

    fn description(&self) -> &'static str {
        "Adjective counter intelligence"
    }

    fn matches(&self, message: &str) -> bool {
        let phrase = self.finder.find(message);
        if !is_usable_phrase(&phrase) {
            return false;
        }
        self.matched
            .insert(ResponseManager::normalize(message), phrase);
        true
    }

    fn get_response(
        &self,
        context: &ResponseContext<'_>,
        message: &str,
        rng: &mut dyn RngCore,
    ) -> Option<String> {
        // lowercasing turns nouns into adjectives, prefer the raw text's phrase
        let phrase = self
            .matched
            .get(message)
            .unwrap_or_else(|| self.finder.find(message));
        if !is_usable_phrase(&phrase) {
            return None;
        }
        let phrase = phrase.join(" ");

        let response = match rng.random_range(0..3) {
            0 => match context.random_member_name(rng) {
                Some(name) => format!("{name}'s mudda is' {phrase}"),
                None => format!("deine mudda is' {phrase}"),
            },
            1 => "wie deine mudda beim kacken".to_string(),
            _ => format!("deine mudda is' {phrase}"),
        };
        Some(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{Chat, User};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_reflect_echoes_matched_phrase() {
        let chat = Chat::new(1, "group");
        let context = ResponseContext::new(&chat, "someone");
        let mut rng = StdRng::seed_from_u64(7);
        let rule = ReflectCounterIntelligenceRule;

        assert!(rule.matches("Deine Mutter ist nett"));
        assert_eq!(
            rule.get_response(&context, "deine mutter ist nett", &mut rng),
            Some("nee, deine mutter".to_string())
        );
    }

    #[test]
    fn test_personalized_responses_use_member_names() {
        let mut chat = Chat::new(1, "group");
        chat.upsert_member(User::new(1, "markus"));
        let context = ResponseContext::new(&chat, "someone");
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..100 {
            let response = GenitiveSecondRule
                .get_response(&context, "wessen", &mut rng)
                .expect("always responds");
            assert!(
                response == "von deiner mudda" || response == "von markus's mudda",
                "unexpected response: {response}"
            );
        }
    }

    #[test]
    fn test_generic_response_without_members() {
        let chat = Chat::new(1, "group");
        let context = ResponseContext::new(&chat, "someone");
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..50 {
            assert_eq!(
                DativRule.get_response(&context, "wem", &mut rng),
                Some("deiner mudda".to_string())
            );
        }
    }

    #[test]
    fn test_adjective_response_uses_phrase_of_raw_message() {
        let rule = AdjectiveCounterIntelligenceRule::new();
        let chat = Chat::new(1, "group");
        let context = ResponseContext::new(&chat, "someone");
        let raw = "Das Leid ist groß";
        let normalized = ResponseManager::normalize(raw);

        assert!(rule.matches(raw));
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let response = rule
                .get_response(&context, &normalized, &mut rng)
                .expect("phrase was matched");
            assert!(!response.contains("leid"), "unexpected response: {response}");
        }
    }

    #[test]
    fn test_adjective_response_respects_stop_words() {
        let rule = AdjectiveCounterIntelligenceRule::new();
        let chat = Chat::new(1, "group");
        let context = ResponseContext::new(&chat, "someone");
        let mut rng = StdRng::seed_from_u64(3);

        // never matched, so the lowercased text is all there is
        assert_eq!(
            rule.get_response(&context, "das leid ist groß", &mut rng),
            None
        );
    }
}
