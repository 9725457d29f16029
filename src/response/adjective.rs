//! Adjective phrase extraction for German chat messages.
//!
//! Tokens are tagged by a [`Tagger`], then the first phrase matching
//! `modifier* adjective (link* modifier* adjective)*` is picked. The shipped
//! [`LexiconTagger`] knows a fixed word list plus common adjective suffixes.

use moka::sync::Cache;
use std::collections::HashSet;

const PHRASE_CACHE_CAPACITY: u64 = 1_000;

/// Part of speech, as far as phrase extraction cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Adjective, attributive or predicative
    Adjective,
    /// Adverb or particle modifying an adjective (`sehr`, `doch`)
    Modifier,
    /// Conjunction between adjectives (`,`, `und`, `oder`)
    Link,
    /// Anything else
    Other,
}

/// A word together with its tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedToken {
    /// The word as written
    pub word: String,
    /// Its tag
    pub tag: Tag,
}

/// Assigns a [`Tag`] to every token of a text
#[cfg_attr(test, mockall::automock)]
pub trait Tagger: Send + Sync {
    /// Tokenizes and tags `text`
    fn tag(&self, text: &str) -> Vec<TaggedToken>;
}

const ADJECTIVES: &[&str] = &[
    "alt", "arm", "bitter", "blau", "blöd", "böse", "braun", "breit", "bunt", "cool", "dick",
    "doof", "dumm", "dunkel", "dünn", "eng", "falsch", "faul", "fein", "fett", "fies", "frech",
    "frei", "fremd", "froh", "früh", "gar", "gelb", "geil", "gemein", "gleich", "grau", "groß",
    "grün", "gut", "hart", "heiß", "hell", "hohl", "hübsch", "jung", "kalt", "klein", "klug",
    "krank", "krass", "kurz", "lahm", "lang", "laut", "leer", "leicht", "leid", "leise", "lieb",
    "link", "mies", "müde", "nah", "nass", "nett", "neu", "offen", "platt", "rau", "recht",
    "reich", "reif", "rein", "rot", "sauer", "sauber", "scharf", "schlank", "schlau", "schlecht",
    "schmal", "schnell", "schön", "schwach", "schwarz", "schwer", "selbe", "spät", "stark",
    "steil", "still", "stolz", "stumpf", "super", "süß", "teuer", "tief", "toll", "tot", "treu",
    "trocken", "warm", "weich", "weiß", "weit", "wild", "zart",
];

const MODIFIERS: &[&str] = &[
    "besonders", "doch", "echt", "eher", "etwas", "extrem", "ganz", "ja", "mega", "nicht",
    "noch", "recht", "schon", "sehr", "so", "total", "wirklich", "ziemlich", "zu",
];

const LINKS: &[&str] = &[",", "und", "oder"];

const ADJECTIVE_SUFFIXES: &[&str] = &["lich", "isch", "haft", "bar", "sam", "los", "ig"];

const MIN_SUFFIX_STEM_CHARS: usize = 3;

// Words ending in an adjective suffix that are no adjectives
const SUFFIX_EXCEPTIONS: &[&str] = &[
    "balsam", "essig", "honig", "käfig", "könig", "nachbar", "pfennig", "schweig", "steig",
    "zeig", "zweig",
];

const INFLECTIONS: &[&str] = &["en", "er", "es", "em", "e"];

const SENTENCE_END: &[char] = &['.', '!', '?'];

/// Tagger backed by a small German word list and suffix heuristics
pub struct LexiconTagger {
    adjectives: HashSet<&'static str>,
    modifiers: HashSet<&'static str>,
}

impl Default for LexiconTagger {
    fn default() -> Self {
        Self {
            adjectives: ADJECTIVES.iter().copied().collect(),
            modifiers: MODIFIERS.iter().copied().collect(),
        }
    }
}

impl LexiconTagger {
    fn is_adjective(&self, word: &str) -> bool {
        if self.adjectives.contains(word) || has_adjective_suffix(word) {
            return true;
        }
        INFLECTIONS.iter().any(|ending| {
            word.strip_suffix(ending).is_some_and(|stem| {
                stem.chars().count() >= 2
                    && (self.adjectives.contains(stem) || has_adjective_suffix(stem))
            })
        })
    }

    /// Lexicon lookup only, allowing an inflection ending
    fn is_known_adjective(&self, word: &str) -> bool {
        self.adjectives.contains(word)
            || INFLECTIONS.iter().any(|ending| {
                word.strip_suffix(ending)
                    .is_some_and(|stem| self.adjectives.contains(stem))
            })
    }

    fn tag_word(&self, word: &str, sentence_start: bool) -> Tag {
        let lower = word.to_lowercase();
        if LINKS.contains(&lower.as_str()) {
            return Tag::Link;
        }
        let capitalized = word.chars().next().is_some_and(char::is_uppercase);
        // capitalized words inside a sentence are nouns
        if capitalized && !sentence_start {
            return Tag::Other;
        }
        if self.modifiers.contains(lower.as_str()) {
            Tag::Modifier
        } else if capitalized {
            // a sentence may start with a noun, so suffixes prove nothing
            if self.is_known_adjective(&lower) {
                Tag::Adjective
            } else {
                Tag::Other
            }
        } else if self.is_adjective(&lower) {
            Tag::Adjective
        } else {
            Tag::Other
        }
    }
}

fn has_adjective_suffix(word: &str) -> bool {
    if SUFFIX_EXCEPTIONS.contains(&word) {
        return false;
    }
    ADJECTIVE_SUFFIXES.iter().any(|suffix| {
        word.strip_suffix(suffix)
            .is_some_and(|stem| stem.chars().count() >= MIN_SUFFIX_STEM_CHARS)
    })
}

impl Tagger for LexiconTagger {
    fn tag(&self, text: &str) -> Vec<TaggedToken> {
        let mut sentence_start = true;
        tokenize(text)
            .into_iter()
            .map(|word| {
                let tag = self.tag_word(&word, sentence_start);
                sentence_start = word.chars().all(|c| SENTENCE_END.contains(&c));
                TaggedToken { word, tag }
            })
            .collect()
    }
}

/// Splits `text` into words and punctuation tokens
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for chunk in text.split_whitespace() {
        let mut word = String::new();
        for c in chunk.chars() {
            if c.is_alphanumeric() || c == '\'' || c == '-' {
                word.push(c);
            } else {
                if !word.is_empty() {
                    tokens.push(std::mem::take(&mut word));
                }
                tokens.push(c.to_string());
            }
        }
        if !word.is_empty() {
            tokens.push(word);
        }
    }
    tokens
}

/// Returns the first adjective phrase of a tagged token list
#[must_use]
pub fn first_adjective_phrase(tokens: &[TaggedToken]) -> Vec<String> {
    let is = |index: usize, tag: Tag| tokens.get(index).is_some_and(|t| t.tag == tag);
    let skip = |mut index: usize, tag: Tag| {
        while is(index, tag) {
            index += 1;
        }
        index
    };

    for start in 0..tokens.len() {
        let first = skip(start, Tag::Modifier);
        if !is(first, Tag::Adjective) {
            continue;
        }

        let mut end = first;
        loop {
            let next = skip(skip(end + 1, Tag::Link), Tag::Modifier);
            if is(next, Tag::Adjective) {
                end = next;
            } else {
                break;
            }
        }
        return tokens[start..=end].iter().map(|t| t.word.clone()).collect();
    }
    Vec::new()
}

/// Finds adjective phrases, caching results per text
pub struct AdjectivePhraseFinder {
    tagger: Box<dyn Tagger>,
    cache: Cache<String, Vec<String>>,
}

impl AdjectivePhraseFinder {
    /// Creates a finder using `tagger`
    #[must_use]
    pub fn new(tagger: Box<dyn Tagger>) -> Self {
        Self {
            tagger,
            cache: Cache::new(PHRASE_CACHE_CAPACITY),
        }
    }

    /// The first adjective phrase of `text`, or an empty list
    pub fn find(&self, text: &str) -> Vec<String> {
        self.cache
            .get_with(text.to_string(), || first_adjective_phrase(&self.tagger.tag(text)))
    }
}

/// The first adjective phrase of `text` according to the built-in lexicon
#[must_use]
pub fn extract_adjective_phrase(text: &str) -> Vec<String> {
    first_adjective_phrase(&LexiconTagger::default().tag(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(word: &str, tag: Tag) -> TaggedToken {
        TaggedToken {
            word: word.to_string(),
            tag,
        }
    }

    #[test]
    fn test_tokenize_splits_punctuation() {
        assert_eq!(
            tokenize("Ihr seid hässlich, dumm und doof!"),
            vec!["Ihr", "seid", "hässlich", ",", "dumm", "und", "doof", "!"]
        );
    }

    #[test]
    fn test_inflected_adjectives() {
        let tagger = LexiconTagger::default();
        assert!(tagger.is_adjective("gute"));
        assert!(tagger.is_adjective("neues"));
        assert!(tagger.is_adjective("lustigen"));
        assert!(!tagger.is_adjective("arbeiten"));
        assert!(!tagger.is_adjective("ich"));
    }

    #[test]
    fn test_suffix_lookalikes_are_not_adjectives() {
        let tagger = LexiconTagger::default();
        for word in ["zeig", "steig", "honig", "könig", "königen", "nachbar", "nachbarn"] {
            assert!(!tagger.is_adjective(word), "{word}");
        }
        assert!(tagger.is_adjective("mutig"));
        assert!(tagger.is_adjective("sonderbar"));
    }

    #[test]
    fn test_sentence_start_needs_known_adjective() {
        let tagger = LexiconTagger::default();
        assert_eq!(tagger.tag("König der Löwen")[0].tag, Tag::Other);
        assert_eq!(tagger.tag("Schöne Grüße")[0].tag, Tag::Adjective);
        assert_eq!(tagger.tag("lustig. Ehrlich")[2].tag, Tag::Other);
    }

    #[test]
    fn test_nouns_inside_sentence() {
        let tagged = LexiconTagger::default().tag("Das Gut ist gut");
        let tags: Vec<Tag> = tagged.iter().map(|t| t.tag).collect();
        assert_eq!(tags, vec![Tag::Other, Tag::Other, Tag::Other, Tag::Adjective]);
    }

    #[test]
    fn test_trailing_link_not_included() {
        let tokens = vec![
            token("gut", Tag::Adjective),
            token("und", Tag::Link),
            token("so", Tag::Modifier),
        ];
        assert_eq!(first_adjective_phrase(&tokens), vec!["gut"]);
    }

    #[test]
    fn test_finder_uses_tagger_once_per_text() {
        let mut tagger = MockTagger::new();
        tagger
            .expect_tag()
            .times(1)
            .returning(|_| vec![token("mega", Tag::Modifier), token("krass", Tag::Adjective)]);
        let finder = AdjectivePhraseFinder::new(Box::new(tagger));

        assert_eq!(finder.find("mega krass"), vec!["mega", "krass"]);
        assert_eq!(finder.find("mega krass"), vec!["mega", "krass"]);
    }
}
