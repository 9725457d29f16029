//! Easter eggs. They win over every other rule.

use crate::response::rule::{ResponseContext, ResponseRule};
use lazy_regex::lazy_regex;
use rand::{Rng, RngCore};

const EASTER_EGG_PRIORITY: f64 = 100.0;

static RE_SPONGEBOB: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"(?i)^wer wohnt in ner ananas ganz tief im meer");
static RE_RICOLA: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"(?i)^wer (hat es|hats) erfunden");
static RE_GHOSTBUSTERS: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"(?i)^who y(ou|a) gonna call");

/// Spongebob easter egg
pub struct SpongebobRule;

impl ResponseRule for SpongebobRule {
    fn id(&self) -> &'static str {
        "SpongebobRule"
    }

    fn description(&self) -> &'static str {
        "Spongebob easter egg"
    }

    fn priority(&self) -> f64 {
        EASTER_EGG_PRIORITY
    }

    fn matches(&self, message: &str) -> bool {
        RE_SPONGEBOB.is_match(message)
    }

    fn get_response(
        &self,
        _context: &ResponseContext<'_>,
        _message: &str,
        _rng: &mut dyn RngCore,
    ) -> Option<String> {
        Some("spongebob schwammkopf".to_string())
    }
}

/// Ricola easter egg
pub struct RicolaRule;

impl ResponseRule for RicolaRule {
    fn id(&self) -> &'static str {
        "RicolaRule"
    }

    fn description(&self) -> &'static str {
        "Ricola easter egg"
    }

    fn priority(&self) -> f64 {
        EASTER_EGG_PRIORITY
    }

    fn matches(&self, message: &str) -> bool {
        RE_RICOLA.is_match(message)
    }

    fn get_response(
        &self,
        _context: &ResponseContext<'_>,
        _message: &str,
        rng: &mut dyn RngCore,
    ) -> Option<String> {
        let response = if rng.random_range(0..4) == 3 {
            "benjamin oesterle"
        } else {
            "ricola"
        };
        Some(response.to_string())
    }
}

/// Ghostbusters easter egg
pub struct GhostbustersRule;

impl ResponseRule for GhostbustersRule {
    fn id(&self) -> &'static str {
        "GhostbustersRule"
    }

    fn description(&self) -> &'static str {
        "Ghostbusters easter egg"
    }

    fn priority(&self) -> f64 {
        EASTER_EGG_PRIORITY
    }

    fn matches(&self, message: &str) -> bool {
        RE_GHOSTBUSTERS.is_match(message)
    }

    fn get_response(
        &self,
        _context: &ResponseContext<'_>,
        _message: &str,
        _rng: &mut dyn RngCore,
    ) -> Option<String> {
        Some("ghostbusters".to_string())
    }
}
