/// Easter egg rules
pub mod eastereggs;
/// The classic rules
pub mod mudda;

use super::rule::ResponseRule;

pub use eastereggs::{GhostbustersRule, RicolaRule, SpongebobRule};
pub use mudda::{
    AdjectiveCounterIntelligenceRule, DativRule, GenitiveFirstRule, GenitiveSecondRule,
    ReflectCounterIntelligenceRule, WhoEnglishRule, WhoGermanRule, WhyRule,
};

/// Every rule the bot knows, in declaration order.
///
/// Declaration order breaks ties between rules of equal priority.
#[must_use]
pub fn default_rules() -> Vec<Box<dyn ResponseRule>> {
    vec![
        Box::new(SpongebobRule),
        Box::new(RicolaRule),
        Box::new(GhostbustersRule),
        Box::new(GenitiveFirstRule),
        Box::new(GenitiveSecondRule),
        Box::new(DativRule),
        Box::new(WhoGermanRule),
        Box::new(WhoEnglishRule),
        Box::new(WhyRule),
        Box::new(ReflectCounterIntelligenceRule),
        Box::new(AdjectiveCounterIntelligenceRule::new()),
    ]
}
