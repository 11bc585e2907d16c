//! Text cleaning applied between extraction and splitting.

use once_cell::sync::Lazy;
use regex::Regex;

use docforge_core::model::{PreProcessingRuleId, ProcessMode, ProcessRule};

// C0 controls minus \t \n \r, DEL, C1 controls, and the U+FFFE noncharacter.
static CONTROL_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F\u{80}-\u{9F}\u{FFFE}]").unwrap()
});

static EXTRA_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static EXTRA_SPACES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\t\f\r\x20\u{A0}\u{1680}\u{2000}-\u{200A}\u{202F}\u{205F}\u{3000}]{2,}").unwrap()
});
// One leading whitespace char is consumed with the match, so removal never
// leaves a double gap for a later cleaning pass to collapse differently.
static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s?[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+").unwrap());
static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s?(?:https?://\S+|www\.\S+)").unwrap());

/// Normalizes extracted text before splitting.
pub struct CleanProcessor;

impl CleanProcessor {
    /// Clean `text` according to the process rule.
    ///
    /// Control characters, the `U+FFFE` noncharacter, and internal `<|...|>`
    /// template markers are always stripped. Custom and hierarchical rules
    /// additionally apply their enabled pre-processing rules in list order.
    /// Idempotent: cleaning cleaned text is a no-op.
    pub fn clean(text: &str, rule: &ProcessRule) -> String {
        let mut text = Self::filter_string(text);

        if rule.mode != ProcessMode::Automatic {
            for pre_rule in &rule.rules.pre_processing_rules {
                if !pre_rule.enabled {
                    continue;
                }
                text = match pre_rule.id {
                    PreProcessingRuleId::RemoveExtraSpaces => {
                        let text = EXTRA_NEWLINES.replace_all(&text, "\n\n");
                        EXTRA_SPACES.replace_all(&text, " ").into_owned()
                    }
                    PreProcessingRuleId::RemoveUrlsEmails => {
                        let text = EMAIL.replace_all(&text, "");
                        URL.replace_all(&text, "").into_owned()
                    }
                };
            }
        }

        text
    }

    /// Strip control characters and rewrite `<|`/`|>` template markers.
    pub fn filter_string(text: &str) -> String {
        let mut text = CONTROL_CHARS.replace_all(text, "").into_owned();
        // Single-pass substitution can leave a fresh `<|` behind ("<||"), so
        // rewrite markers to a fixed point.
        loop {
            let rewritten = text.replace("<|", "<").replace("|>", ">");
            if rewritten == text {
                break;
            }
            text = rewritten;
        }
        text
    }
}
