//! User-facing wording for moderation outcomes.

use std::collections::HashMap;

use domains::REASON_MODERATION_UNAVAILABLE;
use once_cell::sync::Lazy;

pub const PUBLISHED_MESSAGE: &str = "Your post has been published.";
pub const REJECTED_MESSAGE: &str = "Your post could not be published.";
pub const GENERIC_REASON_MESSAGE: &str = "Please reconsider your content.";

/// Machine code → friendly paraphrase.
static REASON_MESSAGES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (
            "insufficient_positivity",
            "Sanctuary encourages posts with a more positive outlook.",
        ),
        (
            "excessive_negativity",
            "Please try expressing this in a more constructive way.",
        ),
        (
            "negative_words_detected",
            "Your post contains expressions that are not appropriate here.",
        ),
        (
            "analysis_failed",
            "We could not understand your post. Please rephrase it and try again.",
        ),
        ("empty_content", "Your post appears to be empty."),
        (
            REASON_MODERATION_UNAVAILABLE,
            "A temporary problem occurred. Please try again in a little while.",
        ),
    ])
});

/// Reasons may carry detail after a colon (`negative_words_detected: ugh`);
/// only the code before it selects the message.
pub fn reason_message(reason: &str) -> &'static str {
    let code = reason.split(':').next().unwrap_or(reason).trim();
    REASON_MESSAGES.get(code).copied().unwrap_or(GENERIC_REASON_MESSAGE)
}

/// One message per reason, or the generic one if the judge gave none.
pub fn reason_messages(reasons: &[String]) -> Vec<String> {
    if reasons.is_empty() {
        return vec![GENERIC_REASON_MESSAGE.to_string()];
    }
    reasons.iter().map(|reason| reason_message(reason).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_after_code_is_ignored() {
        assert_eq!(
            reason_message("negative_words_detected: awful, terrible"),
            "Your post contains expressions that are not appropriate here."
        );
    }

    #[test]
    fn unknown_codes_fall_back() {
        assert_eq!(reason_message("something_new"), GENERIC_REASON_MESSAGE);
        assert_eq!(reason_messages(&[]), vec![GENERIC_REASON_MESSAGE.to_string()]);
    }

    #[test]
    fn keeps_reason_order() {
        let reasons = vec!["excessive_negativity".to_string(), "insufficient_positivity".to_string()];
        let messages = reason_messages(&reasons);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("constructive"));
        assert!(messages[1].contains("positive outlook"));
    }
}
