//! # Compositor Module
//!
//! Assembles the text of answers the pipeline writes itself: the
//! citation-only fallback, the blocked notice and the unanswerable reply.
//!
//! The compositor never paraphrases. Everything it emits is either fixed
//! text or statute text quoted verbatim from the context with its
//! citation.

use crate::context::{Audience, LlmContext};
use crate::prompt::{
    BLOCKED_NOTICE, FALLBACK_HEADER, INFORMATION_NOT_AVAILABLE, TRUNCATED_NOTICE, disclaimer,
};

/// Writes pipeline-authored answers.
pub struct Compositor;

impl Compositor {
    /// Quote every fact of the context under the fallback header.
    ///
    /// The result passes validation against the same context's citation
    /// map: every citation comes from it and all statute text is quoted.
    #[must_use]
    pub fn fallback(context: &LlmContext) -> String {
        let mut output = String::from(FALLBACK_HEADER);
        for fact in &context.facts {
            output.push('\n');
            output.push_str(&format!(
                "- {}: \"{}\" [Citation: {}]",
                fact.heading, fact.text, fact.citation
            ));
        }
        output
    }

    /// Notice replacing a withheld explanation.
    #[must_use]
    pub fn blocked(audience: Audience) -> String {
        format!("{BLOCKED_NOTICE}\n\n{}", disclaimer(audience))
    }

    /// Point the reader at provisions the context budget left out.
    #[must_use]
    pub fn truncated<S: AsRef<str>>(citations: &[S]) -> String {
        let mut output = String::from(TRUNCATED_NOTICE);
        for citation in citations {
            output.push_str("\n- ");
            output.push_str(citation.as_ref());
        }
        output
    }

    /// The fixed reply for questions the snapshot cannot answer.
    #[must_use]
    pub fn information_not_available() -> String {
        INFORMATION_NOT_AVAILABLE.to_string()
    }
}

// =============================================================================
// TESTS
// =============================================================================
