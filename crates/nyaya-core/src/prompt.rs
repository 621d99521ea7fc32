//! # Prompt Module
//!
//! Instructions, disclaimers and fixed notices.
//!
//! Everything here is static text keyed by audience and intent, so the same
//! request always produces the same instructions.

use crate::context::Audience;
use crate::query::IntentType;

/// Answer required when the context does not contain the answer.
pub const INFORMATION_NOT_AVAILABLE: &str =
    "Information not available in the current knowledge base.";

/// Replaces the explanation of a blocked response.
pub const BLOCKED_NOTICE: &str = "This response was withheld because it could not be fully \
     grounded in the statute text. The retrieved provisions and their citations remain \
     available for review.";

/// Header of the citation-only fallback.
pub const FALLBACK_HEADER: &str = "The explanation service is unavailable. The following \
     provisions were retrieved from the knowledge base and are quoted verbatim:";

/// Header of the reply when every requested provision was too long for
/// the context limit.
pub const TRUNCATED_NOTICE: &str = "The provisions matching this question are too long to \
     explain within the current context limit. Consult them directly:";

const BASE_RULES: &str = "\
CRITICAL RULES:
1. Use ONLY information from the supplied legal context.
2. Cite every legal claim as [Citation: <citation>] using an entry from AVAILABLE CITATIONS.
3. If the context does not contain the answer, respond exactly: \"Information not available in the current knowledge base.\"
4. Put quoted statute text in double quotes and keep it separate from explanation.
5. Never predict case outcomes or judicial decisions.";

/// Disclaimer shown to an audience.
#[must_use]
pub fn disclaimer(audience: Audience) -> &'static str {
    match audience {
        Audience::Citizen => {
            "This information is for educational purposes only. For legal advice specific \
             to your situation, consult a qualified lawyer."
        }
        Audience::Lawyer => {
            "This information is for research purposes. Verify all citations and consult \
             primary sources for legal practice."
        }
        Audience::Judge => {
            "This analysis is assistive only. Judicial discretion and independent legal \
             analysis remain paramount."
        }
    }
}

fn language_guidance(audience: Audience) -> &'static str {
    match audience {
        Audience::Citizen => {
            "Use simple, accessible language. Avoid jargon and explain technical terms."
        }
        Audience::Lawyer => {
            "Use precise legal terminology. Include cross-references and related provisions."
        }
        Audience::Judge => {
            "Use formal legal language. Present the provisions as an analytical framework \
             without recommending a result."
        }
    }
}

fn intent_focus(intent: IntentType) -> &'static str {
    match intent {
        IntentType::DefinitionLookup => {
            "Give the statutory definition (quoted), then explain it in plain terms."
        }
        IntentType::SectionRetrieval => {
            "Present the section text (quoted), its place in the Act, then related provisions."
        }
        IntentType::RightsQuery => {
            "List the applicable rights, how they are exercised and the remedies available."
        }
        IntentType::ScenarioAnalysis => {
            "Walk through the situation step by step against the applicable provisions \
             and the actions the law provides for."
        }
    }
}

/// Instructions handed to the explainer with the context text.
#[must_use]
pub fn instructions(audience: Audience, intent: IntentType) -> String {
    format!(
        "You are a legal information assistant. You provide information, not legal advice.\n\n\
         {BASE_RULES}\n\n\
         AUDIENCE: {}\n\
         Language: {}\n\n\
         QUERY TYPE: {}\n\
         Focus: {}\n\n\
         DISCLAIMER: {}",
        audience.as_str().to_uppercase(),
        language_guidance(audience),
        intent.as_str().to_uppercase(),
        intent_focus(intent),
        disclaimer(audience),
    )
}

/// Similar queries to offer alongside an answer.
#[must_use]
pub fn suggestions(intent: IntentType) -> Vec<String> {
    let specific: &[&str] = match intent {
        IntentType::DefinitionLookup => &[
            "What does 'unfair trade practice' mean?",
            "What is the meaning of 'defect'?",
            "Define 'misleading advertisement'",
        ],
        IntentType::SectionRetrieval => &[
            "Show me Section 2 of the Consumer Protection Act",
            "Find Section 35 about filing complaints",
        ],
        IntentType::RightsQuery => &[
            "What are my rights as a consumer?",
            "Where can I seek redressal for consumer disputes?",
        ],
        IntentType::ScenarioAnalysis => &[
            "I bought a defective product, what can I do?",
            "I saw a misleading advertisement, how do I complain?",
        ],
    };
    specific
        .iter()
        .chain(["How do I file a consumer complaint?"].iter())
        .map(|s| (*s).to_string())
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
