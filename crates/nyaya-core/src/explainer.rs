//! # External Collaborators
//!
//! The explanation provider and the translation service sit outside the
//! core. Both are traits: the core hands them text and treats whatever
//! comes back as untrusted.

use crate::context::Audience;
use crate::error::{ExplainerError, TranslationError};
use crate::primitives::Score;
use serde::{Deserialize, Serialize};
use tracing::warn;

// =============================================================================
// EXPLAINER
// =============================================================================

/// What the explainer receives.
#[derive(Debug, Clone, Copy)]
pub struct ExplanationRequest<'a> {
    pub instructions: &'a str,
    pub context_text: &'a str,
    pub audience: Audience,
    pub query: &'a str,
}

/// Free text produced by the explainer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    pub text: String,
    /// Provider's own uncertainty, if it reports one.
    #[serde(default)]
    pub uncertainty: Option<Score>,
}

impl Explanation {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            uncertainty: None,
        }
    }

    #[must_use]
    pub fn with_uncertainty(mut self, uncertainty: Score) -> Self {
        self.uncertainty = Some(uncertainty);
        self
    }
}

/// A natural-language explanation provider.
///
/// Calls are synchronous; callers that need a deadline wrap the call and
/// report `ExplainerError::Timeout`.
pub trait Explainer: Send + Sync {
    fn explain(&self, request: &ExplanationRequest<'_>) -> Result<Explanation, ExplainerError>;

    /// Provider name for logs.
    fn name(&self) -> &str {
        "explainer"
    }
}

/// Returns a fixed explanation regardless of the request.
#[derive(Debug, Clone)]
pub struct StaticExplainer {
    explanation: Explanation,
}

impl StaticExplainer {
    #[must_use]
    pub fn new(explanation: Explanation) -> Self {
        Self { explanation }
    }
}

impl Explainer for StaticExplainer {
    fn explain(&self, _request: &ExplanationRequest<'_>) -> Result<Explanation, ExplainerError> {
        Ok(self.explanation.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Always unavailable. Every answer takes the citation-only fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineExplainer;

impl Explainer for OfflineExplainer {
    fn explain(&self, _request: &ExplanationRequest<'_>) -> Result<Explanation, ExplainerError> {
        Err(ExplainerError::Unavailable)
    }

    fn name(&self) -> &str {
        "offline"
    }
}

// =============================================================================
// TRANSLATION
// =============================================================================

/// Translated text with the service's confidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub text: String,
    pub confidence: Score,
}

/// Optional pre/post translation service.
pub trait Translator: Send + Sync {
    fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Translation, TranslationError>;
}

/// Identity translation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Translator for Passthrough {
    fn translate(
        &self,
        text: &str,
        _source_lang: &str,
        _target_lang: &str,
    ) -> Result<Translation, TranslationError> {
        Ok(Translation {
            text: text.to_string(),
            confidence: Score::MAX,
        })
    }
}

/// Translate, or fall back to the original text if the service fails.
pub fn translate_or_passthrough(
    translator: &dyn Translator,
    text: &str,
    source_lang: &str,
    target_lang: &str,
) -> Translation {
    if source_lang.eq_ignore_ascii_case(target_lang) {
        return Translation {
            text: text.to_string(),
            confidence: Score::MAX,
        };
    }
    match translator.translate(text, source_lang, target_lang) {
        Ok(translation) => translation,
        Err(error) => {
            warn!(%error, source_lang, target_lang, "translation failed, passing text through");
            Translation {
                text: text.to_string(),
                confidence: Score::ZERO,
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
