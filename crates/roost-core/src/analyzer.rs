//! The analysis-engine seam and a built-in lexicon stand-in.
//!
//! Real deployments are expected to plug in a model-backed implementation;
//! [`LexiconAnalyzer`] exists so the pipeline runs end to end without one.

use std::collections::HashSet;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Sentiment ───────────────────────────────────────────────────────────────

/// The label assigned to a comment.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
  Positive,
  Negative,
  Neutral,
}

impl Sentiment {
  /// The discriminant string stored in the `sentiment` column.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::Positive => "positive",
      Self::Negative => "negative",
      Self::Neutral => "neutral",
    }
  }

  pub fn from_discriminant(discriminant: &str) -> Result<Self> {
    match discriminant {
      "positive" => Ok(Self::Positive),
      "negative" => Ok(Self::Negative),
      "neutral" => Ok(Self::Neutral),
      other => Err(Error::UnknownSentiment(other.to_owned())),
    }
  }
}

// ─── Analyzer ────────────────────────────────────────────────────────────────

/// Everything an analyzer says about one piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
  pub sentiment:       Sentiment,
  /// Confidence in the label, in `[0, 1]`.
  pub sentiment_score: f64,
  /// Estimated toxicity, in `[0, 1]`.
  pub toxicity_score:  f64,
  /// ISO 639-1 language code.
  pub language:        String,
  pub keywords:        Vec<String>,
}

/// A pluggable text scorer. Boxed futures keep the trait object-safe so the
/// job pipeline can hold an `Arc<dyn Analyzer>`.
pub trait Analyzer: Send + Sync {
  fn analyze<'a>(
    &'a self,
    text: &'a str,
  ) -> BoxFuture<'a, Result<AnalysisOutcome>>;
}

// ─── LexiconAnalyzer ─────────────────────────────────────────────────────────

const POSITIVE_WORDS: &[&str] = &[
  "amazing",
  "awesome",
  "best",
  "excellent",
  "good",
  "great",
  "happy",
  "helpful",
  "love",
  "nice",
  "perfect",
  "thanks",
  "wonderful",
];

const NEGATIVE_WORDS: &[&str] = &[
  "angry",
  "awful",
  "bad",
  "broken",
  "disappointed",
  "hate",
  "horrible",
  "scam",
  "terrible",
  "useless",
  "worst",
];

const TOXIC_WORDS: &[&str] =
  &["garbage", "idiot", "moron", "pathetic", "stupid", "trash"];

/// Keyword extraction skips words shorter than this.
const MIN_KEYWORD_LEN: usize = 5;
const MAX_KEYWORDS: usize = 5;

/// Word-list scorer. Case-insensitive, whole-token matching, English only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconAnalyzer;

impl LexiconAnalyzer {
  fn score(text: &str) -> AnalysisOutcome {
    let tokens: Vec<String> = text
      .split(|c: char| !c.is_alphanumeric())
      .filter(|t| !t.is_empty())
      .map(str::to_lowercase)
      .collect();

    let positive =
      tokens.iter().filter(|t| POSITIVE_WORDS.contains(&t.as_str())).count();
    let negative =
      tokens.iter().filter(|t| NEGATIVE_WORDS.contains(&t.as_str())).count();
    let toxic =
      tokens.iter().filter(|t| TOXIC_WORDS.contains(&t.as_str())).count();

    let (sentiment, sentiment_score) = match positive.cmp(&negative) {
      std::cmp::Ordering::Greater => {
        (Sentiment::Positive, positive as f64 / (positive + negative) as f64)
      }
      std::cmp::Ordering::Less => {
        (Sentiment::Negative, negative as f64 / (positive + negative) as f64)
      }
      std::cmp::Ordering::Equal => (Sentiment::Neutral, 0.5),
    };

    let toxicity_score = if tokens.is_empty() {
      0.0
    } else {
      (toxic as f64 / tokens.len() as f64).min(1.0)
    };

    // First few distinct longer tokens stand in for keyword extraction.
    let mut seen = HashSet::new();
    let keywords = tokens
      .into_iter()
      .filter(|t| t.chars().count() >= MIN_KEYWORD_LEN)
      .filter(|t| seen.insert(t.clone()))
      .take(MAX_KEYWORDS)
      .collect();

    AnalysisOutcome {
      sentiment,
      sentiment_score,
      toxicity_score,
      language: "en".to_owned(),
      keywords,
    }
  }
}

impl Analyzer for LexiconAnalyzer {
  fn analyze<'a>(
    &'a self,
    text: &'a str,
  ) -> BoxFuture<'a, Result<AnalysisOutcome>> {
    Box::pin(async move { Ok(Self::score(text)) })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn labels_positive_text() {
    let outcome =
      LexiconAnalyzer.analyze("I love this, great product!").await.unwrap();
    assert_eq!(outcome.sentiment, Sentiment::Positive);
    assert!(outcome.sentiment_score > 0.5);
    assert_eq!(outcome.language, "en");
  }

  #[tokio::test]
  async fn labels_negative_text() {
    let outcome = LexiconAnalyzer
      .analyze("terrible support, worst experience, very disappointed")
      .await
      .unwrap();
    assert_eq!(outcome.sentiment, Sentiment::Negative);
    assert!(outcome.sentiment_score > 0.5);
  }

  #[tokio::test]
  async fn balanced_text_is_neutral() {
    let outcome =
      LexiconAnalyzer.analyze("good idea, bad execution").await.unwrap();
    assert_eq!(outcome.sentiment, Sentiment::Neutral);
    assert_eq!(outcome.sentiment_score, 0.5);
  }

  #[tokio::test]
  async fn empty_text_is_neutral_and_nontoxic() {
    let outcome = LexiconAnalyzer.analyze("").await.unwrap();
    assert_eq!(outcome.sentiment, Sentiment::Neutral);
    assert_eq!(outcome.toxicity_score, 0.0);
    assert!(outcome.keywords.is_empty());
  }

  #[tokio::test]
  async fn scores_toxicity_per_token() {
    let outcome = LexiconAnalyzer.analyze("stupid idiot").await.unwrap();
    assert_eq!(outcome.toxicity_score, 1.0);
  }

  #[tokio::test]
  async fn keywords_are_distinct_and_capped() {
    let outcome = LexiconAnalyzer
      .analyze("delivery delivery refund refund warranty invoice support extras")
      .await
      .unwrap();
    assert_eq!(
      outcome.keywords,
      vec!["delivery", "refund", "warranty", "invoice", "support"]
    );
  }
}
