//! Free, local summarization: an extractive scorer with a truncation fallback.

use std::{cmp::Ordering, sync::Arc};

use crate::{
    article::{extract_article_text, truncate_chars},
    config::TierLimits,
    errors::Error,
    ports::PageFetcher,
    Result,
};

/// Fetched article text shorter than this is not worth summarizing.
const MIN_ARTICLE_CHARS: usize = 100;

pub trait SummaryStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn summarize(&self, text: &str, max_length: usize) -> Result<String>;
}

/// Scores sentences by length and position and keeps the best three.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExtractiveStrategy;

impl SummaryStrategy for ExtractiveStrategy {
    fn name(&self) -> &'static str {
        "extractive"
    }

    fn summarize(&self, text: &str, max_length: usize) -> Result<String> {
        let sentences: Vec<&str> = text.split(". ").collect();
        if sentences.len() <= 3 {
            return Ok(text.to_string());
        }

        let early = sentences.len() / 3;
        let mut scored: Vec<(f64, &str)> = sentences
            .iter()
            .enumerate()
            .filter_map(|(i, sentence)| {
                let s = sentence.trim();
                if s.chars().count() < 10 {
                    return None;
                }
                let mut score = s.split_whitespace().count() as f64;
                if i == 0 {
                    score *= 1.5;
                }
                if i < early {
                    score *= 1.2;
                }
                Some((score, s))
            })
            .collect();

        if scored.is_empty() {
            return Err(Error::External("no scorable sentences".to_string()));
        }

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.1.cmp(a.1))
        });

        let mut summary = scored
            .iter()
            .take(3)
            .map(|(_, s)| *s)
            .collect::<Vec<_>>()
            .join(". ");
        if summary.chars().count() > max_length {
            summary = format!("{}...", truncate_chars(&summary, max_length));
        }
        summary.push('.');
        Ok(summary)
    }
}

/// First fifty words.
#[derive(Clone, Copy, Debug, Default)]
pub struct TruncationStrategy;

impl SummaryStrategy for TruncationStrategy {
    fn name(&self) -> &'static str {
        "truncation"
    }

    fn summarize(&self, text: &str, _max_length: usize) -> Result<String> {
        const MAX_WORDS: usize = 50;
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.len() <= MAX_WORDS {
            return Ok(text.to_string());
        }
        Ok(format!("{}...", words[..MAX_WORDS].join(" ")))
    }
}

/// Tries each strategy in order; the first success wins.
pub struct TextSummarizer {
    strategies: Vec<Box<dyn SummaryStrategy>>,
}

impl Default for TextSummarizer {
    fn default() -> Self {
        Self::new(vec![
            Box::new(ExtractiveStrategy),
            Box::new(TruncationStrategy),
        ])
    }
}

impl TextSummarizer {
    pub fn new(strategies: Vec<Box<dyn SummaryStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn summarize(&self, text: &str, max_length: usize) -> Result<String> {
        for strategy in &self.strategies {
            match strategy.summarize(text, max_length) {
                Ok(summary) => return Ok(summary),
                Err(e) => {
                    tracing::warn!(strategy = strategy.name(), "summarization method error: {e}");
                }
            }
        }
        Err(Error::Summarization)
    }
}

/// Fetch an article, extract its body and summarize it within plan limits.
pub struct ArticleSummarizer {
    fetcher: Arc<dyn PageFetcher>,
    summarizer: TextSummarizer,
}

impl ArticleSummarizer {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            summarizer: TextSummarizer::default(),
        }
    }

    pub async fn summarize_url(&self, url: &str, limits: &TierLimits) -> Result<String> {
        let html = self.fetcher.fetch(url).await?;
        let text = extract_article_text(&html, limits.max_paragraphs)?;
        if text.chars().count() < MIN_ARTICLE_CHARS {
            return Err(Error::NotEnoughContent);
        }
        let text = truncate_chars(&text, limits.article_text_limit);
        self.summarizer.summarize(&text, limits.summary_max_chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, domain::Plan};
    use async_trait::async_trait;

    struct StaticPage(std::result::Result<String, u16>);

    #[async_trait]
    impl PageFetcher for StaticPage {
        async fn fetch(&self, _url: &str) -> Result<String> {
            self.0.clone().map_err(|status| Error::Http { status })
        }
    }

    struct Failing;

    impl SummaryStrategy for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn summarize(&self, _text: &str, _max_length: usize) -> Result<String> {
            Err(Error::External("boom".to_string()))
        }
    }

    #[test]
    fn short_text_is_returned_unchanged() {
        let text = "One sentence. Two sentence. Three sentence";
        assert_eq!(ExtractiveStrategy.summarize(text, 10).unwrap(), text);
    }

    #[test]
    fn extractive_prefers_long_and_early_sentences() {
        let text = "Rust makes systems programming approachable for many teams. \
                    It is fast. \
                    The borrow checker prevents whole classes of memory bugs at compile time. \
                    Cargo handles builds. \
                    Many companies now ship Rust in production services and tooling. \
                    Tiny end";
        let summary = ExtractiveStrategy.summarize(text, 1000).unwrap();
        assert_eq!(
            summary,
            "Rust makes systems programming approachable for many teams. \
             The borrow checker prevents whole classes of memory bugs at compile time. \
             Many companies now ship Rust in production services and tooling."
        );
    }

    #[test]
    fn extractive_truncates_to_max_length() {
        let text = "Alpha beta gamma delta epsilon. Zeta eta theta iota kappa. \
                    Lambda mu nu xi omicron. Pi rho sigma tau upsilon";
        let summary = ExtractiveStrategy.summarize(text, 20).unwrap();
        assert!(summary.ends_with("...."));
        assert_eq!(summary.chars().count(), 24);
    }

    #[test]
    fn extractive_without_scorable_sentences_fails() {
        assert!(ExtractiveStrategy.summarize("a. b. c. d. e", 100).is_err());
    }

    #[test]
    fn truncation_keeps_fifty_words() {
        let text = (0..80).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let summary = TruncationStrategy.summarize(&text, 0).unwrap();
        assert!(summary.ends_with("w49..."));
        assert_eq!(summary.split_whitespace().count(), 50);
    }

    #[test]
    fn chain_falls_through_to_next_strategy() {
        let summarizer =
            TextSummarizer::new(vec![Box::new(Failing), Box::new(TruncationStrategy)]);
        assert_eq!(summarizer.summarize("just a few words", 10).unwrap(), "just a few words");
    }

    #[test]
    fn chain_reports_unavailable_when_all_fail() {
        let summarizer = TextSummarizer::new(vec![Box::new(Failing)]);
        assert!(matches!(
            summarizer.summarize("x", 10),
            Err(Error::Summarization)
        ));
    }

    #[tokio::test]
    async fn article_with_little_text_is_rejected() {
        let page = "<html><body><p>Too short to be an article at all, honestly, really.</p></body></html>";
        let s = ArticleSummarizer::new(Arc::new(StaticPage(Ok(page.to_string()))));
        let limits = Config::with_token("t").limits(Plan::Free);
        assert!(matches!(
            s.summarize_url("https://x", &limits).await,
            Err(Error::NotEnoughContent)
        ));
    }

    #[tokio::test]
    async fn http_errors_propagate() {
        let s = ArticleSummarizer::new(Arc::new(StaticPage(Err(503))));
        let limits = Config::with_token("t").limits(Plan::Free);
        assert!(matches!(
            s.summarize_url("https://x", &limits).await,
            Err(Error::Http { status: 503 })
        ));
    }

    #[tokio::test]
    async fn article_is_summarized_within_plan_length() {
        let para = "Researchers announced a new battery chemistry that charges in minutes. \
                    The prototype retained most of its capacity after thousands of cycles. \
                    Industry analysts expect the first commercial cells within three years. \
                    Critics noted that the materials remain expensive to produce at scale";
        let page = format!("<html><body><p>{para}</p><p>{para}</p></body></html>");
        let s = ArticleSummarizer::new(Arc::new(StaticPage(Ok(page))));
        let limits = Config::with_token("t").limits(Plan::Free);
        let summary = s.summarize_url("https://x", &limits).await.unwrap();
        assert!(summary.chars().count() <= limits.summary_max_chars + 4);
        assert!(summary.contains("battery chemistry"));
    }
}
