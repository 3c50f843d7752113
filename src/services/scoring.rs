//! Tag relationship scoring
//!
//! Scores how semantically related a set of tags is, using pointwise
//! mutual information (PMI) over the article corpus. For a tag pair (a, b):
//!
//!   pmi(a, b) = ln( (co(a,b) * N) / (freq(a) * freq(b)) )
//!
//! where N is the corpus size, freq the per-tag article counts and co the
//! number of articles carrying both tags. The final score is the mean PMI
//! over all pairs with full corpus support. Pairs where any factor is zero
//! are skipped rather than scored as negative infinity.
//!
//! Scores are advisory: positive means the tags co-occur more than chance,
//! zero means independence or insufficient data, negative means they
//! co-occur less than chance. Scoring never fails a write; corpus query
//! errors degrade to 0.0 with a warning.

use crate::db::repositories::corpus::{pair_key, CorpusStatsRepository};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Computes tag relationship scores from corpus statistics.
pub struct RelationshipScorer {
    corpus: Arc<dyn CorpusStatsRepository>,
}

impl RelationshipScorer {
    /// Create a new scorer over the given corpus statistics source
    pub fn new(corpus: Arc<dyn CorpusStatsRepository>) -> Self {
        Self { corpus }
    }

    /// Score a set of tag names.
    ///
    /// Names are trimmed and deduplicated first. Returns 0.0 for fewer
    /// than two distinct tags, an empty corpus, or any corpus query
    /// failure.
    pub async fn score(&self, tag_names: &[String]) -> f64 {
        // BTreeSet both dedupes and fixes the iteration order, so the
        // result is independent of input order
        let names: Vec<String> = tag_names
            .iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if names.len() < 2 {
            return 0.0;
        }

        let total = match self.corpus.get_total_article_count().await {
            Ok(total) => total,
            Err(e) => {
                tracing::warn!("Failed to get corpus size for tag scoring: {:#}", e);
                return 0.0;
            }
        };
        if total == 0 {
            return 0.0;
        }

        let frequencies = match self.corpus.get_tag_frequencies(&names).await {
            Ok(frequencies) => frequencies,
            Err(e) => {
                tracing::warn!("Failed to get tag frequencies for scoring: {:#}", e);
                return 0.0;
            }
        };

        let co_occurrences = match self.corpus.get_tag_pair_co_occurrences(&names).await {
            Ok(co_occurrences) => co_occurrences,
            Err(e) => {
                tracing::warn!("Failed to get tag co-occurrences for scoring: {:#}", e);
                return 0.0;
            }
        };

        mean_pairwise_pmi(&names, total, &frequencies, &co_occurrences)
    }

    /// Score an article by the tag set of its latest version.
    pub async fn score_for_article(&self, article_id: i64) -> f64 {
        let names = match self.corpus.get_tags_for_article(article_id).await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(article_id, "Failed to resolve article tags for scoring: {:#}", e);
                return 0.0;
            }
        };
        self.score(&names).await
    }
}

/// Mean PMI over all tag pairs with nonzero frequencies and co-occurrence.
///
/// Pure function over pre-fetched statistics. Pairs missing from the maps
/// count as zero and are skipped; if no pair has support the score is 0.0.
pub fn mean_pairwise_pmi(
    names: &[String],
    total_articles: i64,
    frequencies: &HashMap<String, i64>,
    co_occurrences: &HashMap<String, i64>,
) -> f64 {
    let mut sum = 0.0;
    let mut pair_count = 0u32;

    for i in 0..names.len() {
        for j in (i + 1)..names.len() {
            let freq_a = frequencies.get(&names[i]).copied().unwrap_or(0);
            let freq_b = frequencies.get(&names[j]).copied().unwrap_or(0);
            let co = co_occurrences
                .get(&pair_key(&names[i], &names[j]))
                .copied()
                .unwrap_or(0);

            if freq_a == 0 || freq_b == 0 || co == 0 {
                continue;
            }

            let pmi =
                ((co as f64 * total_articles as f64) / (freq_a as f64 * freq_b as f64)).ln();
            sum += pmi;
            pair_count += 1;
        }
    }

    if pair_count == 0 {
        0.0
    } else {
        sum / pair_count as f64
    }
}
