//! Relevance scoring: cosine similarity adjusted by recency, importance and
//! document type.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use mnemos_core::{defaults, Document, DocumentType};

/// Boost weights applied on top of raw similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct RelevanceWeights {
    /// Added when the document was created less than seven days ago.
    pub recent_week_boost: f32,
    /// Added on top of the weekly boost when created less than a day ago.
    pub recent_day_boost: f32,
    /// Multiplier of `importance / 10`.
    pub importance_weight: f32,
    /// Fixed boost per document type (missing types get 0).
    pub type_boosts: BTreeMap<DocumentType, f32>,
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        let type_boosts = BTreeMap::from([
            (DocumentType::Task, defaults::BOOST_TASK),
            (DocumentType::Project, defaults::BOOST_PROJECT),
            (DocumentType::Deal, defaults::BOOST_DEAL),
            (DocumentType::Communication, defaults::BOOST_COMMUNICATION),
            (DocumentType::Knowledge, defaults::BOOST_KNOWLEDGE),
            (DocumentType::Contact, defaults::BOOST_CONTACT),
            (DocumentType::Company, defaults::BOOST_COMPANY),
            (DocumentType::External, defaults::BOOST_EXTERNAL),
        ]);
        Self {
            recent_week_boost: defaults::BOOST_RECENT_WEEK,
            recent_day_boost: defaults::BOOST_RECENT_DAY,
            importance_weight: defaults::BOOST_IMPORTANCE_WEIGHT,
            type_boosts,
        }
    }
}

impl RelevanceWeights {
    /// Load weights from environment variables, falling back to defaults.
    ///
    /// - `RELEVANCE_RECENT_WEEK_BOOST`
    /// - `RELEVANCE_RECENT_DAY_BOOST`
    /// - `RELEVANCE_IMPORTANCE_WEIGHT`
    pub fn from_env() -> Self {
        let fallback = Self::default();
        let read = |name: &str, default: f32| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
                .filter(|v| v.is_finite())
                .unwrap_or(default)
        };
        Self {
            recent_week_boost: read("RELEVANCE_RECENT_WEEK_BOOST", fallback.recent_week_boost),
            recent_day_boost: read("RELEVANCE_RECENT_DAY_BOOST", fallback.recent_day_boost),
            importance_weight: read("RELEVANCE_IMPORTANCE_WEIGHT", fallback.importance_weight),
            type_boosts: fallback.type_boosts,
        }
    }

    /// Pure similarity ranking, no boosts.
    pub fn none() -> Self {
        Self {
            recent_week_boost: 0.0,
            recent_day_boost: 0.0,
            importance_weight: 0.0,
            type_boosts: BTreeMap::new(),
        }
    }

    /// Add a flat boost for one document type.
    pub fn with_type_boost(mut self, doc_type: DocumentType, boost: f32) -> Self {
        self.type_boosts.insert(doc_type, boost);
        self
    }

    /// Set the weight of `importance / 10`.
    pub fn with_importance_weight(mut self, weight: f32) -> Self {
        self.importance_weight = weight;
        self
    }

    pub fn type_boost(&self, doc_type: DocumentType) -> f32 {
        self.type_boosts.get(&doc_type).copied().unwrap_or(0.0)
    }

    /// Week and day boosts for a document created at `created_at`.
    pub fn recency_boost(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
        let age = now - created_at;
        let mut boost = 0.0;
        if age < Duration::days(7) {
            boost += self.recent_week_boost;
        }
        if age < Duration::days(1) {
            boost += self.recent_day_boost;
        }
        boost
    }

    pub fn importance_boost(&self, importance: u8) -> f32 {
        importance as f32 / 10.0 * self.importance_weight
    }

    /// Relevance of `doc` at `similarity`, clamped to [0, 1].
    pub fn score(&self, doc: &Document, similarity: f32, now: DateTime<Utc>) -> f32 {
        let meta = &doc.metadata;
        let raw = similarity
            + self.recency_boost(meta.created_at, now)
            + self.importance_boost(meta.importance)
            + self.type_boost(meta.doc_type);
        raw.clamp(0.0, 1.0)
    }
}
