//! Domain types shared by the index, filter and pagination layers.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Row position of a story. Row `i` of the vector index and record `i` of the
/// metadata describe the same story.
pub type StoryId = usize;

/// Sentinel offered in selection lists meaning "no constraint".
pub const ALL: &str = "All";

/// One emotion prediction attached to a story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionScore {
    pub label: String,
    #[serde(default)]
    pub score: f32,
}

/// Structured attributes of one story, immutable after load.
///
/// Every field except `id` may be absent on malformed records. Absent fields
/// never match an active filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryRecord {
    #[serde(skip_deserializing)]
    pub id: StoryId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub culture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species_mentions: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion_pred_top3: Option<Vec<EmotionScore>>,
}

impl StoryRecord {
    pub fn mentions(&self, species: &str) -> bool {
        self.species_mentions
            .as_ref()
            .is_some_and(|m| m.contains_key(species))
    }

    pub fn species(&self) -> impl Iterator<Item = &str> {
        self.species_mentions.iter().flat_map(|m| m.keys().map(String::as_str))
    }

    pub fn top_emotions(&self) -> impl Iterator<Item = &str> {
        self.emotion_pred_top3
            .iter()
            .flat_map(|e| e.iter().take(3).map(|s| s.label.as_str()))
    }
}

/// Similarity metric of a vector index. Decides what "more relevant" means
/// for a raw score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Inner product; higher is more relevant.
    InnerProduct,
    /// Squared euclidean distance; lower is more relevant.
    L2,
}

impl Metric {
    /// Orders two scores so that the more relevant one sorts first.
    pub fn rank(self, a: f32, b: f32) -> Ordering {
        match self {
            Metric::InnerProduct => b.total_cmp(&a),
            Metric::L2 => a.total_cmp(&b),
        }
    }
}

/// A ranked candidate: raw metric score plus the story it refers to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub score: f32,
    pub story: StoryId,
}

/// Exact-match constraints. `None` means no constraint on that dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterSpec {
    pub continent: Option<String>,
    pub culture: Option<String>,
    pub creature: Option<String>,
}

impl FilterSpec {
    /// Builds a spec from selection-list values, where `All` means unconstrained.
    pub fn from_selections(continent: &str, culture: &str, creature: &str) -> Self {
        fn pick(v: &str) -> Option<String> {
            if v.is_empty() || v == ALL { None } else { Some(v.to_string()) }
        }
        Self { continent: pick(continent), culture: pick(culture), creature: pick(creature) }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.continent.is_none() && self.culture.is_none() && self.creature.is_none()
    }
}

/// Filter choices observed in the corpus, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub continents: BTreeSet<String>,
    pub cultures: BTreeSet<String>,
    pub creatures: BTreeSet<String>,
}

impl FilterOptions {
    /// Selection list for a dimension, led by the `All` sentinel.
    pub fn choices(values: &BTreeSet<String>) -> Vec<String> {
        std::iter::once(ALL.to_string()).chain(values.iter().cloned()).collect()
    }

    /// Active selections in `spec` that no story carries.
    pub fn unknown_selections<'a>(&self, spec: &'a FilterSpec) -> Vec<&'a str> {
        let mut unknown = Vec::new();
        for (value, known) in [
            (&spec.continent, &self.continents),
            (&spec.culture, &self.cultures),
            (&spec.creature, &self.creatures),
        ] {
            if let Some(v) = value {
                if !known.contains(v) {
                    unknown.push(v.as_str());
                }
            }
        }
        unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selections_map_all_to_unconstrained() {
        let spec = FilterSpec::from_selections(ALL, "Norse", ALL);
        assert_eq!(spec.continent, None);
        assert_eq!(spec.culture.as_deref(), Some("Norse"));
        assert!(!spec.is_unconstrained());
        assert!(FilterSpec::from_selections(ALL, ALL, "").is_unconstrained());
    }

    #[test]
    fn metric_orders_most_relevant_first() {
        let mut ip = vec![0.1f32, 0.9, 0.5];
        ip.sort_by(|a, b| Metric::InnerProduct.rank(*a, *b));
        assert_eq!(ip, vec![0.9, 0.5, 0.1]);

        let mut l2 = vec![0.1f32, 0.9, 0.5];
        l2.sort_by(|a, b| Metric::L2.rank(*a, *b));
        assert_eq!(l2, vec![0.1, 0.5, 0.9]);
    }

    #[test]
    fn record_helpers_tolerate_missing_fields() {
        let rec = StoryRecord::default();
        assert!(!rec.mentions("fox"));
        assert_eq!(rec.species().count(), 0);
        assert_eq!(rec.top_emotions().count(), 0);
    }
}
