//! Exact-match structured filtering over a ranked candidate stream.

use tracing::warn;

use crate::metadata::MetadataStore;
use crate::types::{FilterSpec, SearchHit, StoryRecord};

/// Whether `record` satisfies every active constraint in `spec`.
///
/// Continent and culture compare case-sensitively; the creature constraint is
/// a key-membership test on `species_mentions`. Absent fields never match an
/// active constraint.
pub fn matches(record: &StoryRecord, spec: &FilterSpec) -> bool {
    fn field_ok(field: &Option<String>, wanted: &Option<String>) -> bool {
        match wanted {
            None => true,
            Some(w) => field.as_deref() == Some(w.as_str()),
        }
    }

    field_ok(&record.continent, &spec.continent)
        && field_ok(&record.culture, &spec.culture)
        && spec.creature.as_deref().map_or(true, |c| record.mentions(c))
}

/// Applies structured filters to ranked candidates without reordering them.
pub struct FilterEngine<'a> {
    metadata: &'a MetadataStore,
}

impl<'a> FilterEngine<'a> {
    pub fn new(metadata: &'a MetadataStore) -> Self {
        Self { metadata }
    }

    /// Keeps the hits whose story satisfies `spec`, in ranked order.
    pub fn apply<I>(&self, ranked: I, spec: &FilterSpec) -> Vec<SearchHit>
    where
        I: IntoIterator<Item = SearchHit>,
    {
        ranked.into_iter().filter(|hit| self.keep(hit, spec)).collect()
    }

    fn keep(&self, hit: &SearchHit, spec: &FilterSpec) -> bool {
        match self.metadata.get(hit.story) {
            Some(rec) => matches(rec, spec),
            None => {
                warn!(story = hit.story, "hit refers to a row without metadata; skipping");
                false
            }
        }
    }
}
