use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use mythsearch_core::traits::StoryFetcher;
use mythsearch_core::types::StoryRecord;
use mythsearch_core::{Error, Result};

/// Reads stories from `<root>/<continent>/<culture>/<filename>`.
#[derive(Debug, Clone)]
pub struct FsStoryFetcher {
    root: PathBuf,
}

impl FsStoryFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locate(&self, continent: &str, culture: &str, filename: &str) -> Option<PathBuf> {
        let mut path = self.root.clone();
        for part in [continent, culture, filename] {
            let mut components = Path::new(part).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(c)), None) => path.push(c),
                _ => return None,
            }
        }
        Some(path)
    }
}

impl StoryFetcher for FsStoryFetcher {
    fn fetch(&self, continent: &str, culture: &str, filename: &str) -> Result<Option<String>> {
        let Some(path) = self.locate(continent, culture, filename) else {
            return Err(Error::NotFound(format!("invalid story location {continent}/{culture}/{filename}")));
        };
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Backend(format!("reading {}: {e}", path.display()))),
        }
    }
}

/// Full text of a selected story, or why it cannot be shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StoryText {
    Available { text: String },
    Unavailable { reason: String },
}

impl StoryText {
    pub fn text(&self) -> Option<&str> {
        match self {
            StoryText::Available { text } => Some(text),
            StoryText::Unavailable { .. } => None,
        }
    }
}

/// Fetches the text for `record`. Never fails: every problem is reported as
/// `Unavailable`.
pub fn fetch_story(fetcher: &dyn StoryFetcher, record: &StoryRecord) -> StoryText {
    let (Some(continent), Some(culture), Some(filename)) =
        (record.continent.as_deref(), record.culture.as_deref(), record.filename.as_deref())
    else {
        return StoryText::Unavailable { reason: "story record has no location".into() };
    };
    match fetcher.fetch(continent, culture, filename) {
        Ok(Some(text)) => StoryText::Available { text },
        Ok(None) => StoryText::Unavailable { reason: format!("{filename} not found") },
        Err(e) => {
            warn!(story = record.id, error = %e, "story fetch failed");
            StoryText::Unavailable { reason: e.to_string() }
        }
    }
}
