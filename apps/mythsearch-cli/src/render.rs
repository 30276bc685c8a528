use std::fmt::Write;

use mythsearch_core::types::{FilterOptions, FilterSpec, StoryRecord, ALL};
use mythsearch_engine::{PageView, ResultItem, StoryText, StoryView};

const UNKNOWN: &str = "unknown";

pub fn page(view: &PageView) -> String {
    let mut out = String::new();
    let total = if view.total_exact { view.total_results.to_string() } else { format!("{}+", view.total_results) };
    let _ = writeln!(out, "🧠 Matching Stories for \"{}\"{}", view.query, filters_suffix(&view.filters));
    let _ = writeln!(out, "Total Matches: {} | Page {} of {}", total, view.current_page, view.total_pages);
    if view.items.is_empty() {
        let _ = writeln!(out, "\nNo stories match this search.");
        return out;
    }
    for item in &view.items {
        out.push('\n');
        result_item(&mut out, item);
    }
    out
}

fn result_item(out: &mut String, item: &ResultItem) {
    let story = &item.story;
    let _ = writeln!(out, "{}. 📜 {}  [id {}]", item.rank, field(&story.filename), story.id);
    let _ = writeln!(out, "   Culture: {} | Continent: {}", field(&story.culture), field(&story.continent));
    let _ = writeln!(out, "   Similarity Score: {:.2}", item.score);
    if story.emotion_pred_top3.is_some() {
        let _ = writeln!(out, "   Top Emotions: {}", story.top_emotions().collect::<Vec<_>>().join(", "));
    }
    let species: Vec<&str> = story.species().collect();
    if !species.is_empty() {
        let _ = writeln!(out, "   Species Mentioned: {}", species.join(", "));
    }
}

pub fn story(view: &StoryView) -> String {
    let title = view.record.as_ref().map_or_else(|| format!("story {}", view.id), heading);
    match &view.text {
        StoryText::Available { text } => format!("📖 {title}\n\n{}\n", text.trim_end()),
        StoryText::Unavailable { reason } => format!("❌ Couldn't load {title}: {reason}\n"),
    }
}

fn heading(record: &StoryRecord) -> String {
    format!("{} ({}, {})", field(&record.filename), field(&record.culture), field(&record.continent))
}

pub fn facets(options: &FilterOptions) -> String {
    let mut out = String::new();
    for (name, values) in [
        ("🌍 Continents", &options.continents),
        ("🏛️ Cultures", &options.cultures),
        ("🦊 Creatures", &options.creatures),
    ] {
        let _ = writeln!(out, "{name} ({}):", values.len());
        let _ = writeln!(out, "  {}", FilterOptions::choices(values).join(", "));
    }
    out
}

pub fn filters(spec: &FilterSpec) -> String {
    format!(
        "continent={} culture={} creature={}",
        spec.continent.as_deref().unwrap_or(ALL),
        spec.culture.as_deref().unwrap_or(ALL),
        spec.creature.as_deref().unwrap_or(ALL)
    )
}

fn filters_suffix(spec: &FilterSpec) -> String {
    if spec.is_unconstrained() { String::new() } else { format!(" ({})", filters(spec)) }
}

fn field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(UNKNOWN)
}
