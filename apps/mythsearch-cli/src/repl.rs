//! Interactive command language.
//!
//! Plain text searches; slash commands change filters or navigate. Filter
//! changes re-run the current query, which starts again at page 1.

use mythsearch_core::types::{FilterSpec, StoryId, ALL};
use mythsearch_engine::{Action, PageView, Response};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Continent,
    Culture,
    Creature,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Query(String),
    SetFilter(Dimension, String),
    ClearFilters,
    Next,
    Prev,
    Page(usize),
    /// Read the result with this rank on the current page.
    Read(usize),
    Facets,
    ShowFilters,
    Help,
    Quit,
    Invalid(String),
}

/// Parses one input line; blank lines yield `None`.
pub fn parse(input: &str) -> Option<Command> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if !input.starts_with('/') {
        return Some(match input {
            "quit" | "exit" => Command::Quit,
            _ => Command::Query(input.to_string()),
        });
    }
    let (name, arg) = match input.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (input, ""),
    };
    let filter = |dim| {
        if arg.is_empty() {
            Command::Invalid(format!("{name} needs a value (or {ALL})"))
        } else {
            Command::SetFilter(dim, arg.to_string())
        }
    };
    Some(match name {
        "/continent" => filter(Dimension::Continent),
        "/culture" => filter(Dimension::Culture),
        "/creature" => filter(Dimension::Creature),
        "/clear" => Command::ClearFilters,
        "/next" | "/n" => Command::Next,
        "/prev" | "/p" => Command::Prev,
        "/page" => match arg.parse::<usize>() {
            Ok(page) if page > 0 => Command::Page(page),
            _ => Command::Invalid(format!("{name} needs a page number")),
        },
        "/read" | "/r" => match arg.parse::<usize>() {
            Ok(rank) if rank > 0 => Command::Read(rank),
            _ => Command::Invalid(format!("{name} needs a result number")),
        },
        "/facets" | "/f" => Command::Facets,
        "/filters" => Command::ShowFilters,
        "/help" | "/h" => Command::Help,
        "/quit" | "/q" => Command::Quit,
        other => Command::Invalid(format!("unknown command {other}; try /help")),
    })
}

/// Client-side view of the session: what to resubmit when a filter changes,
/// and which stories the last page showed.
#[derive(Debug, Default)]
pub struct Repl {
    query: String,
    filters: FilterSpec,
    last_page: Option<PageView>,
}

impl Repl {
    pub fn filters(&self) -> &FilterSpec {
        &self.filters
    }

    /// Engine action for `command`, if it needs one. `Err` carries a message
    /// for the user.
    pub fn action(&mut self, command: &Command) -> Result<Option<Action>, String> {
        match command {
            Command::Query(text) => {
                self.query = text.clone();
                Ok(Some(self.search()))
            }
            Command::SetFilter(dim, value) => {
                let value = (value != ALL).then(|| value.clone());
                match dim {
                    Dimension::Continent => self.filters.continent = value,
                    Dimension::Culture => self.filters.culture = value,
                    Dimension::Creature => self.filters.creature = value,
                }
                Ok(self.resubmit())
            }
            Command::ClearFilters => {
                self.filters = FilterSpec::default();
                Ok(self.resubmit())
            }
            Command::Next => Ok(Some(Action::Next)),
            Command::Prev => Ok(Some(Action::Prev)),
            Command::Page(page) => Ok(Some(Action::GoTo { page: *page })),
            Command::Read(rank) => self.story_at(*rank).map(|story| Some(Action::Select { story })),
            Command::Invalid(msg) => Err(msg.clone()),
            Command::Facets | Command::ShowFilters | Command::Help | Command::Quit => Ok(None),
        }
    }

    pub fn observe(&mut self, response: &Response) {
        if let Some(page) = &response.page {
            self.last_page = Some(page.clone());
        }
    }

    fn search(&self) -> Action {
        Action::Search { query: self.query.clone(), filters: self.filters.clone() }
    }

    fn resubmit(&self) -> Option<Action> {
        (!self.query.trim().is_empty()).then(|| self.search())
    }

    fn story_at(&self, rank: usize) -> Result<StoryId, String> {
        let page = self.last_page.as_ref().ok_or("search for something first")?;
        page.items
            .iter()
            .find(|item| item.rank == rank)
            .map(|item| item.story.id)
            .ok_or_else(|| format!("result {rank} is not on this page"))
    }
}

pub const HELP: &str = "\
🔍 Mythology Story Search
  <text>                 Search stories by meaning
  /continent <name|All>  Filter by continent
  /culture <name|All>    Filter by culture
  /creature <name|All>   Filter by creature
  /clear                 Remove all filters
  /filters               Show active filters
  /next, /n              Next page
  /prev, /p              Previous page
  /page <n>              Jump to page n
  /read <n>, /r <n>      Read result number n
  /facets, /f            List filter values
  /help, /h              Show this help
  /quit, /q              Exit";
