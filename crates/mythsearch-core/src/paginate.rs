use serde::{Deserialize, Serialize};

/// Number of pages for `filtered_count` results: at least one, at most `max_pages`.
pub fn total_pages(filtered_count: usize, page_size: usize, max_pages: usize) -> usize {
    let pages = filtered_count.div_ceil(page_size.max(1)).max(1);
    pages.min(max_pages.max(1))
}

/// Slice of `results` shown on 1-based `page_number`. Out-of-range pages yield
/// an empty slice; page 0 is treated as page 1.
pub fn page<T>(results: &[T], page_number: usize, page_size: usize) -> &[T] {
    let start = (page_number.max(1) - 1).saturating_mul(page_size);
    if start >= results.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(results.len());
    &results[start..end]
}

/// Per-session pagination position.
///
/// `current_page` always lies in `[1, total_pages]`; `total_pages` reflects the
/// last observed result count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPagination")]
pub struct PaginationState {
    current_page: usize,
    total_pages: usize,
    page_size: usize,
    max_pages: usize,
}

impl PaginationState {
    pub fn new(page_size: usize, max_pages: usize) -> Self {
        Self { current_page: 1, total_pages: 1, page_size: page_size.max(1), max_pages: max_pages.max(1) }
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Largest number of results reachable through paging.
    pub fn window(&self) -> usize {
        self.page_size.saturating_mul(self.max_pages)
    }

    /// Records a fresh result count and clamps the current page into range.
    pub fn observe(&mut self, filtered_count: usize) {
        self.total_pages = total_pages(filtered_count, self.page_size, self.max_pages);
        self.current_page = self.current_page.clamp(1, self.total_pages);
    }

    pub fn next(&mut self) {
        if self.current_page < self.total_pages {
            self.current_page += 1;
        }
    }

    /// Jumps to `page`, clamped to the last observed page count.
    pub fn go_to(&mut self, page: usize) {
        self.current_page = page.clamp(1, self.total_pages);
    }

    pub fn prev(&mut self) {
        if self.current_page > 1 {
            self.current_page -= 1;
        }
    }

    /// Back to page 1; used whenever the query or filters change.
    pub fn reset(&mut self) {
        self.current_page = 1;
        self.total_pages = 1;
    }

    /// Zero-based position of the first result on the current page.
    pub fn offset(&self) -> usize {
        (self.current_page - 1) * self.page_size
    }

    pub fn slice<'a, T>(&self, results: &'a [T]) -> &'a [T] {
        page(results, self.current_page, self.page_size)
    }
}

#[derive(Deserialize)]
struct RawPagination {
    current_page: usize,
    total_pages: usize,
    page_size: usize,
    max_pages: usize,
}

impl TryFrom<RawPagination> for PaginationState {
    type Error = String;

    fn try_from(raw: RawPagination) -> std::result::Result<Self, Self::Error> {
        let RawPagination { current_page, total_pages, page_size, max_pages } = raw;
        if page_size == 0 || max_pages == 0 {
            return Err(format!("page_size ({page_size}) and max_pages ({max_pages}) must be >= 1"));
        }
        if !(1..=max_pages).contains(&total_pages) || !(1..=total_pages).contains(&current_page) {
            return Err(format!("page {current_page} of {total_pages} is out of range (max {max_pages})"));
        }
        Ok(Self { current_page, total_pages, page_size, max_pages })
    }
}
