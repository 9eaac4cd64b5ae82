//! Page-window arithmetic shared by every paginated list (users, history,
//! findings).

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: usize = 5;

/// The slice of a collection shown on one page. `start_index..end_index` is a
/// half-open, zero-based range into the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageWindow {
    pub page: usize,
    pub total_pages: usize,
    pub start_index: usize,
    pub end_index: usize,
}

impl PageWindow {
    pub fn len(&self) -> usize {
        self.end_index - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.start_index == self.end_index
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Clamp `requested_page` into `[1, max(1, ceil(count / page_size))]` and
/// compute the matching index range. A `page_size` of zero is treated as one.
pub fn paginate(count: usize, page_size: usize, requested_page: usize) -> PageWindow {
    let page_size = page_size.max(1);
    let total_pages = count.div_ceil(page_size).max(1);
    let page = requested_page.clamp(1, total_pages);

    let start_index = ((page - 1) * page_size).min(count);
    let end_index = (start_index + page_size).min(count);

    PageWindow {
        page,
        total_pages,
        start_index,
        end_index,
    }
}

/// One page of borrowed items plus the window that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct Page<'a, T> {
    pub window: PageWindow,
    pub items: &'a [T],
}

/// A reusable paginator with a configured page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    page_size: usize,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Paginator {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn window(&self, count: usize, requested_page: usize) -> PageWindow {
        paginate(count, self.page_size, requested_page)
    }

    pub fn page<'a, T>(&self, items: &'a [T], requested_page: usize) -> Page<'a, T> {
        let window = self.window(items.len(), requested_page);
        Page {
            window,
            items: &items[window.start_index..window.end_index],
        }
    }
}
