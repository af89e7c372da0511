//! Page arithmetic shared by the list synchronizer and list views

/// Rows per page for every list view
pub const PAGE_SIZE: u32 = 10;

/// Number of pages needed to show `total_count` rows
pub fn page_count(total_count: u64) -> u32 {
    let pages = total_count.div_ceil(PAGE_SIZE as u64);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Zero-based, inclusive row range of a 1-based page (`Range: from-to`)
pub fn row_range(page: u32) -> (u64, u64) {
    let from = (page.max(1) as u64 - 1) * PAGE_SIZE as u64;
    (from, from + PAGE_SIZE as u64 - 1)
}

/// Position of the current page within a collection of `total_count` rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: u32,
    pub total_count: u64,
}

impl Pagination {
    pub fn new(current_page: u32, total_count: u64) -> Self {
        Self {
            current_page: current_page.max(1),
            total_count,
        }
    }

    pub fn page_count(&self) -> u32 {
        page_count(self.total_count)
    }

    /// A single page needs no pagination controls
    pub fn is_needed(&self) -> bool {
        self.page_count() > 1
    }

    pub fn is_first(&self) -> bool {
        self.current_page == 1
    }

    pub fn is_last(&self) -> bool {
        self.current_page >= self.page_count()
    }

    /// 1-based index of the first row on this page
    pub fn first_shown(&self) -> u64 {
        (self.current_page as u64 - 1) * PAGE_SIZE as u64 + 1
    }

    /// 1-based index of the last row on this page
    pub fn last_shown(&self) -> u64 {
        if self.is_last() {
            self.total_count
        } else {
            self.current_page as u64 * PAGE_SIZE as u64
        }
    }

    /// Page to navigate to on "next", stays put on the last page
    pub fn next(&self) -> u32 {
        if self.is_last() {
            self.current_page
        } else {
            self.current_page + 1
        }
    }

    /// Page to navigate to on "previous", stays put on the first page
    pub fn previous(&self) -> u32 {
        if self.is_first() {
            self.current_page
        } else {
            self.current_page - 1
        }
    }
}
