//! Page arithmetic for topic and post listings.

use serde::Serialize;

/// Number of pages needed for `total` items. Never less than one.
pub fn total_pages(total: i64, page_size: i64) -> i64 {
    let page_size = page_size.max(1);
    if total <= 0 {
        return 1;
    }
    (total - 1) / page_size + 1
}

/// Requested page, clamped so that page and page size are at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Current page (1-indexed).
    pub page: i64,
    /// Items per page.
    pub page_size: i64,
}

impl PageRequest {
    /// Create a clamped page request.
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    /// Row offset for database queries.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// The items in this page.
    pub items: Vec<T>,
    /// Total number of items across all pages.
    pub total: i64,
    /// Current page (1-indexed).
    pub page: i64,
    /// Items per page.
    pub page_size: i64,
}

impl<T> Page<T> {
    pub(crate) fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            page_size: request.page_size,
        }
    }

    /// Total number of pages.
    pub fn total_pages(&self) -> i64 {
        total_pages(self.total, self.page_size)
    }

    /// Check if there is a next page.
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Check if there is a previous page.
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 20), 1);
        assert_eq!(total_pages(1, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
        assert_eq!(total_pages(41, 20), 3);
    }

    #[test]
    fn test_total_pages_degenerate_size() {
        assert_eq!(total_pages(5, 0), 5);
        assert_eq!(total_pages(5, -3), 5);
        assert_eq!(total_pages(-1, 20), 1);
    }

    #[test]
    fn test_total_pages_huge_values() {
        assert_eq!(total_pages(2, i64::MAX), 1);
        assert_eq!(total_pages(i64::MAX, i64::MAX), 1);
        assert_eq!(total_pages(i64::MAX, 1), i64::MAX);
        assert_eq!(total_pages(i64::MAX, 2), i64::MAX / 2 + 1);

        let page: Page<i64> = Page::new(vec![1, 2], 2, PageRequest::new(1, i64::MAX));
        assert_eq!(page.total_pages(), 1);
        assert!(!page.has_next());
    }

    #[test]
    fn test_offset_saturates() {
        assert_eq!(PageRequest::new(i64::MAX, i64::MAX).offset(), i64::MAX);
    }

    #[test]
    fn test_page_request_clamps() {
        assert_eq!(PageRequest::new(0, 20), PageRequest::new(1, 20));
        assert_eq!(PageRequest::new(-4, 0), PageRequest::new(1, 1));
        assert_eq!(PageRequest::new(1, 20).offset(), 0);
        assert_eq!(PageRequest::new(3, 20).offset(), 40);
    }

    #[test]
    fn test_page_navigation() {
        let page = Page::new(vec![1, 2], 41, PageRequest::new(2, 20));
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());
        assert!(page.has_prev());

        let last = Page::new(vec![1], 41, PageRequest::new(3, 20));
        assert!(!last.has_next());

        let empty: Page<i64> = Page::new(vec![], 0, PageRequest::new(1, 20));
        assert_eq!(empty.total_pages(), 1);
        assert!(!empty.has_next());
        assert!(!empty.has_prev());
    }
}
