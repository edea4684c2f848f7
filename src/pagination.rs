use serde::{Deserialize, Serialize};
use validator::Validate;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page request for list operations. Pages are numbered from 1; page 0 is
/// read as the first page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Validate)]
pub struct PageQuery {
    #[validate(range(min = 1, max = 100, message = "size must be between 1 and 100"))]
    pub size: u32,
    #[serde(default = "default_page_no")]
    #[validate(range(min = 0, message = "page_no must not be negative"))]
    pub page_no: i32,
}

fn default_page_no() -> i32 {
    1
}

impl PageQuery {
    pub fn new(size: u32, page_no: i32) -> Self {
        Self { size, page_no }
    }

    /// Effective 1-based page number.
    pub fn page(&self) -> u64 {
        self.page_no.max(1) as u64
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.size)
    }

    /// Calculate zero-based offset for pagination
    pub fn offset(&self) -> u64 {
        (self.page() - 1) * self.limit()
    }
}

/// Standard pagination response metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub page: u64,
    pub limit: u64,
    pub total_count: u64,
    pub total_pages: u64,
}

impl PageMeta {
    pub fn new(page: u64, limit: u64, total_count: u64) -> Self {
        let total_pages = if total_count == 0 || limit == 0 {
            0
        } else {
            (total_count + limit - 1) / limit
        };
        Self {
            page,
            limit,
            total_count,
            total_pages,
        }
    }
}

/// One page of rows plus the counts needed to walk the rest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub limit: u64,
    pub page: u64,
    pub total_count: u64,
    pub total_pages: u64,
    pub message: String,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, query: &PageQuery, total_count: u64) -> Self {
        let meta = PageMeta::new(query.page(), query.limit(), total_count);
        let message = if items.is_empty() {
            "Data is not found"
        } else {
            "Data is found"
        };
        Self {
            items,
            limit: meta.limit,
            page: meta.page,
            total_count: meta.total_count,
            total_pages: meta.total_pages,
            message: message.to_string(),
        }
    }

    /// Converts every row, failing on the first row that does not convert.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
            limit: self.limit,
            page: self.page,
            total_count: self.total_count,
            total_pages: self.total_pages,
            message: self.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 10, 0)]
    #[case(1, 10, 1)]
    #[case(10, 10, 1)]
    #[case(11, 10, 2)]
    #[case(101, 100, 2)]
    fn total_pages_rounds_up(#[case] total: u64, #[case] size: u64, #[case] expected: u64) {
        assert_eq!(PageMeta::new(1, size, total).total_pages, expected);
    }

    #[rstest]
    #[case(1, 0)]
    #[case(0, 0)]
    #[case(3, 40)]
    fn offset_skips_previous_pages(#[case] page_no: i32, #[case] expected: u64) {
        assert_eq!(PageQuery::new(20, page_no).offset(), expected);
    }

    #[rstest]
    #[case(0, 1)]
    #[case(101, 1)]
    #[case(10, -1)]
    fn rejects_out_of_range_queries(#[case] size: u32, #[case] page_no: i32) {
        assert!(PageQuery::new(size, page_no).validate().is_err());
    }

    #[rstest]
    #[case(1, 0)]
    #[case(100, 1)]
    #[case(MAX_PAGE_SIZE, 7)]
    fn accepts_boundary_queries(#[case] size: u32, #[case] page_no: i32) {
        assert!(PageQuery::new(size, page_no).validate().is_ok());
    }

    #[test]
    fn empty_page_is_not_an_error() {
        let page: Page<i32> = Page::new(Vec::new(), &PageQuery::new(10, 1), 0);
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.message, "Data is not found");
    }

    #[test]
    fn try_map_keeps_counts() {
        let page = Page::new(vec![1, 2], &PageQuery::new(2, 1), 5);
        let mapped: Page<String> = page.try_map(|n| Ok::<_, ()>(n.to_string())).unwrap();
        assert_eq!(mapped.items, vec!["1", "2"]);
        assert_eq!(mapped.total_pages, 3);
        assert_eq!(mapped.message, "Data is found");
    }
}
