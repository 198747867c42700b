//! Pagination request and response shapes

use serde::{Deserialize, Serialize};

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

/// Requested page, 1-based
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl PageParams {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn size(&self) -> u32 {
        self.size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size())
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * self.limit()
    }
}

/// One page of results plus the total count across all pages
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub size: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, params: &PageParams) -> Self {
        let size = params.size();
        let total = total.max(0);
        let pages = u64::try_from(total).unwrap_or(0).div_ceil(u64::from(size));
        let total_pages = u32::try_from(pages).unwrap_or(u32::MAX);
        Self {
            items,
            total,
            page: params.page(),
            size,
            total_pages,
        }
    }
}
