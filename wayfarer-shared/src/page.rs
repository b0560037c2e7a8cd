use serde::{Deserialize, Serialize};

const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;

/// Pagination parameters as they arrive on list endpoints (`?page=2&per_page=50`).
/// Pages are 1-based.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 { 1 }
fn default_per_page() -> u32 { DEFAULT_PER_PAGE }

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, per_page: DEFAULT_PER_PAGE }
    }
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }

    /// Clamp out-of-range values instead of rejecting them.
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> usize {
        let p = self.normalized();
        (u64::from(p.page - 1) * u64::from(p.per_page)).try_into().unwrap_or(usize::MAX)
    }

    pub fn limit(&self) -> usize {
        self.normalized().per_page as usize
    }

    /// Slice an already filtered and sorted result set.
    pub fn apply<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len() as u64;
        let items = items.into_iter().skip(self.offset()).take(self.limit()).collect();
        Page::new(items, total, *self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let request = request.normalized();
        Self {
            items,
            total,
            page: request.page,
            per_page: request.per_page,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_second_page() {
        let req = PageRequest::new(2, 3);
        let page = req.apply((1..=8).collect::<Vec<_>>());
        assert_eq!(page.items, vec![4, 5, 6]);
        assert_eq!(page.total, 8);
        assert_eq!(page.page, 2);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let req = PageRequest::new(0, 10_000).normalized();
        assert_eq!(req.page, 1);
        assert_eq!(req.per_page, MAX_PER_PAGE);
    }

    #[test]
    fn test_huge_page_number_is_empty_not_overflow() {
        let req = PageRequest::new(u32::MAX, 100);
        assert_eq!(req.offset(), (u32::MAX as usize - 1) * 100);
        let page = req.apply(vec![1, 2, 3]);
        assert!(page.items.is_empty());
        assert_eq!(page.page, u32::MAX);
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let page = PageRequest::new(5, 10).apply(vec![1, 2, 3]);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
    }
}
