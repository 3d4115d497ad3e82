/// 1-indexed page window over a counted result set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pager {
    pub page: usize,
    pub page_count: usize,
}

impl Pager {
    /// Builds a pager for the requested page, or None when the page is out
    /// of range. The first page of an empty set is always in range.
    pub fn new(page: usize, total: usize, per_page: usize) -> Option<Self> {
        let page_count = std::cmp::max((total + per_page - 1) / per_page, 1);
        if page == 0 || page > page_count {
            return None;
        }
        Some(Self { page, page_count })
    }

    pub fn offset(&self, per_page: usize) -> u64 {
        ((self.page - 1) * per_page) as u64
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.page_count
    }

    pub fn prev_page(&self) -> usize {
        self.page - 1
    }

    pub fn next_page(&self) -> usize {
        self.page + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_of_empty_set_is_valid() {
        let pager = Pager::new(1, 0, 10).unwrap();
        assert_eq!(pager.page_count, 1);
        assert!(!pager.has_prev());
        assert!(!pager.has_next());
    }

    #[test]
    fn page_zero_is_invalid() {
        assert_eq!(Pager::new(0, 50, 10), None);
    }

    #[test]
    fn page_past_the_end_is_invalid() {
        assert_eq!(Pager::new(2, 0, 10), None);
        assert_eq!(Pager::new(6, 50, 10), None);
    }

    #[test]
    fn partial_last_page_counts() {
        let pager = Pager::new(2, 11, 10).unwrap();
        assert_eq!(pager.page_count, 2);
        assert!(pager.has_prev());
        assert!(!pager.has_next());
        assert_eq!(pager.offset(10), 10);
    }

    #[test]
    fn exact_multiple_has_no_spare_page() {
        assert_eq!(Pager::new(3, 30, 10), None);
        assert_eq!(Pager::new(10, 30, 3).unwrap().page_count, 10);
    }
}
