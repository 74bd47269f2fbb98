/// One slice of an ordered sequence
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Length of the full sequence
    pub total: usize,
    pub has_more: bool,
}

/// Slice `items` to the 1-based `page` of `per_page` entries.
///
/// Callers must pass `page >= 1` and `per_page >= 1`; request validation
/// happens before this point.
pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> Page<T> {
    let total = items.len();
    let start = page.saturating_sub(1).saturating_mul(per_page);
    let end = start.saturating_add(per_page);

    let items = if start >= total {
        Vec::new()
    } else {
        items.into_iter().skip(start).take(per_page).collect()
    };

    Page {
        items,
        total,
        has_more: total > end,
    }
}
