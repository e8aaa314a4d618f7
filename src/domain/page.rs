/// Page size used when the client does not ask for one.
pub const DEFAULT_LIMIT: u32 = 10;

/// Largest page a client may ask for.
pub const MAX_LIMIT: u32 = 100;

/// One-based page window. Out-of-range input is clamped rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self { number: 1, limit: DEFAULT_LIMIT }
    }
}

impl Page {
    #[must_use]
    pub fn new(number: Option<u32>, limit: Option<u32>) -> Self {
        Self { number: number.unwrap_or(1).max(1), limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT) }
    }

    #[must_use]
    pub fn offset(self) -> u64 {
        (u64::from(self.number) - 1) * u64::from(self.limit)
    }

    #[must_use]
    pub fn total_pages(self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.limit))
    }

    /// The slice of an already ordered list this page covers.
    #[must_use]
    pub fn slice<T: Clone>(self, items: &[T]) -> Vec<T> {
        let start = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        items.iter().skip(start).take(self.limit as usize).cloned().collect()
    }
}
