//! Request and response types for repository operations.

/// One page of an ids-only range scan over the index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentIdPage {
    /// Document ids in ascending order.
    pub ids: Vec<String>,
    /// Cursor for the next page; `None` when the scan is exhausted.
    pub next_start: Option<String>,
}

impl DocumentIdPage {
    /// Build a page from ids, deriving the cursor from the last id when the
    /// page came back full.
    pub fn from_ids(ids: Vec<String>, limit: usize) -> Self {
        let next_start = if ids.len() == limit && limit > 0 {
            ids.last().cloned()
        } else {
            None
        };
        Self { ids, next_start }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
