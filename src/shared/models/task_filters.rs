use serde::{Deserialize, Serialize};

/// Filter criteria for the task list. Each distinct combination is its own
/// cache entry; the backend evaluates the predicate, never the client.
/// List query parameters. The normalized value is itself the list cache key,
/// so two filter sets share an entry only when every field is equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordering: Option<String>,
}

impl TaskFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_ordering(mut self, ordering: impl Into<String>) -> Self {
        self.ordering = Some(ordering.into());
        self
    }

    /// Blank values mean "no filter" and are dropped; anything else is
    /// kept exactly as typed.
    pub fn normalized(&self) -> Self {
        fn keep(value: &Option<String>) -> Option<String> {
            value.clone().filter(|v| !v.trim().is_empty())
        }

        Self {
            status: keep(&self.status),
            priority: keep(&self.priority),
            search: keep(&self.search),
            ordering: keep(&self.ordering),
        }
    }

    /// Query parameters actually sent, in a fixed order.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let normalized = self.normalized();
        [
            ("status", normalized.status),
            ("priority", normalized.priority),
            ("search", normalized.search),
            ("ordering", normalized.ordering),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.params().is_empty()
    }
}
