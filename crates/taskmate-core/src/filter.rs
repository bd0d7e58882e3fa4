use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use tracing::trace;

use crate::task::{Category, Task};

pub const ALL_CATEGORIES: &str = "all";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn parse(raw: &str) -> Self {
        if raw == ALL_CATEGORIES {
            CategoryFilter::All
        } else {
            CategoryFilter::Only(Category::parse(raw))
        }
    }

    pub fn label(&self) -> &str {
        match self {
            CategoryFilter::All => "All Categories",
            CategoryFilter::Only(category) => category.label(),
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => task.category.as_str() == category.as_str(),
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str(ALL_CATEGORIES),
            CategoryFilter::Only(category) => f.write_str(category.as_str()),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(CategoryFilter::parse(s.trim()))
    }
}

/// Text query plus category selector; both must match.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    needle: Option<String>,
    category: CategoryFilter,
}

impl Filter {
    pub fn new(query: &str, category: CategoryFilter) -> Self {
        let needle = if query.is_empty() {
            None
        } else {
            Some(query.to_lowercase())
        };
        Self { needle, category }
    }

    pub fn is_pass_through(&self) -> bool {
        self.needle.is_none() && self.category == CategoryFilter::All
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(needle) = &self.needle
            && !task.title.to_lowercase().contains(needle)
            && !task.description.to_lowercase().contains(needle)
        {
            return false;
        }

        self.category.matches(task)
    }

    /// Keeps input order.
    pub fn apply(&self, tasks: &[Task]) -> Vec<Task> {
        let out: Vec<Task> = tasks
            .iter()
            .filter(|task| self.matches(task))
            .cloned()
            .collect();
        trace!(input = tasks.len(), output = out.len(), "filtered tasks");
        out
    }
}

pub fn filter_tasks(tasks: &[Task], query: &str, category: &CategoryFilter) -> Vec<Task> {
    Filter::new(query, category.clone()).apply(tasks)
}
