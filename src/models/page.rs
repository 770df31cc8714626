//! Paging and sorting of query results.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

/// One sort criterion over the fields `F` of a queried record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder<F> {
    pub field: F,
    pub direction: Direction,
}

impl<F> SortOrder<F> {
    pub fn asc(field: F) -> Self {
        Self {
            field,
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: F) -> Self {
        Self {
            field,
            direction: Direction::Desc,
        }
    }
}

/// Page request. Pages are numbered from 0; `size: None` means unpaged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pageable<F> {
    pub page: u32,
    pub size: Option<u32>,
    #[serde(default = "Vec::new")]
    pub sort: Vec<SortOrder<F>>,
}

impl<F> Pageable<F> {
    pub fn of(page: u32, size: u32) -> Self {
        Self {
            page,
            size: Some(size),
            sort: Vec::new(),
        }
    }

    pub fn unpaged() -> Self {
        Self {
            page: 0,
            size: None,
            sort: Vec::new(),
        }
    }

    pub fn with_sort(self, sort: Vec<SortOrder<F>>) -> Self {
        Self { sort, ..self }
    }

    pub fn is_unsorted(&self) -> bool {
        self.sort.is_empty()
    }

    /// Number of records to skip.
    pub fn offset(&self) -> usize {
        match self.size {
            Some(size) => self.page as usize * size as usize,
            None => 0,
        }
    }
}

/// A page of results with its paging metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u32,
    /// Requested size; equal to `total_elements` when unpaged
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Wrap one page of records out of `total` matching records.
    pub fn new<F>(content: Vec<T>, pageable: &Pageable<F>, total: u64) -> Self {
        let size = pageable.size.unwrap_or(total as u32);
        let total_pages = if total == 0 || size == 0 {
            0
        } else {
            total.div_ceil(u64::from(size)) as u32
        };

        Page {
            content,
            page: pageable.page,
            size,
            total_elements: total,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
        }
    }
}
