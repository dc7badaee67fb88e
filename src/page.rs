use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;

/// Column a listing is ordered by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Name,
    #[default]
    CreatedAt,
    UpdatedAt,
    Size,
    DownloadsCount,
}

impl SortField {
    /// Unknown or missing keys fall back to [`SortField::CreatedAt`] instead of failing.
    /// Callers rely on this, keep it lenient.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };

        let key: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();

        match key.as_str() {
            "name" | "version" => Self::Name,
            "createdat" | "created" => Self::CreatedAt,
            "updatedat" | "lastmodified" | "modifiedat" => Self::UpdatedAt,
            "size" => Self::Size,
            "downloadscount" | "downloadcount" => Self::DownloadsCount,
            _ => Self::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw {
            Some(raw) if raw.trim().eq_ignore_ascii_case("asc") => Self::Asc,
            _ => Self::Desc,
        }
    }

    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortParams {
    pub field: SortField,
    pub order: SortOrder,
}

impl SortParams {
    pub fn new(field: Option<&str>, order: Option<&str>) -> Self {
        Self {
            field: SortField::parse_lenient(field),
            order: SortOrder::parse_lenient(order),
        }
    }
}

/// Page request as it arrives from a caller, before defaults and clamping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub size: Option<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page_index: u64,
    pub page_size: u64,
}

impl PageRequest {
    pub fn new(params: PageParams, config: &PaginationConfig) -> Self {
        let page_size = match params.size {
            Some(size) if size > 0 => (size as u64).min(config.max_page_size),
            _ => config.default_page_size,
        }
        .max(1);

        let page_index = params.page.filter(|page| *page > 0).unwrap_or(0) as u64;

        Self {
            page_index,
            page_size,
        }
    }

    pub fn offset(&self) -> u64 {
        self.page_index.saturating_mul(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        self.page_size
    }
}

/// Listing envelope shared by every ecosystem.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub item_count: u64,
    pub page_count: u64,
    pub page_index: u64,
    pub page_size: u64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(request: PageRequest, item_count: u64, items: Vec<T>) -> Self {
        Self {
            item_count,
            page_count: item_count.div_ceil(request.page_size),
            page_index: request.page_index,
            page_size: request.page_size,
            items,
        }
    }
}
