//! This modules defines the common functionality for paging data.

use serde::Serialize;

use crate::Error;

/// The config for pagination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationConfig {
    /// The page number to default to when not specified in a request.
    pub default_page: u64,
    /// The number of items per page when not specified in a request.
    pub default_page_size: u64,
    /// The largest page size a request may ask for.
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

/// A page of items to fetch, counting pages from one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// The page number.
    pub page: u64,
    /// The number of items per page.
    pub limit: u64,
}

impl PageRequest {
    /// Fill in missing values from `config`.
    ///
    /// A `limit` larger than the maximum page size is reduced to the maximum.
    ///
    /// # Errors
    /// Returns [Error::InvalidQuery] if `page` or `limit` is zero.
    pub fn resolve(
        page: Option<u64>,
        limit: Option<u64>,
        config: &PaginationConfig,
    ) -> Result<Self, Error> {
        let page = page.unwrap_or(config.default_page);
        let limit = limit.unwrap_or(config.default_page_size);

        if page == 0 {
            return Err(Error::InvalidQuery("page must be at least 1".to_owned()));
        }

        if limit == 0 {
            return Err(Error::InvalidQuery("limit must be at least 1".to_owned()));
        }

        Ok(Self {
            page,
            limit: limit.min(config.max_page_size),
        })
    }

    /// The number of items before the first item of the page.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Describes where a page sits in the full list of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// The number of items across all pages.
    pub total: u64,
    /// The current page number.
    pub page: u64,
    /// The number of items per page.
    pub limit: u64,
    /// The number of pages needed to show every item.
    pub total_pages: u64,
}

impl Pagination {
    /// Describe `request` in a list of `total` items.
    pub fn new(total: u64, request: PageRequest) -> Self {
        Self {
            total,
            page: request.page,
            limit: request.limit,
            total_pages: total.div_ceil(request.limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        Error,
        pagination::{PageRequest, Pagination, PaginationConfig},
    };

    #[test]
    fn uses_defaults() {
        let config = PaginationConfig::default();

        let got = PageRequest::resolve(None, None, &config).unwrap();

        assert_eq!(got, PageRequest { page: 1, limit: 10 });
        assert_eq!(got.offset(), 0);
    }

    #[test]
    fn clamps_limit_to_max() {
        let config = PaginationConfig::default();

        let got = PageRequest::resolve(Some(3), Some(1000), &config).unwrap();

        assert_eq!(got, PageRequest { page: 3, limit: 100 });
        assert_eq!(got.offset(), 200);
    }

    #[test]
    fn rejects_zero_page_and_limit() {
        let config = PaginationConfig::default();

        assert!(matches!(
            PageRequest::resolve(Some(0), None, &config),
            Err(Error::InvalidQuery(_))
        ));
        assert!(matches!(
            PageRequest::resolve(None, Some(0), &config),
            Err(Error::InvalidQuery(_))
        ));
    }

    #[test]
    fn total_pages_rounds_up() {
        let request = PageRequest { page: 1, limit: 10 };

        assert_eq!(Pagination::new(0, request).total_pages, 0);
        assert_eq!(Pagination::new(10, request).total_pages, 1);
        assert_eq!(Pagination::new(11, request).total_pages, 2);
    }
}
