//! Query fingerprints
//!
//! Derives a canonical cache key from the filter/sort/page parameters a list
//! view carries in its query string. Parameter sets that normalize identically
//! produce equal fingerprints, which is what makes cache hits possible.

use std::fmt;
use std::num::NonZeroU32;

use tracing::trace;

/// Filter value meaning "no filter"
const FILTER_ALL: &str = "all";

/// Separator between sort field and direction (`startDate-asc`)
const SORT_SEPARATOR: char = '-';

/// Classification label used for coarse cache invalidation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceTag {
    Bookings,
    Cabins,
}

impl ResourceTag {
    /// Table name in the remote store
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceTag::Bookings => "bookings",
            ResourceTag::Cabins => "cabins",
        }
    }
}

impl fmt::Display for ResourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// Equality filter on a single column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Filter {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// Parse a `"field-direction"` sort string
    ///
    /// Fails unless the string splits into exactly two non-empty tokens and
    /// the second one is `asc` or `desc`.
    pub fn parse(raw: &str) -> Result<Self, MalformedQueryError> {
        let malformed = || MalformedQueryError {
            raw: raw.to_string(),
        };

        let tokens: Vec<&str> = raw.split(SORT_SEPARATOR).collect();
        let [field, direction] = tokens.as_slice() else {
            return Err(malformed());
        };
        if field.is_empty() || direction.is_empty() {
            return Err(malformed());
        }

        let direction = SortDirection::parse(direction).ok_or_else(malformed)?;
        Ok(Sort::new(*field, direction))
    }
}

/// Sort string that could not be split into a field and a direction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed sort parameter '{raw}': expected \"field-direction\"")]
pub struct MalformedQueryError {
    pub raw: String,
}

/// Canonical, comparable key for one page of a filtered, sorted collection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryFingerprint {
    tag: ResourceTag,
    filter: Option<Filter>,
    sort: Sort,
    page: NonZeroU32,
}

impl QueryFingerprint {
    pub fn tag(&self) -> ResourceTag {
        self.tag
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn page(&self) -> u32 {
        self.page.get()
    }

    /// Same query, different page
    pub fn with_page(&self, page: NonZeroU32) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    /// Fingerprint of the following page
    pub fn next_page(&self) -> Option<Self> {
        self.page.checked_add(1).map(|page| self.with_page(page))
    }

    /// Fingerprint of the preceding page, None on page 1
    pub fn previous_page(&self) -> Option<Self> {
        NonZeroU32::new(self.page.get() - 1).map(|page| self.with_page(page))
    }
}

/// Raw, unvalidated list parameters as the view holds them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawQuery {
    /// Filter value, `all` or absent for no filter
    pub filter: Option<String>,
    /// `"field-direction"`
    pub sort_by: Option<String>,
    /// 1-based page number, anything unparseable counts as page 1
    pub page: Option<String>,
}

impl RawQuery {
    /// Parse the view's query string (`status=unconfirmed&sortBy=totalPrice-desc&page=2`)
    ///
    /// Unknown keys are ignored. Values are percent-decoded; a value that
    /// fails to decode is treated as absent.
    pub fn from_query_string(query: &str) -> Self {
        let mut raw = RawQuery::default();
        let query = query.strip_prefix('?').unwrap_or(query);

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = urlencoding::decode(&value.replace('+', " "))
                .map(|v| v.into_owned())
                .ok();
            match key {
                "status" => raw.filter = value,
                "sortBy" => raw.sort_by = value,
                "page" => raw.page = value,
                _ => trace!(key = key, "Ignoring unknown query parameter"),
            }
        }

        raw
    }
}

/// Builds fingerprints for one collection
///
/// Knows which column the filter applies to and which sort to use when the
/// view does not specify one.
#[derive(Debug, Clone)]
pub struct FingerprintBuilder {
    tag: ResourceTag,
    filter_field: &'static str,
    default_sort: (&'static str, SortDirection),
}

impl FingerprintBuilder {
    pub fn new(
        tag: ResourceTag,
        filter_field: &'static str,
        default_sort: (&'static str, SortDirection),
    ) -> Self {
        Self {
            tag,
            filter_field,
            default_sort,
        }
    }

    /// Builder for the bookings list: filter on `status`, oldest stay first
    pub fn bookings() -> Self {
        Self::new(
            ResourceTag::Bookings,
            "status",
            ("startDate", SortDirection::Asc),
        )
    }

    pub fn tag(&self) -> ResourceTag {
        self.tag
    }

    /// Normalize raw parameters into a fingerprint
    pub fn build(&self, raw: &RawQuery) -> Result<QueryFingerprint, MalformedQueryError> {
        let filter = raw
            .filter
            .as_deref()
            .filter(|value| !value.is_empty() && *value != FILTER_ALL)
            .map(|value| Filter {
                field: self.filter_field.to_string(),
                value: value.to_string(),
            });

        let sort = match raw.sort_by.as_deref() {
            Some(sort_by) if !sort_by.is_empty() => Sort::parse(sort_by)?,
            _ => Sort::new(self.default_sort.0, self.default_sort.1),
        };

        let page = raw
            .page
            .as_deref()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .and_then(NonZeroU32::new)
            .unwrap_or(NonZeroU32::MIN);

        Ok(QueryFingerprint {
            tag: self.tag,
            filter,
            sort,
            page,
        })
    }
}
