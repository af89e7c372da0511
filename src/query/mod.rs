//! Query parameters, fingerprints and page arithmetic for list views

pub mod fingerprint;
pub mod pagination;

pub use fingerprint::{
    Filter, FingerprintBuilder, MalformedQueryError, QueryFingerprint, RawQuery, ResourceTag,
    Sort, SortDirection,
};
pub use pagination::{page_count, row_range, Pagination, PAGE_SIZE};
