//! Search layer facade.
//!
//! - **[`query`]**: paged curation search over the sentence store.

pub mod query;
