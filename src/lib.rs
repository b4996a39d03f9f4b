//! A content-addressed segment cache for a multidimensional OLAP query
//! engine.
//!
//! Segments are rectangular slices of a star schema's fact table, keyed by
//! their provenance (schema/cube/measure/fact table), the set of columns
//! they constrain, and a [`bitkey::BitKey`] recording which dimensions
//! participate. A [`SegmentCacheIndex`] answers three queries over that key
//! space — exact match, region-flush intersection, and rollup-candidate
//! search — while a [`CacheManager`] actor serializes every index mutation
//! and every call into an external [`CacheProvider`] onto one dedicated
//! thread.

#![allow(dead_code)]

pub mod aggregator;
pub mod async_result;
pub mod bitkey;
pub mod cache_manager;
pub mod cache_provider;
pub mod config;
pub mod error;
pub mod index;
pub mod poset;
pub mod rollup;
pub mod segment;
pub mod segment_axis;
pub mod segment_body;
pub mod segment_cell_key;
pub mod segment_column;
pub mod segment_header;
pub mod value;

pub use aggregator::Aggregator;
pub use async_result::{AsyncResult, AsyncResultSender};
pub use bitkey::BitKey;
pub use cache_manager::{CacheManager, CacheManagerHandle, ManagerCommand, ManagerEvent};
pub use cache_provider::{CacheListener, CacheProvider, MemoryCacheProvider, SegmentCacheEvent, SegmentCacheEventType};
pub use config::CacheConfig;
pub use error::{CacheError, CacheErrorKind};
pub use index::{LocateRequest, RollupCandidate, SegmentCacheIndex};
pub use poset::PartiallyOrderedSet;
pub use rollup::SegmentBuilder;
pub use segment::{Segment, SegmentDataset, SegmentWithData, StarColumnPredicate};
pub use segment_axis::SegmentAxis;
pub use segment_body::SegmentBody;
pub use segment_cell_key::SegmentCellKey;
pub use segment_column::{ColumnValues, SegmentColumn};
pub use segment_header::{Provenance, SegmentHeader};
pub use value::Value;
