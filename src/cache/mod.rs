//! Range-query cache: cumulative histograms keyed by boundary index.

pub mod histogram;
pub mod range_cache;

pub use histogram::{combine_ranges, CombineError, Combined, CumulativeHistogram, IntegrityWarning};
pub use range_cache::{Lookup, LookupAll, RangeCache};
