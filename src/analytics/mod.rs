//! Multi-dimensional event aggregation.
//!
//! Each slug owns one aggregate bundle of dimension dictionaries and scalar
//! counters. An inbound event is folded into the bundle in memory and the
//! whole bundle is written back as one unit; see DESIGN.md for the accepted
//! lost-update race under concurrent same-slug load.

pub mod aggregate;
pub mod recorder;

pub use aggregate::{FileAnalytics, LinkAnalytics};
pub use recorder::{record_file_download, record_file_view, record_link_event};
