//! Partition log integration tests
//!
//! Drives a real `SegmentWriter` and `SegmentReader` pair over a temporary
//! directory:
//!
//! - **ordering**: concurrent producers, enqueue order equals disk order
//! - **reads**: tail reads, corruption, reads across rotated segments
//! - **recovery**: reopening after clean shutdown and after torn writes
//!
//! ```bash
//! cargo test --test storage_log
//! ```

mod test_utils;

mod ordering;
mod reads;
mod recovery;
