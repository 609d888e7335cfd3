//! Binary protocol integration tests
//!
//! - **codec**: header layout and response encoding, byte for byte
//! - **produce**: producer connections appending to a real partition log
//!
//! ```bash
//! cargo test --test wire_protocol
//! ```

mod codec;
mod produce;
