//! Integration test crate for Percolate; see the `tests/` directory.
