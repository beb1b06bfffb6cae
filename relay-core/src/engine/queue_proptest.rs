//! Property-based tests for queue ordering
//!
//! Random priority sequences must always come out sorted by priority, with
//! equal priorities in the order they went in.
