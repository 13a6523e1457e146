//! Materialise a sweep definition into a directory tree
//!
//! A sweep directory either expands one list variable into a subdirectory per value ("sweep" node)
//! or owns runnable jobs directly ("leaf" node).

/// Record and detect whether a directory is a sweep or a leaf
pub mod node;
/// Recursive list expansion
pub mod expand;
/// Ask before overwriting a non-empty directory
pub mod confirm;
/// Keep concurrent invocations off the same sweep tree
pub mod lock;
