//! Unit tests for the model crate.
