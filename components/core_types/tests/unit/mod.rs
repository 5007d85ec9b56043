//! Unit test runner for core_types

mod test_error;
mod test_types;
