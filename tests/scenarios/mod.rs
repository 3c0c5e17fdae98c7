//! Scenario-based tests for membatch

mod composition;
mod end_to_end;
mod failure_isolation;
mod index_mode;
mod skip_complete;
