//! Integration tests for the disclosure merging toolkit

mod combine_split;
mod merge_scenarios;
mod packager_output;
mod stream_detection;
mod test_utils;
mod upgrade_scenarios;
