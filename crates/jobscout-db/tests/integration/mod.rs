pub mod common;

mod listing_tests;
mod migration_tests;
