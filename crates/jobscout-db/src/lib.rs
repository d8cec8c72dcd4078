pub mod database;
pub mod migrations;
pub mod repository;

pub use database::Database;
pub use repository::ListingRepository;
