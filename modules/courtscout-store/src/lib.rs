pub mod courts;
pub mod migrate;
pub mod search_areas;

pub use courts::PgCourtStore;
pub use migrate::migrate;
pub use search_areas::PgSearchAreaStore;
