pub mod collection_queries;

pub use collection_queries::PgRepository;
