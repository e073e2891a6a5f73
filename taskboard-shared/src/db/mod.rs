/// Database layer for Taskboard
///
/// - `pool`: PostgreSQL connection pool with a startup health check
/// - `migrations`: Embedded schema migrations
///
/// Query code lives on the models in [`crate::models`]; the trait-facing
/// backend is [`crate::store::postgres::PgStore`].

pub mod migrations;
pub mod pool;
