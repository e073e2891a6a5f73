/// Redis integration
///
/// Redis backs two concerns: the session store
/// ([`crate::session::redis_store`]) and cross-instance board change
/// broadcast ([`crate::events::redis`]). Both share the
/// [`RedisClient`] connection manager defined here.

pub mod client;

pub use client::{RedisClient, RedisClientError, RedisConfig};
