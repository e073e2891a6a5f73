/// Response middleware
///
/// - `security`: security headers on every response

pub mod security;
