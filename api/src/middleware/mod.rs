pub mod cors;
pub mod error_translator;
pub mod refresh_cookie;
