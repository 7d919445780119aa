pub mod auth;
pub mod debounce;
