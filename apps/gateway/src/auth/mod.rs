pub mod credential;
pub mod tokens;
