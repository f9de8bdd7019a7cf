pub mod shell;
pub mod validate;
