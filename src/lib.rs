pub mod commands;
pub mod env_block;
pub mod error;
pub mod migrate;
pub mod paths;
pub mod probe;
pub mod shell;
pub mod store;
pub mod sync;
pub mod ui;

#[cfg(test)]
pub mod test_utils;
