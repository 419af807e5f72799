//! CLI command handlers

pub mod commands;

pub use commands::{
    create, delete, exists, get, init, keygen, parse_assignment, read, search, tail, update,
};
