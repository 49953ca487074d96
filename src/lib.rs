// Pedantic: suppress noise for internal crate code.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]

pub mod backend;
pub mod config;
pub mod engine;
pub mod registry;
pub mod render;
pub mod storage;
pub mod types;
pub mod util;
pub mod view;
