// src/lib.rs — Library root for PathMentor

pub mod cli;
pub mod infra;
pub mod mentor;
pub mod provider;
pub mod store;
pub mod util;
