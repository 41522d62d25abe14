// src/lib.rs

//! Schedule of Classes catalog crawler library.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
