//! Core utilities shared by every settlement operation

pub mod time;
