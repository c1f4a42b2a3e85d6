// notypdf-common: shared types and utilities for the NotyPDF backend

pub mod path;
pub mod types;
