//! Pieces shared by the OCR pipeline and the HTTP front-ends: environment
//! configuration, the closed error taxonomy and the JSON bodies exchanged
//! with browser clients.

pub mod config;
pub mod dto;
pub mod error;
