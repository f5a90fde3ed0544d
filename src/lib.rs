//! License plate recognition results served from a pre-computed data file.
//!
//! The data file is parsed once into an immutable index keyed by image name;
//! `RecognitionService` answers lookups on top of any `PlateRepository`.

#[macro_use]
extern crate failure;

pub mod api;
pub mod config;
pub mod db;
pub mod index;
pub mod parser;
pub mod service;
pub mod types;

pub use index::{DatFileRepository, IndexError, PlateIndex, PlateRepository};
pub use parser::FormatError;
pub use service::{RecognitionService, RecognizeError, ValidationError};
pub use types::{Character, Plate, PlateCoordinates};
