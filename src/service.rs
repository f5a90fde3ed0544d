use crate::index::{IndexError, PlateRepository};
use crate::types::Plate;
use failure::Fail;
use log::warn;
use std::sync::Arc;

/// A plate was found but contains characters that are not uppercase letters
/// or digits.
#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(
    display = "plate for {} has invalid characters: {:?}; only uppercase letters and digits are allowed",
    image_name, invalid_characters
)]
pub struct ValidationError {
    pub image_name: String,
    pub invalid_characters: Vec<String>,
}

#[derive(Debug, Fail)]
pub enum RecognizeError {
    #[fail(display = "{}", _0)]
    Invalid(#[fail(cause)] ValidationError),
    #[fail(display = "{}", _0)]
    Index(#[fail(cause)] IndexError),
}

impl From<ValidationError> for RecognizeError {
    fn from(e: ValidationError) -> Self {
        RecognizeError::Invalid(e)
    }
}

impl From<IndexError> for RecognizeError {
    fn from(e: IndexError) -> Self {
        RecognizeError::Index(e)
    }
}

/// Read API over a plate repository.
///
/// An unknown image is `Ok(None)`; a known image with invalid characters is
/// `Err(RecognizeError::Invalid)`. Presence checks and listings ignore
/// validity.
#[derive(Clone)]
pub struct RecognitionService {
    repository: Arc<dyn PlateRepository>,
}

impl RecognitionService {
    pub fn new(repository: Arc<dyn PlateRepository>) -> Self {
        RecognitionService { repository }
    }

    /// Builds the underlying index now rather than on the first request.
    pub fn warm_up(&self) -> Result<(), IndexError> {
        self.repository.load()
    }

    pub fn recognize(&self, image_name: &str) -> Result<Option<Arc<Plate>>, RecognizeError> {
        let plate = match self.repository.get(image_name)? {
            Some(plate) => plate,
            None => return Ok(None),
        };
        if !plate.is_valid() {
            let e = ValidationError {
                image_name: image_name.to_string(),
                invalid_characters: plate.invalid_characters(),
            };
            warn!("{}", e);
            return Err(e.into());
        }
        Ok(Some(plate))
    }

    pub fn plate_number_only(&self, image_name: &str) -> Result<Option<String>, RecognizeError> {
        Ok(self
            .recognize(image_name)?
            .map(|plate| plate.plate_number().to_string()))
    }

    pub fn exists(&self, image_name: &str) -> Result<bool, IndexError> {
        self.repository.exists(image_name)
    }

    pub fn all_plates(&self) -> Result<Vec<Arc<Plate>>, IndexError> {
        self.repository.all()
    }
}
