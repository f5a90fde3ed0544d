//! Parser for the plate data file.
//!
//! Each line describes one image:
//!
//! ```text
//! image_name num_plates x1 y1 x2 y2 x3 y3 x4 y4 num_chars [char left top width height]...
//! ```
//!
//! Fields are separated by any amount of whitespace. Tokens after the
//! declared character groups are ignored.

use crate::types::{Character, Plate, PlateCoordinates};
use failure::Fail;
use std::str::FromStr;

/// Tokens before the first character group.
pub const HEADER_FIELDS: usize = 11;

const FIELDS_PER_CHARACTER: usize = 5;

/// Why a single line could not be turned into a `Plate`.
#[derive(Debug, Clone, PartialEq, Fail)]
pub enum FormatError {
    #[fail(
        display = "too few fields: expected at least {}, found {}",
        expected, found
    )]
    TooFewFields { expected: usize, found: usize },
    #[fail(display = "non-numeric {} field: {:?}", field, value)]
    NonNumeric { field: &'static str, value: String },
    #[fail(
        display = "truncated character data: {} characters declared, {} present",
        declared, found
    )]
    TruncatedCharacters { declared: usize, found: usize },
    #[fail(display = "plate has no characters")]
    NoCharacters,
    #[fail(display = "expected 8 coordinates, found {}", found)]
    CoordinateCount { found: usize },
}

/// Parses one line. Returns `Ok(None)` for blank lines.
pub fn parse_line(line: &str) -> Result<Option<Plate>, FormatError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return Ok(None);
    }
    if parts.len() < HEADER_FIELDS {
        return Err(FormatError::TooFewFields {
            expected: HEADER_FIELDS,
            found: parts.len(),
        });
    }

    let image_name = parts[0].to_string();
    let num_plates: u32 = number(parts[1], "num_plates_in_image")?;
    let coords = parts[2..10]
        .iter()
        .map(|part| number::<i32>(part, "coordinate"))
        .collect::<Result<Vec<_>, _>>()?;
    let coordinates = PlateCoordinates::from_slice(&coords)?;
    let num_chars: usize = number(parts[10], "num_chars")?;

    let groups = &parts[HEADER_FIELDS..];
    let available = groups.len() / FIELDS_PER_CHARACTER;
    if available < num_chars {
        return Err(FormatError::TruncatedCharacters {
            declared: num_chars,
            found: available,
        });
    }

    let characters = groups
        .chunks_exact(FIELDS_PER_CHARACTER)
        .take(num_chars)
        .map(|group| {
            Ok(Character {
                char: group[0].to_string(),
                left: number(group[1], "left")?,
                top: number(group[2], "top")?,
                width: number(group[3], "width")?,
                height: number(group[4], "height")?,
            })
        })
        .collect::<Result<Vec<_>, FormatError>>()?;

    Plate::new(image_name, characters, coordinates, num_plates).map(Some)
}

fn number<T: FromStr>(value: &str, field: &'static str) -> Result<T, FormatError> {
    value.parse().map_err(|_| FormatError::NonNumeric {
        field,
        value: value.to_string(),
    })
}
