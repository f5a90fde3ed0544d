use crate::parser::FormatError;

/// A corner of the plate quadrilateral, as (x, y).
pub type Point = (i32, i32);

/// One recognized glyph and its bounding box. Positions are kept exactly as
/// they appear in the source; they are not guaranteed to be normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct Character {
    pub char: String,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Character {
    /// A single uppercase letter or digit.
    pub fn is_valid(&self) -> bool {
        let mut chars = self.char.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => c.is_alphanumeric() && (c.is_uppercase() || c.is_ascii_digit()),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlateCoordinates {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl PlateCoordinates {
    /// Builds the corners from `[x1, y1, x2, y2, x3, y3, x4, y4]`, in
    /// top-left, top-right, bottom-right, bottom-left order.
    pub fn from_slice(coords: &[i32]) -> Result<Self, FormatError> {
        match *coords {
            [x1, y1, x2, y2, x3, y3, x4, y4] => Ok(PlateCoordinates {
                top_left: (x1, y1),
                top_right: (x2, y2),
                bottom_right: (x3, y3),
                bottom_left: (x4, y4),
            }),
            _ => Err(FormatError::CoordinateCount {
                found: coords.len(),
            }),
        }
    }

    pub fn to_array(&self) -> [i32; 8] {
        [
            self.top_left.0,
            self.top_left.1,
            self.top_right.0,
            self.top_right.1,
            self.bottom_right.0,
            self.bottom_right.1,
            self.bottom_left.0,
            self.bottom_left.1,
        ]
    }
}

/// The recognition result for one image.
///
/// `characters` keep the order they were read in; `plate_number` is derived
/// from them left-to-right at construction and never changes afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Plate {
    image_name: String,
    plate_number: String,
    characters: Vec<Character>,
    coordinates: PlateCoordinates,
    num_plates_in_image: u32,
}

impl Plate {
    pub fn new(
        image_name: String,
        characters: Vec<Character>,
        coordinates: PlateCoordinates,
        num_plates_in_image: u32,
    ) -> Result<Self, FormatError> {
        let plate_number: String = sort_left_to_right(&characters)
            .iter()
            .map(|c| c.char.as_str())
            .collect();
        if characters.is_empty() || plate_number.is_empty() {
            return Err(FormatError::NoCharacters);
        }
        Ok(Plate {
            image_name,
            plate_number,
            characters,
            coordinates,
            num_plates_in_image,
        })
    }

    pub fn image_name(&self) -> &str {
        &self.image_name
    }

    pub fn plate_number(&self) -> &str {
        &self.plate_number
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn coordinates(&self) -> &PlateCoordinates {
        &self.coordinates
    }

    pub fn num_plates_in_image(&self) -> u32 {
        self.num_plates_in_image
    }

    pub fn num_characters(&self) -> usize {
        self.characters.len()
    }

    /// True when every character is valid.
    pub fn is_valid(&self) -> bool {
        self.characters.iter().all(Character::is_valid)
    }

    /// Symbols of the characters that fail validation, in file order.
    pub fn invalid_characters(&self) -> Vec<String> {
        self.characters
            .iter()
            .filter(|c| !c.is_valid())
            .map(|c| c.char.clone())
            .collect()
    }

    pub fn sorted_characters(&self) -> Vec<Character> {
        sort_left_to_right(&self.characters)
    }
}

// Stable, so characters sharing a `left` keep their file order. Adding 0.0
// turns -0.0 into 0.0 so the two compare as a tie.
fn sort_left_to_right(characters: &[Character]) -> Vec<Character> {
    let mut sorted = characters.to_vec();
    sorted.sort_by(|a, b| (a.left + 0.0).total_cmp(&(b.left + 0.0)));
    sorted
}
