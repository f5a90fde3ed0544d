use crate::parser::{self, FormatError};
use crate::types::Plate;
use failure::Fail;
use log::{debug, info};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Fail)]
pub enum IndexError {
    #[fail(display = "plate source {} is unavailable: {}", path, cause)]
    SourceUnavailable {
        path: String,
        #[fail(cause)]
        cause: io::Error,
    },
    #[fail(display = "plate database error: {}", cause)]
    Database {
        #[fail(cause)]
        cause: rusqlite::Error,
    },
    #[fail(display = "stored plate for {} is invalid: {}", image_name, cause)]
    InvalidRecord {
        image_name: String,
        #[fail(cause)]
        cause: FormatError,
    },
    #[fail(display = "repository lock was poisoned")]
    LockPoisoned,
}

impl IndexError {
    fn unavailable(path: &Path, cause: io::Error) -> Self {
        IndexError::SourceUnavailable {
            path: path.display().to_string(),
            cause,
        }
    }
}

/// Anything that can serve plates by image name.
pub trait PlateRepository: Send + Sync {
    /// Makes sure the backing data is ready. Calling it again is a no-op.
    fn load(&self) -> Result<(), IndexError>;

    fn get(&self, image_name: &str) -> Result<Option<Arc<Plate>>, IndexError>;

    fn all(&self) -> Result<Vec<Arc<Plate>>, IndexError>;

    fn exists(&self, image_name: &str) -> Result<bool, IndexError>;
}

/// An immutable map from image name to plate.
///
/// Records keep the position of the first line that introduced their image
/// name; a later line with the same name replaces the record in place.
#[derive(Debug, Default)]
pub struct PlateIndex {
    plates: Vec<Arc<Plate>>,
    by_name: HashMap<String, usize>,
}

impl PlateIndex {
    /// Reads and parses the whole file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref();
        info!("Loading plates from {}", path.display());
        let file = File::open(path).map_err(|e| IndexError::unavailable(path, e))?;
        Self::from_reader(BufReader::new(file)).map_err(|e| IndexError::unavailable(path, e))
    }

    /// Parses every line, dropping the ones that are malformed. Only a failure
    /// to read the source is an error.
    pub fn from_reader<R: BufRead>(reader: R) -> io::Result<Self> {
        let mut index = PlateIndex::default();
        let mut skipped = 0;
        for (number, line) in reader.lines().enumerate() {
            match parser::parse_line(&line?) {
                Ok(Some(plate)) => index.insert(plate),
                Ok(None) => {}
                Err(e) => {
                    debug!("Skipping line {}: {}", number + 1, e);
                    skipped += 1;
                }
            }
        }
        info!("Loaded {} plates, skipped {} lines", index.len(), skipped);
        Ok(index)
    }

    fn insert(&mut self, plate: Plate) {
        let plate = Arc::new(plate);
        match self.by_name.get(plate.image_name()) {
            Some(&slot) => self.plates[slot] = plate,
            None => {
                self.by_name
                    .insert(plate.image_name().to_string(), self.plates.len());
                self.plates.push(plate);
            }
        }
    }

    pub fn get(&self, image_name: &str) -> Option<&Arc<Plate>> {
        self.by_name.get(image_name).map(|&slot| &self.plates[slot])
    }

    pub fn contains(&self, image_name: &str) -> bool {
        self.by_name.contains_key(image_name)
    }

    pub fn plates(&self) -> &[Arc<Plate>] {
        &self.plates
    }

    pub fn len(&self) -> usize {
        self.plates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plates.is_empty()
    }
}

impl PlateRepository for PlateIndex {
    fn load(&self) -> Result<(), IndexError> {
        Ok(())
    }

    fn get(&self, image_name: &str) -> Result<Option<Arc<Plate>>, IndexError> {
        Ok(PlateIndex::get(self, image_name).cloned())
    }

    fn all(&self) -> Result<Vec<Arc<Plate>>, IndexError> {
        Ok(self.plates.clone())
    }

    fn exists(&self, image_name: &str) -> Result<bool, IndexError> {
        Ok(self.contains(image_name))
    }
}

/// Serves plates from a data file, parsed on first use.
///
/// The parse runs once even when many threads ask at the same time; the
/// others wait for it to finish. Readers never see a partially built index.
pub struct DatFileRepository {
    path: PathBuf,
    index: OnceCell<PlateIndex>,
    loader: fn(&Path) -> Result<PlateIndex, IndexError>,
}

impl DatFileRepository {
    /// Fails straight away if the file is missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, IndexError> {
        let path = path.into();
        if !path.is_file() {
            return Err(IndexError::unavailable(
                &path,
                io::Error::new(io::ErrorKind::NotFound, "no such file"),
            ));
        }
        Ok(Self::with_loader(path, |path: &Path| PlateIndex::load(path)))
    }

    fn with_loader(path: PathBuf, loader: fn(&Path) -> Result<PlateIndex, IndexError>) -> Self {
        DatFileRepository {
            path,
            index: OnceCell::new(),
            loader,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> Result<&PlateIndex, IndexError> {
        self.index.get_or_try_init(|| (self.loader)(&self.path))
    }
}

impl PlateRepository for DatFileRepository {
    fn load(&self) -> Result<(), IndexError> {
        self.index().map(|_| ())
    }

    fn get(&self, image_name: &str) -> Result<Option<Arc<Plate>>, IndexError> {
        Ok(self.index()?.get(image_name).cloned())
    }

    fn all(&self) -> Result<Vec<Arc<Plate>>, IndexError> {
        Ok(self.index()?.plates().to_vec())
    }

    fn exists(&self, image_name: &str) -> Result<bool, IndexError> {
        Ok(self.index()?.contains(image_name))
    }
}
