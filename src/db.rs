use crate::index::{IndexError, PlateRepository};
use crate::parser::FormatError;
use crate::types::{Character, Plate, PlateCoordinates};
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension, NO_PARAMS};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

impl From<rusqlite::Error> for IndexError {
    fn from(cause: rusqlite::Error) -> Self {
        IndexError::Database { cause }
    }
}

/// Plates stored in SQLite, one row per plate plus one per character.
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, IndexError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, IndexError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS plate (image_name TEXT NOT NULL PRIMARY KEY, num_plates INTEGER NOT NULL, x1 INTEGER NOT NULL, y1 INTEGER NOT NULL, x2 INTEGER NOT NULL, y2 INTEGER NOT NULL, x3 INTEGER NOT NULL, y3 INTEGER NOT NULL, x4 INTEGER NOT NULL, y4 INTEGER NOT NULL) WITHOUT ROWID",
            NO_PARAMS,
        )?;
        conn.execute("CREATE TABLE IF NOT EXISTS character (image_name TEXT NOT NULL, position INTEGER NOT NULL, symbol TEXT NOT NULL, left_pos REAL NOT NULL, top_pos REAL NOT NULL, width REAL NOT NULL, height REAL NOT NULL, PRIMARY KEY(image_name, position), FOREIGN KEY(image_name) REFERENCES plate(image_name))", NO_PARAMS)?;
        Ok(SqliteRepository {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, IndexError> {
        self.conn.lock().map_err(|_| IndexError::LockPoisoned)
    }

    /// Inserts or replaces the given plates in one transaction; returns how
    /// many were written.
    pub fn import<'a, I>(&self, plates: I) -> Result<usize, IndexError>
    where
        I: IntoIterator<Item = &'a Plate>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut count = 0;
        for plate in plates {
            let c = plate.coordinates().to_array();
            tx.execute(
                "DELETE FROM character WHERE image_name = ?1",
                &[plate.image_name()],
            )?;
            tx.execute(
                "INSERT OR REPLACE INTO plate(image_name, num_plates, x1, y1, x2, y2, x3, y3, x4, y4) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    plate.image_name(),
                    plate.num_plates_in_image(),
                    c[0],
                    c[1],
                    c[2],
                    c[3],
                    c[4],
                    c[5],
                    c[6],
                    c[7]
                ],
            )?;
            for (position, character) in plate.characters().iter().enumerate() {
                tx.execute(
                    "INSERT INTO character(image_name, position, symbol, left_pos, top_pos, width, height) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        plate.image_name(),
                        position as i64,
                        character.char,
                        character.left,
                        character.top,
                        character.width,
                        character.height
                    ],
                )?;
            }
            count += 1;
        }
        tx.commit()?;
        info!("Imported {} plates into database", count);
        Ok(count)
    }

    pub fn count(&self) -> Result<usize, IndexError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM plate", NO_PARAMS, |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn read_plate(conn: &Connection, image_name: &str) -> Result<Option<Plate>, IndexError> {
    let header = conn
        .query_row(
            "SELECT num_plates, x1, y1, x2, y2, x3, y3, x4, y4 FROM plate WHERE image_name = ?1",
            &[image_name],
            |row| {
                let mut coords = [0i32; 8];
                for (i, coord) in coords.iter_mut().enumerate() {
                    *coord = row.get(i + 1)?;
                }
                Ok((row.get::<_, u32>(0)?, coords))
            },
        )
        .optional()?;
    let (num_plates, coords) = match header {
        Some(header) => header,
        None => return Ok(None),
    };

    let mut stmt = conn.prepare(
        "SELECT symbol, left_pos, top_pos, width, height FROM character WHERE image_name = ?1 ORDER BY position",
    )?;
    let characters = stmt
        .query_map(&[image_name], |row| {
            Ok(Character {
                char: row.get(0)?,
                left: row.get(1)?,
                top: row.get(2)?,
                width: row.get(3)?,
                height: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    PlateRow {
        image_name: image_name.to_string(),
        num_plates,
        coords,
        characters,
    }
    .into_plate()
    .map(Some)
}

/// Columns of one plate as read back from the database.
struct PlateRow {
    image_name: String,
    num_plates: u32,
    coords: [i32; 8],
    characters: Vec<Character>,
}

impl PlateRow {
    fn into_plate(self) -> Result<Plate, IndexError> {
        let image_name = self.image_name;
        let invalid = |cause: FormatError| {
            error!("Unable to read plate '{}': {}", image_name, cause);
            IndexError::InvalidRecord {
                image_name: image_name.clone(),
                cause,
            }
        };
        let coordinates = PlateCoordinates::from_slice(&self.coords).map_err(&invalid)?;
        Plate::new(image_name.clone(), self.characters, coordinates, self.num_plates)
            .map_err(&invalid)
    }
}

impl PlateRepository for SqliteRepository {
    fn load(&self) -> Result<(), IndexError> {
        let count = self.count()?;
        info!("Plate database holds {} plates", count);
        Ok(())
    }

    fn get(&self, image_name: &str) -> Result<Option<Arc<Plate>>, IndexError> {
        let conn = self.conn()?;
        Ok(read_plate(&conn, image_name)?.map(Arc::new))
    }

    fn all(&self) -> Result<Vec<Arc<Plate>>, IndexError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT p.image_name, p.num_plates, p.x1, p.y1, p.x2, p.y2, p.x3, p.y3, p.x4, p.y4, c.symbol, c.left_pos, c.top_pos, c.width, c.height FROM plate p LEFT JOIN character c ON c.image_name = p.image_name ORDER BY p.image_name, c.position",
        )?;
        let mut rows = stmt.query(NO_PARAMS)?;
        let mut plates = Vec::new();
        let mut pending: Option<PlateRow> = None;
        while let Some(row) = rows.next()? {
            let image_name: String = row.get(0)?;
            if pending.as_ref().map(|p| p.image_name != image_name).unwrap_or(true) {
                if let Some(done) = pending.take() {
                    plates.push(Arc::new(done.into_plate()?));
                }
                let mut coords = [0i32; 8];
                for (i, coord) in coords.iter_mut().enumerate() {
                    *coord = row.get(i + 2)?;
                }
                pending = Some(PlateRow {
                    image_name,
                    num_plates: row.get(1)?,
                    coords,
                    characters: Vec::new(),
                });
            }
            let symbol: Option<String> = row.get(10)?;
            if let (Some(symbol), Some(plate)) = (symbol, pending.as_mut()) {
                plate.characters.push(Character {
                    char: symbol,
                    left: row.get(11)?,
                    top: row.get(12)?,
                    width: row.get(13)?,
                    height: row.get(14)?,
                });
            }
        }
        if let Some(done) = pending {
            plates.push(Arc::new(done.into_plate()?));
        }
        Ok(plates)
    }

    fn exists(&self, image_name: &str) -> Result<bool, IndexError> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM plate WHERE image_name = ?1",
                &[image_name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
