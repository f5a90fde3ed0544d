use failure::Error;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    DatFile,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub plates_path: PathBuf,
    pub backend: Backend,
    pub database_path: PathBuf,
    pub import_on_start: bool,
    pub listen: SocketAddr,
    /// Prefix of hosted plate images, e.g. `https://cdn.example.com/plates/`.
    pub image_base_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Config, Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("PLATES_BACKEND").as_deref() {
            None | Some("file") => Backend::DatFile,
            Some("sqlite") => Backend::Sqlite,
            Some(other) => return Err(format_err!("Unknown PLATES_BACKEND '{}'", other)),
        };
        let listen = lookup("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:8402".to_string());
        let listen: SocketAddr = listen
            .parse()
            .map_err(|_| format_err!("Invalid LISTEN_ADDR '{}'", listen))?;
        Ok(Config {
            plates_path: lookup("PLATES_DAT")
                .unwrap_or_else(|| "assets/plates.dat".to_string())
                .into(),
            backend,
            database_path: lookup("PLATES_DB")
                .unwrap_or_else(|| "/data/plates.db".to_string())
                .into(),
            import_on_start: matches!(
                lookup("PLATES_IMPORT").as_deref(),
                Some("1") | Some("true")
            ),
            listen,
            image_base_url: lookup("PLATES_URL").filter(|url| !url.is_empty()),
        })
    }
}
