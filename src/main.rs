use env_logger::Env;
use failure::Error;
use log::{error, info};
use plate_ocr::config::{Backend, Config};
use plate_ocr::db::SqliteRepository;
use plate_ocr::{api, DatFileRepository, PlateIndex, PlateRepository, RecognitionService};
use std::process;
use std::sync::Arc;

fn open_repository(config: &Config) -> Result<Arc<dyn PlateRepository>, Error> {
    match config.backend {
        Backend::DatFile => Ok(Arc::new(DatFileRepository::open(&config.plates_path)?)),
        Backend::Sqlite => {
            let repository = SqliteRepository::open(&config.database_path)?;
            if config.import_on_start {
                let index = PlateIndex::load(&config.plates_path)?;
                repository.import(index.plates().iter().map(|p| &**p))?;
            }
            Ok(Arc::new(repository))
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    info!("Starting plate-ocr");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };
    // Build the index before serving so no request waits on the parse.
    let service = match open_repository(&config).and_then(|repository| {
        let service = RecognitionService::new(repository);
        service.warm_up()?;
        Ok(service)
    }) {
        Ok(service) => service,
        Err(e) => {
            error!("Unable to load plates: {}", e);
            process::exit(1);
        }
    };

    api::run(Arc::new(service), config.image_base_url, config.listen).await;
    info!("Exiting main");
}
