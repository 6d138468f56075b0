use std::str::FromStr;
use log::{error, info, warn};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Build, Orbit, Rocket};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use crate::booking::BookingService;
use crate::config::AppConfig;
use crate::query::QueryService;
use crate::seed::seed_demo_classes;
use crate::storage::Storage;

static MIGRATOR: Migrator = sqlx::migrate!("db/migrations");

/// Opens the pool for `database_url`, creating the file if needed, and
/// applies pending migrations.
pub async fn open_pool(database_url: &str) -> Result<SqlitePool, anyhow::Error> {
    let in_memory = database_url.contains(":memory:");
    let opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let (opts, pool_options) = if in_memory {
        // every connection would get its own empty in-memory database
        (opts, SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None))
    } else {
        (opts.journal_mode(SqliteJournalMode::Wal), SqlitePoolOptions::new().max_connections(5))
    };
    let pool = pool_options.connect_with(opts).await?;
    MIGRATOR.run(&pool).await?;
    Ok(pool)
}

/// Opens the database at ignition and puts the storage and the services built
/// on top of it into managed state.
pub struct DbFairing();

#[rocket::async_trait]
impl Fairing for DbFairing {
    fn info(&self) -> Info {
        Info {
            name: "SQLite Database Pool with Migrations",
            kind: Kind::Ignite | Kind::Shutdown,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let cfg = match AppConfig::from_figment(rocket.figment()) {
            Ok(cfg) => cfg,
            Err(err) => {
                error!("Configuration error: {err}");
                return Err(rocket);
            }
        };
        let offset = match cfg.display_offset() {
            Ok(offset) => offset,
            Err(err) => {
                error!("Configuration error: {err}");
                return Err(rocket);
            }
        };
        info!("Opening database: {}", cfg.database_url);
        let pool = match open_pool(&cfg.database_url).await {
            Ok(pool) => pool,
            Err(err) => {
                error!("Database initialization error: {:?}", err);
                return Err(rocket);
            }
        };
        info!("Migrations applied successfully!");
        info!("Display offset: {}", offset.0);

        let storage = Storage::new(pool);
        if cfg.seed_demo_classes {
            match seed_demo_classes(&storage, &offset).await {
                Ok(n) => info!("Created {n} demo classes"),
                Err(err) => warn!("Creating demo classes failed: {err}"),
            }
        }
        let bookings = BookingService::new(storage.clone());
        let queries = QueryService::new(storage.clone(), &cfg);
        Ok(rocket
            .manage(cfg)
            .manage(offset)
            .manage(storage)
            .manage(bookings)
            .manage(queries))
    }

    async fn on_shutdown(&self, rocket: &Rocket<Orbit>) {
        if let Some(storage) = rocket.state::<Storage>() {
            info!("Closing database pool");
            storage.close().await;
        }
    }
}
