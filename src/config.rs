use rocket::figment::Figment;
use serde::Deserialize;
use crate::studiotime::{DisplayOffset, IST_OFFSET};

/// Application settings, read from the same figment as Rocket's own
/// configuration (`Rocket.toml`, `ROCKET_*` environment variables).
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub app_name: String,
    pub database_url: String,
    pub display_offset: String,
    pub default_page_limit: i64,
    pub max_page_limit: i64,
    pub seed_demo_classes: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "Fitness Studio Booking API".to_string(),
            database_url: "sqlite://fitness_booking.db".to_string(),
            display_offset: IST_OFFSET.to_string(),
            default_page_limit: 10,
            max_page_limit: 100,
            seed_demo_classes: false,
        }
    }
}

impl AppConfig {
    pub fn from_figment(figment: &Figment) -> Result<Self, anyhow::Error> {
        let cfg: AppConfig = figment.extract()?;
        anyhow::ensure!(cfg.max_page_limit >= 1, "max_page_limit must be positive");
        anyhow::ensure!((1..=cfg.max_page_limit).contains(&cfg.default_page_limit),
            "default_page_limit must be between 1 and max_page_limit");
        Ok(cfg)
    }
    pub fn display_offset(&self) -> Result<DisplayOffset, anyhow::Error> {
        DisplayOffset::parse(&self.display_offset)
    }
}
