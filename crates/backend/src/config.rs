use std::time::Duration;

use envconfig::Envconfig;

#[derive(Envconfig)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3000")]
    pub port: u16,

    #[envconfig(from = "DB_PATH", default = "data/geocode.redb")]
    pub db_path: String,

    #[envconfig(from = "DIRECTORY_BASE_URL")]
    pub directory_base_url: String,

    #[envconfig(from = "DIRECTORY_ACCESS_TOKEN")]
    pub directory_access_token: String,

    #[envconfig(
        from = "GEOCODER_URL",
        default = "https://maps.googleapis.com/maps/api/geocode/json"
    )]
    pub geocoder_url: String,

    #[envconfig(from = "GEOCODER_API_KEY")]
    pub geocoder_api_key: Option<String>,

    #[envconfig(from = "PAGE_SIZE", default = "200")]
    pub page_size: u32,

    #[envconfig(from = "HTTP_TIMEOUT_SECS", default = "10")]
    pub http_timeout_secs: u64,

    #[envconfig(from = "DIST_DIR", default = "dist")]
    pub dist_dir: String,
}

impl Config {
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
