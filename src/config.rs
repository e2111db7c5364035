use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,

    pub claude_api_key: String,
    pub claude_model: String,

    pub spotify_client_id: String,
    pub spotify_client_secret: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .expect("PORT must be a number"),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),

            // Empty key = AI features degrade to their fallbacks
            claude_api_key: env::var("CLAUDE_API_KEY").unwrap_or_else(|_| String::new()),
            claude_model: env::var("CLAUDE_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".into()),

            // Empty credentials = playlist analysis by URL is unavailable
            spotify_client_id: env::var("SPOTIFY_CLIENT_ID").unwrap_or_else(|_| String::new()),
            spotify_client_secret: env::var("SPOTIFY_CLIENT_SECRET")
                .unwrap_or_else(|_| String::new()),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
