use std::env;

#[derive(Debug)]
pub struct Config {
    pub port: u16,
    pub mongodb_uri: String,
    pub mongodb_db: String,
    pub access_token_secret: String,
}

impl Config {
    pub fn from_env() -> Config {
        Config {
            port: env::var("PORT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(4000),
            mongodb_uri: env::var("MONGODB_URI").expect("MONGODB_URI must be set"),
            mongodb_db: env::var("MONGODB_DB").unwrap_or_else(|_| String::from("vistaMart")),
            access_token_secret: env::var("ACCESS_TOKEN_SECRET")
                .expect("ACCESS_TOKEN_SECRET must be set"),
        }
    }
}
