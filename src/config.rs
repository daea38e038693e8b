use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Where outgoing e-mail goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MailTransport {
    /// Send directly over SMTP.
    Smtp,
    /// Write to the `mail` collection and let an external sender pick it up.
    Outbox,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub mongo_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub bind_address: String,
    pub frontend_origin: String,
    pub institution_domain: String,
    pub mail_transport: MailTransport,
    pub mail_from: String,
    pub smtp_host: String,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mail_transport = match env::var("MAIL_TRANSPORT")
            .unwrap_or_else(|_| "outbox".to_string())
            .to_lowercase()
            .as_str()
        {
            "smtp" => MailTransport::Smtp,
            "outbox" => MailTransport::Outbox,
            other => {
                return Err(ConfigError::Invalid {
                    name: "MAIL_TRANSPORT",
                    value: other.to_string(),
                })
            }
        };

        let config = Self {
            mongo_uri: env::var("MONGO_URI").map_err(|_| ConfigError::Missing("MONGO_URI"))?,
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| "ideahive".to_string()),
            jwt_secret: env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            frontend_origin: env::var("FRONTEND_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            institution_domain: env::var("INSTITUTION_DOMAIN")
                .unwrap_or_else(|_| "@pes.edu".to_string()),
            mail_transport,
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "IdeaHive <no-reply@ideahive.com>".to_string()),
            smtp_host: env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string()),
            smtp_user: env::var("EMAIL_USER").ok(),
            smtp_pass: env::var("EMAIL_PASS").ok(),
        };

        if config.mail_transport == MailTransport::Smtp
            && (config.smtp_user.is_none() || config.smtp_pass.is_none())
        {
            return Err(ConfigError::Missing("EMAIL_USER/EMAIL_PASS"));
        }

        Ok(config)
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            mongo_uri: "mongodb://localhost:27017".to_string(),
            database_name: "ideahive_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            bind_address: "127.0.0.1:0".to_string(),
            frontend_origin: "http://localhost:3000".to_string(),
            institution_domain: "@pes.edu".to_string(),
            mail_transport: MailTransport::Outbox,
            mail_from: "IdeaHive <no-reply@ideahive.com>".to_string(),
            smtp_host: "localhost".to_string(),
            smtp_user: None,
            smtp_pass: None,
        }
    }
}
