//! MongoDB client bootstrap

use bson::doc;
use mongodb::{options::ClientOptions, Client};

use crate::config::MongoConfig;
use crate::error::{Error, Result};

/// Apply configured timeouts and application name to parsed client options
fn apply_config(options: &mut ClientOptions, config: &MongoConfig) {
    options.connect_timeout = Some(config.connect_timeout());
    options.server_selection_timeout = Some(config.server_selection_timeout());
    if let Some(app_name) = &config.app_name {
        options.app_name = Some(app_name.clone());
    }
}

/// Build a client from `config` and verify the server answers a ping.
///
/// The ping must complete within the connect timeout.
pub async fn connect(config: &MongoConfig) -> Result<Client> {
    let mut options = ClientOptions::parse(&config.uri).await.map_err(|e| {
        tracing::error!(error = %e, "unable to parse mongo connection string");
        Error::Connection(format!("invalid connection string: {e}"))
    })?;
    apply_config(&mut options, config);

    let client = Client::with_options(options).map_err(|e| {
        tracing::error!(error = %e, "unable to initiate client to connect to mongo");
        Error::Connection(format!("unable to initiate client: {e}"))
    })?;

    let admin = client.database("admin");
    let ping = admin.run_command(doc! { "ping": 1 });
    match tokio::time::timeout(config.connect_timeout(), ping).await {
        Ok(Ok(_)) => {
            tracing::info!(database = %config.database, "connected to mongo");
            Ok(client)
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "unable to ping mongo instance using initiated client");
            Err(Error::Connection(format!("ping failed: {e}")))
        }
        Err(_) => {
            tracing::error!(
                timeout_secs = config.connect_timeout_secs,
                "timed out pinging mongo instance"
            );
            Err(Error::Connection("ping timed out".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_apply_config() {
        let config = MongoConfig {
            app_name: Some("orders".to_string()),
            connect_timeout_secs: 3,
            server_selection_timeout_secs: 5,
            ..MongoConfig::default()
        };
        let mut options = ClientOptions::parse(&config.uri).await.unwrap();
        apply_config(&mut options, &config);

        assert_eq!(options.app_name.as_deref(), Some("orders"));
        assert_eq!(options.connect_timeout, Some(Duration::from_secs(3)));
        assert_eq!(options.server_selection_timeout, Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_invalid_uri_is_connection_error() {
        let config = MongoConfig {
            uri: "not-a-mongo-uri".to_string(),
            ..MongoConfig::default()
        };
        let err = connect(&config).await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_ping() {
        // Nothing listens on port 1
        let config = MongoConfig {
            uri: "mongodb://127.0.0.1:1".to_string(),
            connect_timeout_secs: 1,
            server_selection_timeout_secs: 1,
            ..MongoConfig::default()
        };
        let err = connect(&config).await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }
}
