//! Startup validation and authentication.
//!
//! The gateway has one configured role. When a password is set the
//! startup flow answers with `AuthenticationCleartextPassword` and
//! compares the reply byte for byte; otherwise clients are trusted after
//! the database/role check. `server_version` and `client_encoding` are
//! reported through the parameter provider.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Sink, SinkExt};
use pgwire::api::auth::{
    finish_authentication, save_startup_parameters_to_metadata, LoginInfo,
    ServerParameterProvider, StartupHandler,
};
use pgwire::api::{ClientInfo, PgWireConnectionState};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::startup::Authentication;
use pgwire::messages::{PgWireBackendMessage, PgWireFrontendMessage};

use crate::config::GatewayConfig;

/// System identity accepted next to the configured role.
pub const SYSTEM_USER: &str = "bemidb";

#[derive(Debug, Clone)]
pub struct GatewayParameterProvider;

impl ServerParameterProvider for GatewayParameterProvider {
    fn server_parameters<C>(&self, _client: &C) -> Option<HashMap<String, String>>
    where
        C: ClientInfo,
    {
        let mut params = HashMap::new();
        params.insert("server_version".to_string(), "17.0".to_string());
        params.insert("client_encoding".to_string(), "UTF8".to_string());
        Some(params)
    }
}

/// Validate the startup `database` / `user` parameters against the
/// configured identity.
pub fn validate_login(
    config: &GatewayConfig,
    user: Option<&str>,
    database: Option<&str>,
) -> PgWireResult<()> {
    if let Some(database) = database {
        if database != config.database() {
            return Err(PgWireError::UserError(Box::new(ErrorInfo::new(
                "FATAL".to_string(),
                "3D000".to_string(),
                format!("database \"{database}\" does not exist"),
            ))));
        }
    }

    let user = user.unwrap_or_default();
    if user != config.user() && user != SYSTEM_USER {
        return Err(PgWireError::UserError(Box::new(ErrorInfo::new(
            "FATAL".to_string(),
            "28000".to_string(),
            format!("role \"{user}\" does not exist"),
        ))));
    }

    Ok(())
}

pub struct GatewayStartupHandler {
    config: Arc<GatewayConfig>,
    parameters: GatewayParameterProvider,
}

impl GatewayStartupHandler {
    pub fn new(config: Arc<GatewayConfig>) -> Self {
        GatewayStartupHandler {
            config,
            parameters: GatewayParameterProvider,
        }
    }
}

#[async_trait]
impl StartupHandler for GatewayStartupHandler {
    async fn on_startup<C>(
        &self,
        client: &mut C,
        message: PgWireFrontendMessage,
    ) -> PgWireResult<()>
    where
        C: ClientInfo + Sink<PgWireBackendMessage> + Unpin + Send,
        C::Error: Debug,
        PgWireError: From<<C as Sink<PgWireBackendMessage>>::Error>,
    {
        match message {
            PgWireFrontendMessage::Startup(ref startup) => {
                save_startup_parameters_to_metadata(client, startup);

                let login = LoginInfo::from_client_info(client);
                validate_login(&self.config, login.user(), login.database())?;

                if self.config.password().is_some() {
                    client.set_state(PgWireConnectionState::AuthenticationInProgress);
                    client
                        .send(PgWireBackendMessage::Authentication(
                            Authentication::CleartextPassword,
                        ))
                        .await?;
                } else {
                    finish_authentication(client, &self.parameters).await?;
                }
            }
            PgWireFrontendMessage::PasswordMessageFamily(message) => {
                let password = message.into_password()?;
                let expected = self.config.password().as_deref().unwrap_or_default();

                if password.password().as_bytes() == expected.as_bytes() {
                    finish_authentication(client, &self.parameters).await?;
                } else {
                    let login = LoginInfo::from_client_info(client);
                    let user = login.user().unwrap_or_default().to_string();
                    return Err(PgWireError::UserError(Box::new(ErrorInfo::new(
                        "FATAL".to_string(),
                        "28P01".to_string(),
                        format!("password authentication failed for user \"{user}\""),
                    ))));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GatewayConfig {
        GatewayConfig::default()
    }

    #[test]
    fn test_validate_login_accepts_configured_identity() {
        assert!(validate_login(&config(), Some("bemidb"), Some("bemidb")).is_ok());
    }

    #[test]
    fn test_validate_login_accepts_custom_user_and_system_user() {
        let custom = config().with_user("analyst".to_string());
        assert!(validate_login(&custom, Some("analyst"), Some("bemidb")).is_ok());
        assert!(validate_login(&custom, Some(SYSTEM_USER), Some("bemidb")).is_ok());
    }

    #[test]
    fn test_validate_login_rejects_wrong_database() {
        let err = validate_login(&config(), Some("bemidb"), Some("postgres")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_validate_login_rejects_unknown_role() {
        let err = validate_login(&config(), Some("intruder"), Some("bemidb")).unwrap_err();
        assert!(err.to_string().contains("role"));
    }
}
