//! Composition root.
//!
//! Orders startup so that every step's output exists before the next one runs:
//!
//! 1. Validate the JWT signing configuration, the CORS origins and the hub path.
//! 2. Resolve database credentials and build the database client.
//! 3. Resolve identity-provider credentials and initialize the provider once.
//! 4. Create the authentication gate and the hub token bridge.
//! 5. Create the application services.
//! 6. Assemble the router and listen address.
//!
//! # Post-conditions
//! - `compose` either returns a fully wired [`Application`] or a
//!   `ConfigurationError`. Nothing binds a socket here, so a failure can never leave
//!   a partially listening server behind.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN},
    },
};
use tower_http::cors::CorsLayer;

use crate::auth::{AuthenticationGate, SigningConfig, TokenBridge};
use crate::clients::{EmulatorHosts, IdentityProviderSlot, ServiceClientFactory};
use crate::config::{ConfigurationError, Settings};
use crate::credentials::{CredentialChain, DependencyKind};
use crate::environment::{EnvSource, RuntimeEnvironment};
use crate::services::{AppServices, DocumentService, IdentityService, NotificationService};

/// A wired application, ready to be served.
pub struct Application {
    pub router: Router,
    pub listen_addr: SocketAddr,
    pub runtime: RuntimeEnvironment,
    pub services: AppServices,
}

/// Owns the process-wide wiring, including the identity provider's once-only slot.
pub struct CompositionRoot {
    env: Arc<dyn EnvSource>,
    identity: IdentityProviderSlot,
    staging_dir: PathBuf,
}

impl CompositionRoot {
    #[must_use]
    pub fn new(env: Arc<dyn EnvSource>) -> Self {
        Self {
            env,
            identity: IdentityProviderSlot::new(),
            staging_dir: std::env::temp_dir(),
        }
    }

    /// Directory receiving inline database credentials that must be written to disk.
    #[must_use]
    pub fn with_staging_dir(mut self, staging_dir: PathBuf) -> Self {
        self.staging_dir = staging_dir;
        self
    }

    #[must_use]
    pub const fn identity_slot(&self) -> &IdentityProviderSlot {
        &self.identity
    }

    /// Wire the application from `settings`.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigurationError` hit, in startup order.
    pub fn compose(&self, settings: &Settings) -> Result<Application, ConfigurationError> {
        let signing = SigningConfig::from_settings(&settings.jwt)?;
        let cors = cors_layer(&settings.cors_allowed_origins)?;
        settings.realtime.validate()?;

        let env = self.env.as_ref();
        let runtime = RuntimeEnvironment::detect(env);
        tracing::info!(%runtime, "detected runtime environment");

        let chain = CredentialChain::new(
            env,
            runtime,
            settings.project_id.as_deref(),
            settings.credentials_file.as_deref(),
        );
        let factory =
            ServiceClientFactory::new(self.staging_dir.clone(), EmulatorHosts::from_env(env))?;

        let database_credential = chain.resolve(DependencyKind::Database)?;
        let database = Arc::new(factory.build_database(&database_credential)?);

        let identity = self.identity.get_or_try_init(|| {
            let credential = chain.resolve(DependencyKind::IdentityProvider)?;
            factory.build_identity_provider(&credential)
        })?;

        let gate = Arc::new(AuthenticationGate::new(signing));
        let bridge = Arc::new(TokenBridge::new(
            [settings.realtime.path.as_str()],
            settings.realtime.token_query_parameter.as_str(),
        ));

        let services = AppServices {
            documents: Arc::new(DocumentService::new(database)),
            identity: Arc::new(IdentityService::new(identity)),
            notifications: Arc::new(NotificationService::default()),
        };

        let router = crate::routes::router(
            services.clone(),
            gate,
            bridge,
            cors,
            &settings.realtime.path,
        );
        let listen_addr = SocketAddr::from(([0, 0, 0, 0], settings.listen_port));

        Ok(Application {
            router,
            listen_addr,
            runtime,
            services,
        })
    }
}

/// CORS for browser clients on the configured origins.
///
/// # Errors
///
/// Returns `ConfigurationError::InvalidValue` if an origin is not a valid header value,
/// or is the `*` wildcard, which browsers refuse alongside credentials.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer, ConfigurationError> {
    let allowed = origins
        .iter()
        .map(|origin| {
            if origin.trim() == "*" {
                return Err(ConfigurationError::InvalidValue {
                    name: "cors.allowedOrigins".to_owned(),
                    message: "wildcard origin '*' cannot be combined with credentials".to_owned(),
                });
            }
            origin
                .parse::<HeaderValue>()
                .map_err(|e| ConfigurationError::InvalidValue {
                    name: "cors.allowedOrigins".to_owned(),
                    message: format!("'{origin}': {e}"),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT, ORIGIN])
        .allow_credentials(true))
}
