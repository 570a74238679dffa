use std::{
    collections::{HashMap, HashSet},
    net::SocketAddr,
    sync::Arc,
};
use tokio::sync::{Mutex, RwLock};

use axum::{
    extract::Extension,
    http::{
        header::AUTHORIZATION, HeaderMap, HeaderValue, Method,
        StatusCode,
    },
    routing::{get, post},
    Json, Router,
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::{ServerConfig, TlsConfig},
    pool::{PeerPool, Pool},
    Result,
};

pub(crate) type State = Arc<ServerState>;

pub(crate) struct ServerState {
    /// Server config.
    pub(crate) config: ServerConfig,

    /// One pool per configured app, keyed by URL path.
    pub(crate) pools: HashMap<String, Pool>,

    /// User tokens registered through the admin endpoint.
    pub(crate) tokens: RwLock<HashSet<String>>,
}

impl ServerState {
    /// Whether a socket presenting `token` may be admitted.
    pub(crate) async fn is_admitted(
        &self,
        token: Option<&str>,
    ) -> bool {
        if self.config.admin_token.is_none() {
            return true;
        }
        match token {
            Some(token) => self.tokens.read().await.contains(token),
            None => false,
        }
    }
}

/// Signaling relay web server.
pub struct SignalingServer {
    state: State,
}

impl SignalingServer {
    /// Create a new signaling server.
    pub fn new(config: ServerConfig) -> Self {
        let pools = config
            .apps
            .iter()
            .map(|app| {
                tracing::info!(
                    name = %app.name,
                    path = %app.path,
                    address_sharing = app.address_sharing,
                    "app"
                );
                let pool = PeerPool::new(
                    app.name.clone(),
                    app.address_sharing,
                );
                (app.path.clone(), Arc::new(Mutex::new(pool)))
            })
            .collect();
        Self {
            state: Arc::new(ServerState {
                config,
                pools,
                tokens: Default::default(),
            }),
        }
    }

    /// Start the server.
    pub async fn start(
        &self,
        addr: SocketAddr,
        handle: Handle,
    ) -> Result<()> {
        let tls = self.state.config.tls.as_ref().cloned();
        if let Some(tls) = tls {
            self.run_tls(addr, handle, tls).await
        } else {
            self.run(addr, handle).await
        }
    }

    /// Start the server running on HTTPS.
    async fn run_tls(
        &self,
        addr: SocketAddr,
        handle: Handle,
        tls: TlsConfig,
    ) -> Result<()> {
        let tls =
            RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;
        let app = self.router()?;
        tracing::info!("listening on {}", addr);
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;
        Ok(())
    }

    /// Start the server running on HTTP.
    async fn run(
        &self,
        addr: SocketAddr,
        handle: Handle,
    ) -> Result<()> {
        let app = self.router()?;
        tracing::info!("listening on {}", addr);
        axum_server::bind(addr)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;
        Ok(())
    }

    fn router(&self) -> Result<Router> {
        let mut origins = Vec::new();
        for url in self.state.config.cors.origins.iter() {
            tracing::info!(url = %url, "cors");
            origins.push(HeaderValue::from_str(
                url.as_str().trim_end_matches('/'),
            )?);
        }

        let cors = CorsLayer::new()
            .allow_methods(vec![Method::GET, Method::POST])
            .allow_origin(origins);

        let mut app = Router::new();
        for path in self.state.pools.keys() {
            app = app.route(path, get(crate::websocket::upgrade));
        }
        if self.state.config.admin_token.is_some() {
            app = app.route("/api/token", post(register_token));
        }
        app = app
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .layer(Extension(Arc::clone(&self.state)));
        Ok(app)
    }
}

#[derive(Debug, Deserialize)]
struct TokenRequest {
    #[serde(rename = "userToken")]
    user_token: String,
}

/// Register a user token for socket admission.
async fn register_token(
    Extension(state): Extension<State>,
    headers: HeaderMap,
    Json(request): Json<TokenRequest>,
) -> StatusCode {
    let Some(admin_token) = &state.config.admin_token else {
        return StatusCode::NOT_FOUND;
    };
    let expected = format!("Bearer {admin_token}");
    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some(expected.as_str());
    if !authorized {
        return StatusCode::UNAUTHORIZED;
    }
    tracing::debug!("user token registered");
    state.tokens.write().await.insert(request.user_token);
    StatusCode::OK
}
