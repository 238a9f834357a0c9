mod handlers;

use std::net::SocketAddr;

use axum::{
  Router,
  routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

use crate::{prelude::*, state::AppState};

pub struct Plugin;

pub fn router(app: Arc<AppState>) -> anyhow::Result<(Router, impl Future)> {
  let governor_conf = Arc::new(
    GovernorConfigBuilder::default()
      .per_second(2)
      .burst_size(100)
      .finish()
      .context("Failed to build rate limiter config")?,
  );
  let limiter = governor_conf.limiter().clone();
  let cleaner = async move {
    loop {
      time::sleep(Duration::from_secs(60)).await;
      limiter.retain_recent();
    }
  };

  let router = Router::new()
    .route("/health", get(handlers::health))
    .route("/api/login", post(handlers::login))
    .route("/api/logout", post(handlers::logout))
    .route("/api/me", get(handlers::me))
    .route("/api/dashboard", get(handlers::dashboard))
    .route("/api/licenses", get(handlers::licenses))
    .route("/api/licenses/issue", post(handlers::issue))
    .route("/api/licenses/{id}/revoke", post(handlers::revoke))
    .route("/api/balance", get(handlers::balance))
    .route("/api/balance/{account}", put(handlers::set_balance))
    .route("/api/flags", get(handlers::flags).put(handlers::upsert_flag))
    .route("/api/controls", get(handlers::controls).put(handlers::upsert_control))
    .route("/api/sellers", get(handlers::sellers))
    .route(
      "/api/sellers/{id}",
      get(handlers::seller).delete(handlers::remove_seller),
    )
    .route("/api/sellers/{id}/transfer", post(handlers::transfer))
    .route("/api/sellers/{id}/verified", post(handlers::set_verified))
    .route("/api/sellers/{id}/banned", post(handlers::set_banned))
    .layer(
      ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer::new(governor_conf))
        .layer(
          CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        ),
    )
    .with_state(app);

  Ok((router, cleaner))
}

#[async_trait]
impl super::Plugin for Plugin {
  fn name(&self) -> &'static str {
    "http"
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], app.config.port));
    let (router, cleaner) = router(app)?;

    let listener = tokio::net::TcpListener::bind(addr)
      .await
      .with_context(|| format!("Failed to bind {addr}"))?;
    info!("HTTP server listening on {addr}");

    let server = async {
      axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
      )
      .await
      .context("Axum server error")
    };

    tokio::select! {
      result = server => {
        match &result {
          Ok(()) => info!("Server stopped gracefully"),
          Err(err) => error!("Server stopped with error: {err}"),
        }
        result
      }
      _ = cleaner => {
        error!("Rate limiter cleaner stopped unexpectedly");
        Ok(())
      }
    }
  }
}
