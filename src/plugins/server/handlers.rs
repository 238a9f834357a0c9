use axum::{
  Json,
  extract::{FromRequestParts, Path, Query, State},
  http::{header, request::Parts},
};
use serde::{Deserialize, Serialize};

use crate::{
  model::{FeatureFlag, Role, Seller, User, UserControl},
  prelude::*,
  sv::{
    IssueForm, Ledger,
    console::{Dashboard, LicenseView},
    issuance::IssueReport,
  },
  state::AppState,
};

type App = State<Arc<AppState>>;

const MANAGERS: &[Role] = &[Role::Owner, Role::Administrator];
const OWNER: &[Role] = &[Role::Owner];

/// Session resolved from `Authorization: Bearer <token>`.
pub struct Caller {
  pub token: String,
  pub user: User,
}

impl FromRequestParts<Arc<AppState>> for Caller {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    app: &Arc<AppState>,
  ) -> Result<Self> {
    let token = parts
      .headers
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.strip_prefix("Bearer "))
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .ok_or(Error::Unauthorized)?
      .to_string();

    let user = app.repos.auth.me(&token).await?;
    Ok(Self { token, user })
  }
}

#[derive(Debug, Serialize)]
pub struct Ack {
  pub success: bool,
}

impl Ack {
  fn ok() -> Json<Self> {
    Json(Self { success: true })
  }
}

pub async fn health() -> &'static str {
  "OK"
}

#[derive(Debug, Deserialize)]
pub struct LoginReq {
  pub username: String,
  pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginRes {
  pub token: String,
  pub user: User,
}

pub async fn login(
  State(app): App,
  Json(req): Json<LoginReq>,
) -> Result<Json<LoginRes>> {
  let session = app.login(&req.username, &req.password).await?;
  Ok(Json(LoginRes { token: session.token, user: session.user }))
}

pub async fn logout(State(app): App, caller: Caller) -> Result<Json<Ack>> {
  app.repos.auth.logout(&caller.token).await?;
  Ok(Ack::ok())
}

pub async fn me(caller: Caller) -> Json<User> {
  Json(caller.user)
}

pub async fn dashboard(
  State(app): App,
  caller: Caller,
) -> Result<Json<Dashboard>> {
  Ok(Json(app.sv(&caller.user).console.dashboard().await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
  #[serde(default)]
  pub q: String,
}

pub async fn licenses(
  State(app): App,
  caller: Caller,
  Query(search): Query<SearchQuery>,
) -> Result<Json<LicenseView>> {
  Ok(Json(app.sv(&caller.user).console.licenses(&search.q).await?))
}

#[derive(Debug, Serialize)]
pub struct IssueRes {
  pub success: bool,
  pub message: String,
  #[serde(flatten)]
  pub report: IssueReport,
}

pub async fn issue(
  State(app): App,
  caller: Caller,
  Json(form): Json<IssueForm>,
) -> Result<Json<IssueRes>> {
  let sv = app.sv(&caller.user);
  sv.console.can_issue().await?;

  let report = sv.issuer.issue(&form).await?;
  Ok(Json(IssueRes { success: true, message: report.summary(), report }))
}

pub async fn revoke(
  State(app): App,
  caller: Caller,
  Path(id): Path<String>,
) -> Result<Json<Ack>> {
  app.sv(&caller.user).console.revoke(&id).await?;
  Ok(Ack::ok())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceRes {
  pub account: String,
  pub balance: f64,
}

pub async fn balance(
  State(app): App,
  caller: Caller,
) -> Result<Json<BalanceRes>> {
  let ledger = app.sv(&caller.user).ledger;
  let balance = ledger.balance().await?;
  Ok(Json(BalanceRes { account: ledger.account().to_string(), balance }))
}

#[derive(Debug, Deserialize)]
pub struct SetBalanceReq {
  pub balance: f64,
}

pub async fn set_balance(
  State(app): App,
  caller: Caller,
  Path(account): Path<String>,
  Json(req): Json<SetBalanceReq>,
) -> Result<Json<BalanceRes>> {
  app.sv(&caller.user).console.require_role(OWNER)?;

  let ledger = Ledger::new(&app.db, account, app.config.default_balance);
  ledger.set_balance(req.balance).await?;
  Ok(Json(BalanceRes {
    account: ledger.account().to_string(),
    balance: ledger.balance().await?,
  }))
}

pub async fn flags(
  State(app): App,
  _caller: Caller,
) -> Result<Json<Vec<FeatureFlag>>> {
  Ok(Json(app.repos.controls.list_flags().await?))
}

pub async fn upsert_flag(
  State(app): App,
  caller: Caller,
  Json(flag): Json<FeatureFlag>,
) -> Result<Json<Ack>> {
  app.sv(&caller.user).console.require_role(OWNER)?;

  info!(
    "Flag {} for {} set to {}",
    flag.key,
    flag.audience.as_wire(),
    flag.enabled
  );
  app.repos.controls.upsert_flag(flag).await?;
  Ok(Ack::ok())
}

pub async fn controls(
  State(app): App,
  caller: Caller,
) -> Result<Json<Vec<UserControl>>> {
  app.sv(&caller.user).console.require_role(OWNER)?;
  Ok(Json(app.repos.controls.list_user_controls().await?))
}

pub async fn upsert_control(
  State(app): App,
  caller: Caller,
  Json(control): Json<UserControl>,
) -> Result<Json<Ack>> {
  app.sv(&caller.user).console.require_role(OWNER)?;

  info!("Controls of {} updated", control.user_id);
  app.repos.controls.upsert_user_control(control).await?;
  Ok(Ack::ok())
}

pub async fn sellers(
  State(app): App,
  caller: Caller,
) -> Result<Json<Vec<Seller>>> {
  app.sv(&caller.user).console.require_role(MANAGERS)?;
  Ok(Json(app.repos.sellers.list().await?))
}

pub async fn seller(
  State(app): App,
  caller: Caller,
  Path(id): Path<String>,
) -> Result<Json<Seller>> {
  app.sv(&caller.user).console.require_role(MANAGERS)?;
  Ok(Json(app.repos.sellers.get(&id).await?))
}

#[derive(Debug, Deserialize)]
pub struct TransferReq {
  pub amount: f64,
}

#[derive(Debug, Serialize)]
pub struct TransferRes {
  pub seller: String,
  pub balance: f64,
}

pub async fn transfer(
  State(app): App,
  caller: Caller,
  Path(id): Path<String>,
  Json(req): Json<TransferReq>,
) -> Result<Json<TransferRes>> {
  let balance = app.sv(&caller.user).console.transfer(&id, req.amount).await?;
  Ok(Json(TransferRes { seller: id, balance }))
}

#[derive(Debug, Deserialize)]
pub struct ToggleReq {
  pub value: bool,
}

pub async fn set_verified(
  State(app): App,
  caller: Caller,
  Path(id): Path<String>,
  Json(req): Json<ToggleReq>,
) -> Result<Json<Ack>> {
  app.sv(&caller.user).console.require_role(OWNER)?;
  app.repos.sellers.set_verified(&id, req.value).await?;
  Ok(Ack::ok())
}

pub async fn set_banned(
  State(app): App,
  caller: Caller,
  Path(id): Path<String>,
  Json(req): Json<ToggleReq>,
) -> Result<Json<Ack>> {
  app.sv(&caller.user).console.require_role(OWNER)?;
  app.repos.sellers.set_banned(&id, req.value).await?;
  if req.value {
    warn!("Seller {id} banned by {}", caller.user.username);
  }
  Ok(Ack::ok())
}

pub async fn remove_seller(
  State(app): App,
  caller: Caller,
  Path(id): Path<String>,
) -> Result<Json<Ack>> {
  app.sv(&caller.user).console.require_role(OWNER)?;
  app.repos.sellers.remove(&id).await?;
  info!("Seller {id} removed by {}", caller.user.username);
  Ok(Ack::ok())
}
