use serde::{Deserialize, Serialize};

use super::{PREFER_UPSERT, RestClient};
use crate::{
  model::{Audience, FeatureFlag, UserControl},
  prelude::*,
  repo::ControlsRepository,
};

const FLAGS: &str = "feature_flags";
const CONTROLS: &str = "user_controls";

#[derive(Debug, Serialize, Deserialize)]
struct FeatureFlagDto {
  flag_key: String,
  enabled: bool,
  audience: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct UserControlDto {
  user_id: String,
  can_login: bool,
  can_create_keys: bool,
  can_reset_keys: bool,
  can_add_balance: bool,
}

impl From<FeatureFlagDto> for FeatureFlag {
  fn from(dto: FeatureFlagDto) -> Self {
    Self {
      key: dto.flag_key,
      audience: Audience::from_wire(&dto.audience),
      enabled: dto.enabled,
    }
  }
}

impl From<FeatureFlag> for FeatureFlagDto {
  fn from(flag: FeatureFlag) -> Self {
    Self {
      flag_key: flag.key,
      enabled: flag.enabled,
      audience: flag.audience.as_wire().to_string(),
    }
  }
}

impl From<UserControlDto> for UserControl {
  fn from(dto: UserControlDto) -> Self {
    Self {
      user_id: dto.user_id,
      can_login: dto.can_login,
      can_create_keys: dto.can_create_keys,
      can_reset_keys: dto.can_reset_keys,
      can_add_balance: dto.can_add_balance,
    }
  }
}

impl From<UserControl> for UserControlDto {
  fn from(control: UserControl) -> Self {
    Self {
      user_id: control.user_id,
      can_login: control.can_login,
      can_create_keys: control.can_create_keys,
      can_reset_keys: control.can_reset_keys,
      can_add_balance: control.can_add_balance,
    }
  }
}

pub struct RestControls {
  client: RestClient,
}

impl RestControls {
  pub fn new(client: RestClient) -> Self {
    Self { client }
  }
}

#[async_trait]
impl ControlsRepository for RestControls {
  async fn list_flags(&self) -> Result<Vec<FeatureFlag>> {
    let rows: Vec<FeatureFlagDto> = self.client.select(FLAGS).await?;
    Ok(rows.into_iter().map(FeatureFlag::from).collect())
  }

  async fn upsert_flag(&self, flag: FeatureFlag) -> Result<()> {
    let rows = [FeatureFlagDto::from(flag)];
    self.client.insert(FLAGS, &rows, PREFER_UPSERT).await?;
    Ok(())
  }

  async fn list_user_controls(&self) -> Result<Vec<UserControl>> {
    let rows: Vec<UserControlDto> = self.client.select(CONTROLS).await?;
    Ok(rows.into_iter().map(UserControl::from).collect())
  }

  async fn upsert_user_control(&self, control: UserControl) -> Result<()> {
    let rows = [UserControlDto::from(control)];
    self.client.insert(CONTROLS, &rows, PREFER_UPSERT).await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::repo::{contract, rest::fake};

  #[tokio::test]
  async fn controls_contract() {
    let server = fake::spawn("anon").await;
    let repo = RestControls::new(RestClient::new(&server.url, "anon").unwrap());
    contract::controls(&repo).await;
    assert_eq!(server.last_prefer().as_deref(), Some(PREFER_UPSERT));
  }

  #[tokio::test]
  async fn unknown_audience_widens_to_all() {
    let server = fake::spawn("anon").await;
    server.seed(
      FLAGS,
      json::json!({ "flag_key": "delete_key", "enabled": true, "audience": "GUEST" }),
    );
    let repo = RestControls::new(RestClient::new(&server.url, "anon").unwrap());

    let flags = repo.list_flags().await.unwrap();
    assert_eq!(flags, vec![FeatureFlag::new("delete_key", Audience::All, true)]);
  }

  #[tokio::test]
  async fn flags_are_sent_with_wire_audience() {
    let server = fake::spawn("anon").await;
    let repo = RestControls::new(RestClient::new(&server.url, "anon").unwrap());

    repo
      .upsert_flag(FeatureFlag::new("reset_key", Audience::Administrator, false))
      .await
      .unwrap();

    let row = server.rows(FLAGS).pop().unwrap();
    assert_eq!(row["audience"], "ADMINISTRATOR");
    assert_eq!(row["flag_key"], "reset_key");
    assert_eq!(row["enabled"], false);
  }
}
