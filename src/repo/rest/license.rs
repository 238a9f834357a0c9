use serde::{Deserialize, Serialize};

use super::{PREFER_REPRESENTATION, RestClient};
use crate::{model::License, prelude::*, repo::LicenseRepository};

const TABLE: &str = "keys_code";

/// Wire shape of a `keys_code` row.
#[derive(Debug, Serialize, Deserialize)]
struct LicenseDto {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  id_keys: Option<String>,
  game: String,
  user_key: String,
  duration: i32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  expired_date: Option<String>,
  max_devices: i32,
  #[serde(default)]
  devices: i32,
  #[serde(default = "active")]
  status: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  registrator: Option<String>,
  #[serde(default, skip_serializing)]
  created_at: Option<String>,
  #[serde(default, skip_serializing)]
  updated_at: Option<String>,
}

fn active() -> String {
  License::ACTIVE.into()
}

fn timestamp(raw: Option<&str>) -> Option<DateTime> {
  raw.and_then(utils::parse_timestamp)
}

impl From<LicenseDto> for License {
  fn from(dto: LicenseDto) -> Self {
    Self {
      id: dto.id_keys.unwrap_or_default(),
      game: dto.game,
      user_key: dto.user_key,
      duration_days: dto.duration,
      expired_date: timestamp(dto.expired_date.as_deref()),
      max_devices: dto.max_devices,
      devices: dto.devices,
      status: dto.status,
      registrator: dto.registrator.unwrap_or_default(),
      created_at: timestamp(dto.created_at.as_deref()),
      updated_at: timestamp(dto.updated_at.as_deref()),
    }
  }
}

impl From<&License> for LicenseDto {
  fn from(license: &License) -> Self {
    let non_blank = |s: &str| (!s.trim().is_empty()).then(|| s.to_string());
    Self {
      id_keys: non_blank(&license.id),
      game: license.game.clone(),
      user_key: license.user_key.clone(),
      duration: license.duration_days,
      expired_date: license.expired_date.map(|d| d.and_utc().to_rfc3339()),
      max_devices: license.max_devices,
      devices: license.devices,
      status: license.status.clone(),
      registrator: non_blank(&license.registrator),
      created_at: None,
      updated_at: None,
    }
  }
}

pub struct RestLicenses {
  client: RestClient,
}

impl RestLicenses {
  pub fn new(client: RestClient) -> Self {
    Self { client }
  }
}

#[async_trait]
impl LicenseRepository for RestLicenses {
  async fn list_by_user(&self, _user_id: &str) -> Result<Vec<License>> {
    let rows: Vec<LicenseDto> = self.client.select(TABLE).await?;
    Ok(rows.into_iter().map(License::from).collect())
  }

  async fn create(&self, license: License) -> Result<License> {
    let rows = self
      .client
      .insert(TABLE, &[LicenseDto::from(&license)], PREFER_REPRESENTATION)
      .await?;

    rows.into_iter().next().map(License::from).ok_or_else(|| {
      Error::Internal("store returned no representation for insert".into())
    })
  }

  async fn revoke(&self, id: &str) -> Result<()> {
    self
      .client
      .patch(
        TABLE,
        &[("id_keys", id)],
        &json::json!({ "status": License::REVOKED }),
      )
      .await
  }
}
