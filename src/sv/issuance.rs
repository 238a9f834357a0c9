//! Batch license issuance: balance gate, key generation, issuance log.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};

use super::Ledger;
use crate::{model::License, prelude::*, repo::LicenseRepository};

pub const MAX_BATCH: usize = 100;
pub const KEY_LEN: usize = 16;
pub const RANDOM_NAME_LEN: usize = 8;
pub const MAX_PAD_DIGITS: usize = 6;

/// Raw issuance request as typed by an operator. Every field is parsed
/// leniently, see [`IssueForm::parse`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IssueForm {
  pub game: String,
  pub duration: String,
  pub max_devices: String,
  pub count: String,
  pub system: String,
  pub price_per_key: String,
  /// Registrator base name, random names are generated when blank
  pub seller_base: String,
  pub start_no: String,
  pub pad_digits: String,
}

impl Default for IssueForm {
  fn default() -> Self {
    Self {
      game: String::new(),
      duration: String::new(),
      max_devices: String::new(),
      count: "1".into(),
      system: "System A".into(),
      price_per_key: "0.00".into(),
      seller_base: String::new(),
      start_no: "1".into(),
      pad_digits: "3".into(),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueParams {
  pub game: String,
  pub duration_days: i32,
  pub max_devices: i32,
  pub count: usize,
  pub system: String,
  pub price_per_key: f64,
  pub seller_base: String,
  pub start_no: i32,
  pub pad_digits: usize,
}

impl IssueForm {
  pub fn parse(&self) -> IssueParams {
    let count = utils::parse_or(&self.count, 1_i64).clamp(1, MAX_BATCH as i64);
    let pad = utils::parse_or(&self.pad_digits, 0_i64).clamp(0, MAX_PAD_DIGITS as i64);

    IssueParams {
      game: self.game.trim().to_string(),
      duration_days: utils::parse_or(&self.duration, 0).max(0),
      max_devices: utils::parse_or(&self.max_devices, 1).max(1),
      count: count as usize,
      system: self.system.trim().to_string(),
      price_per_key: utils::parse_or(&self.price_per_key, 0.0),
      seller_base: self.seller_base.trim().to_string(),
      start_no: utils::parse_or(&self.start_no, 1),
      pad_digits: pad as usize,
    }
  }
}

impl IssueParams {
  pub fn total_cost(&self) -> f64 {
    self.price_per_key * self.count as f64
  }

  /// Registrator for the `index`-th license of the batch.
  pub fn registrator(&self, index: usize) -> String {
    if self.seller_base.is_empty() {
      utils::random_alnum(RANDOM_NAME_LEN)
    } else if self.count == 1 {
      self.seller_base.clone()
    } else {
      let number = self.start_no as i64 + index as i64;
      format!("{}{}", self.seller_base, utils::pad_number(number, self.pad_digits))
    }
  }

  /// `None` for non-positive durations and for dates past the calendar.
  pub fn expired_date(&self, now: DateTime) -> Option<DateTime> {
    if self.duration_days <= 0 {
      return None;
    }
    TimeDelta::try_days(self.duration_days as i64)
      .and_then(|days| now.checked_add_signed(days))
  }

  /// Every license of the batch, in index order, ready to be stored.
  pub fn licenses(&self, now: DateTime) -> Vec<License> {
    let expired_date = self.expired_date(now);
    (0..self.count)
      .map(|index| License {
        id: String::new(),
        game: self.game.clone(),
        user_key: utils::random_alnum(KEY_LEN),
        duration_days: self.duration_days,
        expired_date,
        max_devices: self.max_devices,
        devices: 0,
        status: License::ACTIVE.into(),
        registrator: self.registrator(index),
        created_at: Some(now),
        updated_at: None,
      })
      .collect()
  }
}

/// Append-only, human readable record of issued keys.
pub struct IssuanceLog {
  path: PathBuf,
  lock: Mutex<()>,
}

impl IssuanceLog {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into(), lock: Mutex::new(()) }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub async fn append(&self, lines: &[String]) -> Result<()> {
    if lines.is_empty() {
      return Ok(());
    }
    let mut chunk = lines.join("\n");
    chunk.push('\n');

    let _guard = self.lock.lock().await;
    let mut file =
      OpenOptions::new().create(true).append(true).open(&self.path).await?;
    file.write_all(chunk.as_bytes()).await?;
    file.flush().await?;
    Ok(())
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueReport {
  pub issued: usize,
  pub requested: usize,
  pub total_cost: f64,
  pub new_balance: f64,
  /// `registrator:user_key` of every issued license, in batch order
  pub labels: Vec<String>,
  pub log_path: String,
  pub log_error: Option<String>,
}

impl IssueReport {
  pub fn summary(&self) -> String {
    let mut line = format!(
      "Generated {}/{} keys. Charged {}. New balance: {}.",
      self.issued,
      self.requested,
      utils::format_money(self.total_cost),
      utils::format_money(self.new_balance),
    );
    if let Some(err) = &self.log_error {
      line.push_str(&format!(" Failed to write file: {err}"));
    }
    line
  }
}

pub struct Issuer<'a> {
  licenses: &'a dyn LicenseRepository,
  ledger: Ledger<'a>,
  log: &'a IssuanceLog,
}

impl<'a> Issuer<'a> {
  pub fn new(
    licenses: &'a dyn LicenseRepository,
    ledger: Ledger<'a>,
    log: &'a IssuanceLog,
  ) -> Self {
    Self { licenses, ledger, log }
  }

  pub async fn issue(&self, form: &IssueForm) -> Result<IssueReport> {
    self.issue_at(&form.parse(), utils::now()).await
  }

  /// Builds the batch, charges it as a whole, then creates licenses in index
  /// order. Individual create failures are skipped, not fatal.
  pub async fn issue_at(
    &self,
    params: &IssueParams,
    now: DateTime,
  ) -> Result<IssueReport> {
    let batch = params.licenses(now);
    let total_cost = params.total_cost();
    if !self.ledger.try_deduct(total_cost).await? {
      warn!(
        "Issuance of {} keys refused for {}: balance below {:.2}",
        params.count,
        self.ledger.account(),
        total_cost
      );
      return Err(Error::InsufficientBalance { need: total_cost });
    }

    let issued_at = utils::format_date(now);
    let price = utils::format_money(params.price_per_key);
    let mut lines = Vec::with_capacity(params.count);
    let mut labels = Vec::with_capacity(params.count);

    for (index, license) in batch.into_iter().enumerate() {
      if let Err(err) = self.licenses.create(license.clone()).await {
        warn!("Skipping key {}/{}: {err}", index + 1, params.count);
        continue;
      }

      let invoice = format!("{}-{}", now.and_utc().timestamp(), index + 1);
      let label = license.label();
      lines.push(format!(
        "{invoice},{label},{},{issued_at},{},{price}",
        license.game, params.system
      ));
      labels.push(label);
    }

    let log_error = match self.log.append(&lines).await {
      Ok(()) => None,
      Err(err) => {
        error!("Failed to append to {}: {err}", self.log.path().display());
        Some(err.to_string())
      }
    };

    let report = IssueReport {
      issued: labels.len(),
      requested: params.count,
      total_cost,
      new_balance: self.ledger.balance().await?,
      labels,
      log_path: self.log.path().display().to_string(),
      log_error,
    };
    info!(
      "{} issued {}/{} keys for {}",
      self.ledger.account(),
      report.issued,
      report.requested,
      params.game
    );
    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use migration::Migrator;

  use super::*;
  use crate::repo::memory::MemoryLicenses;

  async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
  }

  fn temp_log(name: &str) -> IssuanceLog {
    let path = std::env::temp_dir()
      .join(format!("issuance-{name}-{}.txt", uuid::Uuid::new_v4()));
    IssuanceLog::new(path)
  }

  /// Counts create calls and fails the ones whose ordinal is listed.
  struct Flaky {
    inner: MemoryLicenses,
    calls: AtomicUsize,
    fail_on: Vec<usize>,
  }

  impl Flaky {
    fn new(fail_on: Vec<usize>) -> Self {
      Self { inner: MemoryLicenses::default(), calls: AtomicUsize::new(0), fail_on }
    }
  }

  #[async_trait]
  impl LicenseRepository for Flaky {
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<License>> {
      self.inner.list_by_user(user_id).await
    }

    async fn create(&self, license: License) -> Result<License> {
      let call = self.calls.fetch_add(1, Ordering::SeqCst);
      if self.fail_on.contains(&call) {
        return Err(Error::Internal("store hiccup".into()));
      }
      self.inner.create(license).await
    }

    async fn revoke(&self, id: &str) -> Result<()> {
      self.inner.revoke(id).await
    }
  }

  fn form(count: &str, price: &str, base: &str) -> IssueForm {
    IssueForm {
      game: "PUBG".into(),
      duration: "30".into(),
      max_devices: "2".into(),
      count: count.into(),
      price_per_key: price.into(),
      seller_base: base.into(),
      ..IssueForm::default()
    }
  }

  #[test]
  fn parse_is_permissive() {
    let params = IssueForm {
      duration: "thirty".into(),
      max_devices: "".into(),
      count: "lots".into(),
      price_per_key: "free".into(),
      start_no: "x".into(),
      pad_digits: "wide".into(),
      ..IssueForm::default()
    }
    .parse();

    assert_eq!(params.duration_days, 0);
    assert_eq!(params.max_devices, 1);
    assert_eq!(params.count, 1);
    assert_eq!(params.price_per_key, 0.0);
    assert_eq!(params.start_no, 1);
    assert_eq!(params.pad_digits, 0);
    assert_eq!(params.system, "System A");
  }

  #[test]
  fn parse_clamps() {
    let params =
      IssueForm { count: "500".into(), pad_digits: "9".into(), ..form("", "", "") }
        .parse();
    assert_eq!(params.count, MAX_BATCH);
    assert_eq!(params.pad_digits, MAX_PAD_DIGITS);

    let params = IssueForm { pad_digits: "-2".into(), ..form("0", "", "") }.parse();
    assert_eq!(params.count, 1);
    assert_eq!(params.pad_digits, 0);
  }

  #[test]
  fn registrator_naming() {
    let mut params = IssueForm {
      start_no: "7".into(),
      pad_digits: "3".into(),
      ..form("3", "1", "  Bear ")
    }
    .parse();
    let names: Vec<_> = (0..3).map(|i| params.registrator(i)).collect();
    assert_eq!(names, ["Bear007", "Bear008", "Bear009"]);

    params.count = 1;
    assert_eq!(params.registrator(0), "Bear");

    params.seller_base.clear();
    let random = params.registrator(0);
    assert_eq!(random.len(), RANDOM_NAME_LEN);
    assert!(random.chars().all(|c| c.is_ascii_alphanumeric()));
  }

  #[test]
  fn expiry_only_for_positive_duration() {
    let now = utils::parse_timestamp("2026-01-01T00:00:00Z").unwrap();
    let params = form("1", "0", "").parse();
    assert_eq!(
      params.expired_date(now),
      utils::parse_timestamp("2026-01-31T00:00:00Z")
    );

    let params = IssueForm { duration: "0".into(), ..form("1", "0", "") }.parse();
    assert_eq!(params.expired_date(now), None);
  }

  #[test]
  fn start_number_outside_i32_falls_back() {
    let params = IssueForm {
      start_no: "9223372036854775807".into(),
      ..form("2", "0", "B")
    }
    .parse();
    assert_eq!(params.start_no, 1);
    assert_eq!(params.registrator(1), "B002");

    let params =
      IssueForm { start_no: "2147483647".into(), ..form("2", "0", "B") }.parse();
    assert_eq!(params.registrator(1), "B2147483648");
  }

  #[test]
  fn negative_start_keeps_sign_first() {
    let params =
      IssueForm { start_no: "-5".into(), ..form("2", "0", "B") }.parse();
    assert_eq!(params.registrator(0), "B-05");
    assert_eq!(params.registrator(1), "B-04");
  }

  #[test]
  fn huge_duration_has_no_expiry() {
    let now = utils::parse_timestamp("2026-01-01T00:00:00Z").unwrap();
    let params =
      IssueForm { duration: "2000000000".into(), ..form("1", "0", "") }.parse();
    assert_eq!(params.duration_days, 2_000_000_000);
    assert_eq!(params.expired_date(now), None);
  }

  #[tokio::test]
  async fn huge_duration_batch_is_issued() {
    let db = setup_test_db().await;
    let repo = MemoryLicenses::default();
    let log = temp_log("huge");
    let ledger = Ledger::new(&db, "seller", 1000.0);

    let form = IssueForm { duration: "2000000000".into(), ..form("1", "10", "B") };
    let report =
      Issuer::new(&repo, ledger.clone(), &log).issue(&form).await.unwrap();

    assert_eq!((report.issued, report.requested), (1, 1));
    assert_eq!(report.new_balance, 990.0);
    assert_eq!(ledger.balance().await.unwrap(), 990.0);
    let stored = repo.list_by_user("").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].expired_date, None);
    assert_eq!(stored[0].duration_days, 2_000_000_000);

    let _ = tokio::fs::remove_file(log.path()).await;
  }

  #[tokio::test]
  async fn batch_within_balance() {
    let db = setup_test_db().await;
    let repo = MemoryLicenses::default();
    let log = temp_log("ok");
    let ledger = Ledger::new(&db, "seller", 1000.0);
    ledger.set_balance(100.0).await.unwrap();

    let report = Issuer::new(&repo, ledger.clone(), &log)
      .issue(&form("5", "10.00", "Bear"))
      .await
      .unwrap();

    assert_eq!((report.issued, report.requested), (5, 5));
    assert_eq!(report.total_cost, 50.0);
    assert_eq!(report.new_balance, 50.0);
    assert_eq!(
      report.summary(),
      "Generated 5/5 keys. Charged 50.00. New balance: 50.00."
    );
    assert_eq!(ledger.balance().await.unwrap(), 50.0);

    let stored = repo.list_by_user("").await.unwrap();
    assert_eq!(stored.len(), 5);
    for license in &stored {
      assert_eq!(license.user_key.len(), KEY_LEN);
      assert!(license.user_key.chars().all(|c| c.is_ascii_alphanumeric()));
      assert_eq!(license.status, "active");
      assert_eq!(license.max_devices, 2);
      assert!(license.expired_date.is_some());
    }

    let written = tokio::fs::read_to_string(log.path()).await.unwrap();
    let lines: Vec<_> = written.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(report.labels.len(), 5);
    for (i, (line, label)) in lines.iter().zip(&report.labels).enumerate() {
      let fields: Vec<_> = line.split(',').collect();
      assert_eq!(fields.len(), 6);
      assert!(fields[0].ends_with(&format!("-{}", i + 1)));
      assert_eq!(fields[1], label);
      assert!(label.starts_with(&format!("Bear{:03}:", i + 1)));
      assert_eq!(fields[2], "PUBG");
      assert_eq!(fields[4], "System A");
      assert_eq!(fields[5], "10.00");
    }

    let _ = tokio::fs::remove_file(log.path()).await;
  }

  #[tokio::test]
  async fn insufficient_balance_aborts_everything() {
    let db = setup_test_db().await;
    let repo = Flaky::new(vec![]);
    let log = temp_log("broke");
    let ledger = Ledger::new(&db, "seller", 1000.0);
    ledger.set_balance(20.0).await.unwrap();

    let err = Issuer::new(&repo, ledger.clone(), &log)
      .issue(&form("5", "10.00", "Bear"))
      .await
      .unwrap_err();

    assert!(matches!(err, Error::InsufficientBalance { need } if need == 50.0));
    assert_eq!(err.to_string(), "Insufficient balance. Need 50.00");
    assert_eq!(repo.calls.load(Ordering::SeqCst), 0);
    assert_eq!(ledger.balance().await.unwrap(), 20.0);
    assert!(!log.path().exists());
  }

  #[tokio::test]
  async fn partial_failures_are_skipped() {
    let db = setup_test_db().await;
    let repo = Flaky::new(vec![1, 3]);
    let log = temp_log("partial");
    let ledger = Ledger::new(&db, "seller", 1000.0);

    let report = Issuer::new(&repo, ledger, &log)
      .issue(&form("5", "1", "Bear"))
      .await
      .unwrap();

    assert_eq!(repo.calls.load(Ordering::SeqCst), 5);
    assert_eq!((report.issued, report.requested), (3, 5));
    // the whole batch is charged up front
    assert_eq!(report.new_balance, 995.0);

    let registrators: Vec<_> = report
      .labels
      .iter()
      .map(|l| l.split(':').next().unwrap().to_string())
      .collect();
    assert_eq!(registrators, ["Bear001", "Bear003", "Bear005"]);

    let written = tokio::fs::read_to_string(log.path()).await.unwrap();
    assert_eq!(written.lines().count(), 3);
    let _ = tokio::fs::remove_file(log.path()).await;
  }

  #[tokio::test]
  async fn unwritable_log_is_reported_not_fatal() {
    let db = setup_test_db().await;
    let repo = MemoryLicenses::default();
    let log = IssuanceLog::new(
      std::env::temp_dir().join("no-such-dir-for-issuance").join("log.txt"),
    );

    let report = Issuer::new(&repo, Ledger::new(&db, "seller", 1000.0), &log)
      .issue(&form("2", "0", ""))
      .await
      .unwrap();

    assert_eq!(report.issued, 2);
    assert!(report.log_error.is_some());
    assert!(report.summary().contains("Failed to write file"));
    assert_eq!(repo.list_by_user("").await.unwrap().len(), 2);
  }

  #[tokio::test]
  async fn never_more_creates_than_requested() {
    let db = setup_test_db().await;
    let log = temp_log("bounded");

    for count in [1, 2, 17, 100] {
      let repo = Flaky::new(vec![]);
      let ledger = Ledger::new(&db, format!("acct-{count}"), 1000.0);
      let report = Issuer::new(&repo, ledger, &log)
        .issue(&form(&count.to_string(), "0", "B"))
        .await
        .unwrap();

      assert_eq!(repo.calls.load(Ordering::SeqCst), count);
      assert_eq!(report.issued, count);
    }

    let _ = tokio::fs::remove_file(log.path()).await;
  }
}
