use crate::{prelude::*, state::AppState};

/// Drops idle console sessions once a minute.
pub struct Plugin;

#[async_trait]
impl super::Plugin for Plugin {
  fn name(&self) -> &'static str {
    "session-gc"
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let mut interval = time::interval(Duration::from_secs(60));
    loop {
      interval.tick().await;
      let dropped = app.gc_sessions();
      if dropped > 0 {
        debug!("Dropped {dropped} idle sessions");
      }
    }
  }
}
