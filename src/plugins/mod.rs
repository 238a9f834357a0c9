pub mod cron;
pub mod server;

use tokio::task::JoinSet;

use crate::{prelude::*, state::AppState};

const RESTART_DELAY: Duration = Duration::from_secs(5);

/// A long-running part of the console, restarted whenever it stops.
#[async_trait]
pub trait Plugin: Send + Sync {
  fn name(&self) -> &'static str {
    std::any::type_name::<Self>()
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()>;
}

#[derive(Default)]
pub struct App {
  plugins: Vec<Arc<dyn Plugin>>,
}

impl App {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register<P: Plugin + 'static>(mut self, plugin: P) -> Self {
    self.plugins.push(Arc::new(plugin));
    self
  }

  async fn supervise(plugin: Arc<dyn Plugin>, app: Arc<AppState>) {
    let name = plugin.name();
    info!("Plugin `{name}` started");

    loop {
      let task = tokio::spawn({
        let (plugin, app) = (plugin.clone(), app.clone());
        async move { plugin.start(app).await }
      });

      match task.await {
        Ok(Ok(())) => warn!("Plugin `{name}` returned, restarting"),
        Ok(Err(err)) => error!("Plugin `{name}` failed: {err:#}"),
        Err(err) if err.is_cancelled() => {
          info!("Plugin `{name}` cancelled");
          break;
        }
        Err(_) => error!("Plugin `{name}` panicked"),
      }

      time::sleep(RESTART_DELAY).await;
    }
  }

  /// Runs every plugin under supervision until all of them are cancelled.
  pub async fn run(self, app: Arc<AppState>) {
    let mut set = JoinSet::new();
    for plugin in self.plugins {
      set.spawn(Self::supervise(plugin, app.clone()));
    }
    while set.join_next().await.is_some() {}
  }
}
