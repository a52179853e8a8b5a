//! Clock and identifier providers for the system under test
//!
//! A server that wants reproducible output takes a [`Providers`] handle and
//! asks it for time and identifiers instead of calling `Utc::now()` or
//! `Uuid::new_v4()` directly. In normal operation the handle delegates to the
//! system clock and random v4 UUIDs. Under test, [`Providers::redirect`] swaps
//! both strategies for remote ones that query the determinism service, and
//! the returned [`Redirection`] puts the originals back when dropped.
//!
//! ```no_run
//! # async fn demo() -> towel_determinism::DeterminismResult<()> {
//! use towel_determinism::Providers;
//!
//! let providers = Providers::system();
//! let _redirection = providers.redirect("http://127.0.0.1:8029")?;
//! // hand `providers` to the server before it accepts requests
//! let created_at = providers.now().await?;
//! # let _ = created_at;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::error::{DeterminismError, DeterminismResult};
use crate::server::{CLOCK_PATH, ID_PATH};

/// Source of the current time
#[async_trait]
pub trait Clock: Send + Sync {
    async fn now(&self) -> DeterminismResult<DateTime<Utc>>;
}

/// Source of fresh identifiers
#[async_trait]
pub trait IdSource: Send + Sync {
    async fn new_id(&self) -> DeterminismResult<Uuid>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    async fn now(&self) -> DeterminismResult<DateTime<Utc>> {
        Ok(Utc::now())
    }
}

/// Random version-4 UUIDs
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

#[async_trait]
impl IdSource for RandomIds {
    async fn new_id(&self) -> DeterminismResult<Uuid> {
        Ok(Uuid::new_v4())
    }
}

/// Clock backed by the determinism service
#[derive(Debug, Clone)]
pub struct RemoteClock {
    client: reqwest::Client,
    url: Url,
}

impl RemoteClock {
    pub fn new(client: reqwest::Client, base: &Url) -> DeterminismResult<Self> {
        Ok(Self {
            client,
            url: base.join(CLOCK_PATH)?,
        })
    }
}

#[async_trait]
impl Clock for RemoteClock {
    async fn now(&self) -> DeterminismResult<DateTime<Utc>> {
        let body = fetch(&self.client, &self.url).await?;
        let secs: i64 = body.parse().map_err(|_| DeterminismError::Malformed {
            what: "timestamp",
            body: body.clone(),
        })?;
        DateTime::from_timestamp(secs, 0).ok_or(DeterminismError::Malformed {
            what: "timestamp",
            body,
        })
    }
}

/// Identifier source backed by the determinism service
#[derive(Debug, Clone)]
pub struct RemoteIds {
    client: reqwest::Client,
    url: Url,
}

impl RemoteIds {
    pub fn new(client: reqwest::Client, base: &Url) -> DeterminismResult<Self> {
        Ok(Self {
            client,
            url: base.join(ID_PATH)?,
        })
    }
}

#[async_trait]
impl IdSource for RemoteIds {
    async fn new_id(&self) -> DeterminismResult<Uuid> {
        let body = fetch(&self.client, &self.url).await?;
        Uuid::parse_str(&body).map_err(|_| DeterminismError::Malformed {
            what: "identifier",
            body,
        })
    }
}

async fn fetch(client: &reqwest::Client, url: &Url) -> DeterminismResult<String> {
    let response = client.get(url.clone()).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DeterminismError::UnexpectedStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let body = response.text().await?;
    debug!("{} -> {}", url, body.trim());
    Ok(body.trim().to_string())
}

#[derive(Clone)]
struct Installed {
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdSource>,
}

/// Base providers plus one layer per live [`Redirection`], newest last
struct Layers {
    base: Installed,
    stack: Vec<(u64, Installed)>,
    next_id: u64,
}

impl Layers {
    fn active(&self) -> &Installed {
        self.stack.last().map(|(_, installed)| installed).unwrap_or(&self.base)
    }
}

/// Swappable clock and identifier strategies shared with the server
#[derive(Clone)]
pub struct Providers {
    layers: Arc<RwLock<Layers>>,
}

impl Providers {
    /// Wall clock and random identifiers
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock), Arc::new(RandomIds))
    }

    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdSource>) -> Self {
        Self {
            layers: Arc::new(RwLock::new(Layers {
                base: Installed { clock, ids },
                stack: Vec::new(),
                next_id: 0,
            })),
        }
    }

    pub async fn now(&self) -> DeterminismResult<DateTime<Utc>> {
        let clock = self.clock();
        clock.now().await
    }

    pub async fn new_id(&self) -> DeterminismResult<Uuid> {
        let ids = self.id_source();
        ids.new_id().await
    }

    /// Currently installed clock
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.layers.read().active().clock.clone()
    }

    /// Currently installed identifier source
    pub fn id_source(&self) -> Arc<dyn IdSource> {
        self.layers.read().active().ids.clone()
    }

    /// Install both strategies until the returned guard goes away.
    ///
    /// The newest live installation is the active one. Releasing a guard
    /// removes only its own layer, so guards may be released in any order.
    pub fn install(&self, clock: Arc<dyn Clock>, ids: Arc<dyn IdSource>) -> Redirection {
        let mut layers = self.layers.write();
        let id = layers.next_id;
        layers.next_id += 1;
        layers.stack.push((id, Installed { clock, ids }));
        Redirection {
            providers: self.clone(),
            layer: Some(id),
        }
    }

    /// Route time and identifier requests to the determinism service at `base_url`.
    pub fn redirect(&self, base_url: &str) -> DeterminismResult<Redirection> {
        let base = Url::parse(base_url)?;
        let client = reqwest::Client::new();
        let clock = RemoteClock::new(client.clone(), &base)?;
        let ids = RemoteIds::new(client, &base)?;

        info!("Redirecting clock and identifier providers to {}", base);
        Ok(self.install(Arc::new(clock), Arc::new(ids)))
    }
}

impl Default for Providers {
    fn default() -> Self {
        Self::system()
    }
}

/// Removes its installation when dropped
#[must_use = "dropping a Redirection immediately restores the previous providers"]
pub struct Redirection {
    providers: Providers,
    layer: Option<u64>,
}

impl Redirection {
    pub fn restore(mut self) {
        self.put_back();
    }

    fn put_back(&mut self) {
        if let Some(id) = self.layer.take() {
            self.providers.layers.write().stack.retain(|(layer, _)| *layer != id);
            info!("Restored clock and identifier providers");
        }
    }
}

impl Drop for Redirection {
    fn drop(&mut self) {
        self.put_back();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock(i64);

    #[async_trait]
    impl Clock for FixedClock {
        async fn now(&self) -> DeterminismResult<DateTime<Utc>> {
            Ok(DateTime::from_timestamp(self.0, 0).unwrap())
        }
    }

    struct FixedIds(Uuid);

    #[async_trait]
    impl IdSource for FixedIds {
        async fn new_id(&self) -> DeterminismResult<Uuid> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn test_install_and_restore() {
        let providers = Providers::system();
        let original_clock = providers.clock();
        let original_ids = providers.id_source();

        let redirection = providers.install(Arc::new(FixedClock(42)), Arc::new(FixedIds(Uuid::nil())));
        assert_eq!(providers.now().await.unwrap().timestamp(), 42);
        assert_eq!(providers.new_id().await.unwrap(), Uuid::nil());

        redirection.restore();
        assert!(Arc::ptr_eq(&providers.clock(), &original_clock));
        assert!(Arc::ptr_eq(&providers.id_source(), &original_ids));
    }

    #[tokio::test]
    async fn test_drop_restores_and_clones_share_slot() {
        let providers = Providers::system();
        let server_side = providers.clone();
        let original_clock = providers.clock();

        {
            let _redirection = providers.install(Arc::new(FixedClock(7)), Arc::new(RandomIds));
            assert_eq!(server_side.now().await.unwrap().timestamp(), 7);
        }

        assert!(Arc::ptr_eq(&server_side.clock(), &original_clock));
    }

    #[tokio::test]
    async fn test_nested_installs_unwind_in_order() {
        let providers = Providers::new(Arc::new(FixedClock(1)), Arc::new(RandomIds));

        let outer = providers.install(Arc::new(FixedClock(2)), Arc::new(RandomIds));
        let inner = providers.install(Arc::new(FixedClock(3)), Arc::new(RandomIds));
        assert_eq!(providers.now().await.unwrap().timestamp(), 3);

        drop(inner);
        assert_eq!(providers.now().await.unwrap().timestamp(), 2);
        drop(outer);
        assert_eq!(providers.now().await.unwrap().timestamp(), 1);
    }

    #[tokio::test]
    async fn test_out_of_order_release_still_restores_base() {
        let providers = Providers::new(Arc::new(FixedClock(1)), Arc::new(RandomIds));
        let base_clock = providers.clock();

        let outer = providers.install(Arc::new(FixedClock(2)), Arc::new(RandomIds));
        let inner = providers.install(Arc::new(FixedClock(3)), Arc::new(RandomIds));

        drop(outer);
        assert_eq!(providers.now().await.unwrap().timestamp(), 3);
        drop(inner);
        assert_eq!(providers.now().await.unwrap().timestamp(), 1);
        assert!(Arc::ptr_eq(&providers.clock(), &base_clock));
    }

    #[test]
    fn test_redirect_rejects_bad_url() {
        let providers = Providers::system();
        assert!(matches!(
            providers.redirect("not a url"),
            Err(DeterminismError::InvalidUrl(_))
        ));
    }
}
