//! Process-wide account cache. Lazily walks the platform's paginated
//! account list, keeps a 30-minute snapshot, and ranks name matches by
//! exactness. Refreshes serialize on an async mutex; readers only ever see
//! a complete snapshot swapped in atomically.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use mb_domain::Result;

use crate::platform::{PlatformAccount, PlatformClient};

const CACHE_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Clone, Default)]
struct Snapshot {
    accounts: Arc<Vec<PlatformAccount>>,
    last_refresh: Option<Instant>,
}

pub struct AccountCache {
    client: Arc<PlatformClient>,
    snapshot: RwLock<Snapshot>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl AccountCache {
    pub fn new(client: Arc<PlatformClient>) -> Self {
        Self {
            client,
            snapshot: RwLock::new(Snapshot::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn snapshot_if_fresh(&self) -> Option<Arc<Vec<PlatformAccount>>> {
        let snap = self.snapshot.read();
        match snap.last_refresh {
            Some(at) if at.elapsed() <= CACHE_TTL && !snap.accounts.is_empty() => {
                Some(snap.accounts.clone())
            }
            _ => None,
        }
    }

    async fn refreshed_accounts(&self) -> Result<Arc<Vec<PlatformAccount>>> {
        if let Some(accounts) = self.snapshot_if_fresh() {
            return Ok(accounts);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        if let Some(accounts) = self.snapshot_if_fresh() {
            return Ok(accounts);
        }

        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self.client.accounts_page(cursor.as_deref()).await?;
            all.extend(page.accounts);
            if !page.has_next {
                break;
            }
            cursor = page.end_cursor;
        }
        tracing::info!(count = all.len(), "account cache refreshed");

        let accounts = Arc::new(all);
        *self.snapshot.write() = Snapshot {
            accounts: accounts.clone(),
            last_refresh: Some(Instant::now()),
        };
        Ok(accounts)
    }

    /// Case-insensitive substring search over business names, refreshing
    /// the cache when stale. Exact matches first, then prefix matches,
    /// then other substrings; stable within each rank.
    pub async fn search(&self, name: &str) -> Result<Vec<PlatformAccount>> {
        let accounts = self.refreshed_accounts().await?;
        Ok(rank_matches(&accounts, name))
    }
}

fn rank_matches(accounts: &[PlatformAccount], query: &str) -> Vec<PlatformAccount> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return Vec::new();
    }

    let mut ranked: Vec<(u8, usize, &PlatformAccount)> = accounts
        .iter()
        .enumerate()
        .filter_map(|(idx, acc)| {
            let name = acc.business_name.to_lowercase();
            let rank = if name == q {
                0
            } else if name.starts_with(&q) {
                1
            } else if name.contains(&q) {
                2
            } else {
                return None;
            };
            Some((rank, idx, acc))
        })
        .collect();
    ranked.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    ranked.into_iter().map(|(_, _, acc)| acc.clone()).collect()
}
