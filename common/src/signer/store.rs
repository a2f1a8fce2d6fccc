use log::debug;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct Entry<S> {
    value: S,
    created: Instant,
}

/// ハッシュ化トークン (radix-32 文字列) をキーにした、署名者の一時的な秘密値の表
///
/// 値は署名ラウンドで取り出されると削除され、TTL を過ぎたものは取り出せない。
pub struct SessionStore<S> {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry<S>>>,
}

impl<S> SessionStore<S> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn is_expired(&self, entry: &Entry<S>, now: Instant) -> bool {
        now.duration_since(entry.created) >= self.ttl
    }

    /// 同じトークンの既存の値は置き換える
    pub async fn insert(&self, key: String, value: S) {
        let mut entries = self.entries.lock().await;
        if entries
            .insert(
                key,
                Entry {
                    value,
                    created: Instant::now(),
                },
            )
            .is_some()
        {
            debug!("SessionStore: replaced pending session");
        }
    }

    /// 値を取り出して削除する。期限切れの場合は None
    pub async fn take(&self, key: &str) -> Option<S> {
        let entry = self.entries.lock().await.remove(key)?;
        if self.is_expired(&entry, Instant::now()) {
            debug!("SessionStore: session expired");
            return None;
        }
        Some(entry.value)
    }

    /// 期限切れの値を削除し、削除した件数を返す
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.created) < self.ttl);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
