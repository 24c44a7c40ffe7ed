// 地理编码缓存层 - 使用带过期时间的 LRU 缓存减少外部请求

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::GeocodeResult;

/// 缓存时长上限：30 天
pub const MAX_CACHE_TTL_SECS: u64 = 30 * 24 * 3600;

struct Entry {
    result: GeocodeResult,
    expires_at: Instant,
    tick: u64,
}

/// 简单的 LRU 缓存实现（按访问序号淘汰最旧项）
pub struct GeocodeCache {
    entries: HashMap<String, Entry>,
    max_size: usize,
    current_tick: u64,
}

impl GeocodeCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_size: max_size.max(1),
            current_tick: 0,
        }
    }

    /// 缓存键：地址各部分归一化后拼接
    pub fn key_for(parts: &[Option<&str>]) -> String {
        parts
            .iter()
            .flatten()
            .map(|part| part.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("|")
    }

    pub fn get(&mut self, key: &str, now: Instant) -> Option<GeocodeResult> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.expires_at <= now,
            None => return None,
        };
        if expired {
            self.entries.remove(key);
            return None;
        }

        self.current_tick += 1;
        let tick = self.current_tick;
        self.entries.get_mut(key).map(|entry| {
            entry.tick = tick;
            entry.result.clone()
        })
    }

    pub fn put(&mut self, key: String, result: GeocodeResult, ttl: Duration, now: Instant) {
        self.current_tick += 1;

        // 如果缓存已满，先移除过期项，仍然满则移除最久未访问的项
        if self.entries.len() >= self.max_size && !self.entries.contains_key(&key) {
            self.entries.retain(|_, entry| entry.expires_at > now);
            if self.entries.len() >= self.max_size {
                if let Some(oldest_key) = self.find_oldest_key() {
                    self.entries.remove(&oldest_key);
                }
            }
        }

        let ttl = ttl.min(Duration::from_secs(MAX_CACHE_TTL_SECS));
        let expires_at = now.checked_add(ttl).unwrap_or(now);
        self.entries.insert(
            key,
            Entry {
                result,
                expires_at,
                tick: self.current_tick,
            },
        );
    }

    /// 调整容量，超出部分按最久未访问淘汰
    pub fn resize(&mut self, max_size: usize) {
        self.max_size = max_size.max(1);
        while self.entries.len() > self.max_size {
            match self.find_oldest_key() {
                Some(oldest_key) => {
                    self.entries.remove(&oldest_key);
                }
                None => break,
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_tick = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find_oldest_key(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by_key(|(_, entry)| entry.tick)
            .map(|(key, _)| key.clone())
    }
}
