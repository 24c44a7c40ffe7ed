// 每日种子与确定性噪声
//
// 种子只由本地日期决定，噪声只由 (种子, 流, 序号) 决定，
// 因此不同进程在同一时刻得到完全相同的数字

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use tracing::debug;

/// 噪声流 - 不同用途使用独立的随机序列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseStream {
    /// 在线人数的平滑随机游走
    Walk = 1,
    /// 在线人数的逐槽抖动
    Jitter = 2,
    /// 请求数噪声
    RequestNoise = 3,
    /// 成交数噪声
    DealNoise = 4,
    /// 每日系数
    DayFactor = 5,
}

/// 把 ISO 日期字符串压缩为 32 位有符号整数（h = h * 31 + byte，按 i32 回绕）
pub fn date_hash(iso_date: &str) -> i32 {
    iso_date
        .bytes()
        .fold(0i32, |h, b| h.wrapping_mul(31).wrapping_add(b as i32))
}

/// [0, 1) 区间的确定性噪声
pub fn unit_noise(seed: i32, stream: NoiseStream, index: u64) -> f64 {
    let key = ((seed as u32 as u64) << 32) | ((stream as u64) << 24) | (index & 0x00FF_FFFF);
    StdRng::seed_from_u64(key).gen::<f64>()
}

/// [-1, 1) 区间的确定性噪声
pub fn signed_noise(seed: i32, stream: NoiseStream, index: u64) -> f64 {
    unit_noise(seed, stream, index) * 2.0 - 1.0
}

#[derive(Debug, Clone, Copy)]
struct CachedSeed {
    date: NaiveDate,
    seed: i32,
}

/// 每日种子缓存 - 日期变化时才重新计算
#[derive(Debug, Default)]
pub struct DailySeedCache {
    state: Mutex<Option<CachedSeed>>,
}

impl DailySeedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指定日期的种子，日期未变时直接返回缓存值
    pub fn seed_for(&self, date: NaiveDate) -> i32 {
        // 缓存内容是纯函数结果，锁中毒时继续使用内部值即可
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(cached) = *guard {
            if cached.date == date {
                return cached.seed;
            }
        }

        let iso = date.format("%Y-%m-%d").to_string();
        let seed = date_hash(&iso);
        debug!("每日种子已更新: {} -> {}", iso, seed);
        *guard = Some(CachedSeed { date, seed });
        seed
    }

    /// 当前缓存对应的日期
    pub fn cached_date(&self) -> Option<NaiveDate> {
        let guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.map(|cached| cached.date)
    }
}
