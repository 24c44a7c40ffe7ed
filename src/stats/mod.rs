//! 实时活动统计生成器
//!
//! 为首页展示生成三个数字：当前在线人数、今日累计请求数、今日累计成交数。
//! 所有结果只取决于 (本地日期, 5 秒时间槽)，不同进程、不同用户在同一时刻看到的数字一致，
//! 无需共享数据库。唯一的内部状态是按日期缓存的每日种子。

pub mod curves;
pub mod seed;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use curves::{accumulate, hour_multiplier, smoothstep, MonthPeriod, DEALS_CURVE, REQUESTS_CURVE};
use seed::{signed_noise, unit_noise, DailySeedCache, NoiseStream};

/// 时间槽长度（秒）
pub const SLOT_SECONDS: u32 = 5;
/// 随机游走锚点间隔（分钟）
const KNOT_MINUTES: u32 = 5;
const SLOTS_PER_KNOT: u32 = KNOT_MINUTES * 60 / SLOT_SECONDS;

// 在线人数参数
const VIEWERS_BASE: f64 = 48.0;
const VIEWERS_MIN: u32 = 7;
const VIEWERS_MAX: u32 = 160;
const VIEWERS_JITTER: f64 = 2.0;
const WALK_AMPLITUDE: f64 = 0.18;
const WALK_REVERSION: f64 = 0.82;
const WALK_STEP: f64 = 0.18;

// 累计请求参数
const REQUESTS_DAILY_BASE: f64 = 260.0;
pub const REQUESTS_NOISE: f64 = 2.0;
const REQUESTS_MAX: u32 = 600;
const REQUEST_BUCKET_SLOTS: u32 = 15 * 60 / SLOT_SECONDS;

// 累计成交参数
const DEALS_DAILY_BASE: f64 = 14.0;
const DEALS_NOISE: f64 = 1.0;
const DEALS_MAX: u32 = 45;
const DEAL_BUCKET_SLOTS: u32 = 30 * 60 / SLOT_SECONDS;

/// 某一时刻的统计快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStats {
    /// 当前在线人数
    pub viewers: u32,
    /// 今日累计请求数
    pub requests: u32,
    /// 今日累计成交数
    pub deals: u32,
    /// 本地日期
    pub date: NaiveDate,
    /// 当日时间槽序号
    pub slot: u32,
}

/// 统计生成器
#[derive(Debug)]
pub struct StatsEngine {
    offset: FixedOffset,
    seeds: DailySeedCache,
}

impl StatsEngine {
    /// 创建生成器
    ///
    /// # 参数
    /// - `utc_offset_minutes`: 本地时间相对 UTC 的偏移（分钟）
    pub fn new(utc_offset_minutes: i32) -> Result<Self> {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60)
            .ok_or_else(|| anyhow!("无效的时区偏移: {} 分钟", utc_offset_minutes))?;
        Ok(Self {
            offset,
            seeds: DailySeedCache::new(),
        })
    }

    pub fn utc_offset_minutes(&self) -> i32 {
        self.offset.local_minus_utc() / 60
    }

    /// 当前本地时间
    pub fn local_now(&self) -> NaiveDateTime {
        self.to_local(Utc::now())
    }

    fn to_local(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.with_timezone(&self.offset).naive_local()
    }

    pub fn get_viewers(&self) -> u32 {
        self.viewers_at(self.local_now())
    }

    pub fn get_requests(&self) -> u32 {
        self.requests_at(self.local_now())
    }

    pub fn get_deals(&self) -> u32 {
        self.deals_at(self.local_now())
    }

    /// 当前时刻的完整快照
    pub fn snapshot(&self) -> LiveStats {
        self.snapshot_at_utc(Utc::now())
    }

    pub fn snapshot_at_utc(&self, now: DateTime<Utc>) -> LiveStats {
        self.snapshot_at(self.to_local(now))
    }

    pub fn snapshot_at(&self, at: NaiveDateTime) -> LiveStats {
        let (seed, slot) = self.resolve(at);
        let date = at.date();
        LiveStats {
            viewers: viewers_for(seed, date, slot),
            requests: requests_for(seed, date, slot),
            deals: deals_for(seed, date, slot),
            date,
            slot,
        }
    }

    pub fn viewers_at(&self, at: NaiveDateTime) -> u32 {
        let (seed, slot) = self.resolve(at);
        viewers_for(seed, at.date(), slot)
    }

    pub fn requests_at(&self, at: NaiveDateTime) -> u32 {
        let (seed, slot) = self.resolve(at);
        requests_for(seed, at.date(), slot)
    }

    pub fn deals_at(&self, at: NaiveDateTime) -> u32 {
        let (seed, slot) = self.resolve(at);
        deals_for(seed, at.date(), slot)
    }

    /// 当前缓存的种子日期
    pub fn seed_date(&self) -> Option<NaiveDate> {
        self.seeds.cached_date()
    }

    fn resolve(&self, at: NaiveDateTime) -> (i32, u32) {
        let seed = self.seeds.seed_for(at.date());
        (seed, slot_of(at))
    }
}

/// 时间所在的 5 秒槽序号
pub fn slot_of(at: NaiveDateTime) -> u32 {
    at.time().num_seconds_from_midnight() / SLOT_SECONDS
}

fn slot_minutes(slot: u32) -> f64 {
    (slot * SLOT_SECONDS) as f64 / 60.0
}

/// 平滑随机游走，取值范围 [-1, 1]
///
/// 锚点 w_k = 0.82 * w_{k-1} + 0.18 * s_k，每次调用从当天第一个锚点重新推导，
/// 相邻锚点之间用 smoothstep 插值
fn walk_value(seed: i32, slot: u32) -> f64 {
    let knot = slot / SLOTS_PER_KNOT;
    let t = (slot % SLOTS_PER_KNOT) as f64 / SLOTS_PER_KNOT as f64;

    let mut w = signed_noise(seed, NoiseStream::Walk, 0);
    let mut from = w;
    let mut to = w;
    for k in 1..=knot + 1 {
        w = WALK_REVERSION * w + WALK_STEP * signed_noise(seed, NoiseStream::Walk, k as u64);
        if k == knot {
            from = w;
        }
        if k == knot + 1 {
            to = w;
        }
    }

    from + (to - from) * smoothstep(t)
}

fn viewers_for(seed: i32, date: NaiveDate, slot: u32) -> u32 {
    let minute = slot_minutes(slot);
    let base = VIEWERS_BASE * hour_multiplier(minute) * MonthPeriod::from_day(date.day()).multiplier();
    let walk = walk_value(seed, slot);
    let jitter = (signed_noise(seed, NoiseStream::Jitter, slot as u64) * VIEWERS_JITTER).round();
    let value = (base * (1.0 + WALK_AMPLITUDE * walk) + jitter).round();
    value.clamp(VIEWERS_MIN as f64, VIEWERS_MAX as f64) as u32
}

/// 请求数的无噪声基线
fn requests_base(seed: i32, date: NaiveDate, slot: u32) -> f64 {
    let day_factor = 0.85 + 0.30 * unit_noise(seed, NoiseStream::DayFactor, 0);
    let total = REQUESTS_DAILY_BASE * day_factor * MonthPeriod::from_day(date.day()).multiplier();
    total * accumulate(REQUESTS_CURVE, slot_minutes(slot))
}

fn requests_for(seed: i32, date: NaiveDate, slot: u32) -> u32 {
    let bucket = (slot / REQUEST_BUCKET_SLOTS) as u64;
    let noise = signed_noise(seed, NoiseStream::RequestNoise, bucket) * REQUESTS_NOISE;
    let value = (requests_base(seed, date, slot) + noise).round();
    value.clamp(0.0, REQUESTS_MAX as f64) as u32
}

fn deals_for(seed: i32, date: NaiveDate, slot: u32) -> u32 {
    let day_factor = 0.80 + 0.40 * unit_noise(seed, NoiseStream::DayFactor, 1);
    let total = DEALS_DAILY_BASE * day_factor * MonthPeriod::from_day(date.day()).multiplier();
    let bucket = (slot / DEAL_BUCKET_SLOTS) as u64;
    let noise = signed_noise(seed, NoiseStream::DealNoise, bucket) * DEALS_NOISE;
    let value = (total * accumulate(DEALS_CURVE, slot_minutes(slot)) + noise).round();
    let deals = value.clamp(0.0, DEALS_MAX as f64) as u32;
    // 成交不能超过同一时刻的请求数
    deals.min(requests_for(seed, date, slot))
}
