// 时间曲线 - 一天内的活跃度与累计曲线、月内周期系数

/// 每小时活跃系数（本地时间 0 点到 23 点）
///
/// 凌晨最低，午后回升，晚间 20-22 点达到峰值
pub const HOURLY_CURVE: [f64; 24] = [
    0.35, 0.25, 0.18, 0.15, 0.15, 0.20, 0.30, 0.45, 0.60, 0.75, 0.85, 0.90, //
    0.85, 0.80, 0.85, 0.95, 1.05, 1.15, 1.25, 1.35, 1.45, 1.50, 1.35, 0.80,
];

/// 请求累计曲线（分钟, 占全天比例）
pub const REQUESTS_CURVE: &[(f64, f64)] = &[
    (0.0, 0.0),
    (360.0, 0.04),
    (540.0, 0.15),
    (720.0, 0.35),
    (960.0, 0.55),
    (1200.0, 0.82),
    (1380.0, 0.97),
    (1440.0, 1.0),
];

/// 成交累计曲线，整体比请求更偏向傍晚
pub const DEALS_CURVE: &[(f64, f64)] = &[
    (0.0, 0.0),
    (480.0, 0.02),
    (720.0, 0.20),
    (1020.0, 0.50),
    (1260.0, 0.88),
    (1440.0, 1.0),
];

/// 按分钟插值的小时系数，23 点之后回绕到 0 点
pub fn hour_multiplier(minute_of_day: f64) -> f64 {
    let minute = minute_of_day.clamp(0.0, 1439.999);
    let hour = (minute / 60.0).floor() as usize;
    let next = (hour + 1) % 24;
    let t = (minute - hour as f64 * 60.0) / 60.0;
    HOURLY_CURVE[hour] + (HOURLY_CURVE[next] - HOURLY_CURVE[hour]) * t
}

/// 分段线性累计函数，超出首尾时取端点值
pub fn accumulate(points: &[(f64, f64)], minute: f64) -> f64 {
    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return 0.0,
    };
    if minute <= first.0 {
        return first.1;
    }
    if minute >= last.0 {
        return last.1;
    }

    for pair in points.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if minute <= x1 {
            let t = (minute - x0) / (x1 - x0);
            return y0 + (y1 - y0) * t;
        }
    }
    last.1
}

/// 平滑插值系数（smoothstep）
pub fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// 月内周期
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthPeriod {
    /// 1-5 日
    EarlyMonth,
    /// 6-20 日
    MidMonth,
    /// 21-26 日
    LateMonth,
    /// 27 日起（发薪周）
    SalaryWeek,
}

impl MonthPeriod {
    pub fn from_day(day: u32) -> Self {
        match day {
            0..=5 => Self::EarlyMonth,
            6..=20 => Self::MidMonth,
            21..=26 => Self::LateMonth,
            _ => Self::SalaryWeek,
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            Self::EarlyMonth => 1.10,
            Self::MidMonth => 0.95,
            Self::LateMonth => 1.00,
            Self::SalaryWeek => 1.20,
        }
    }
}
