//! 沙特主要城市中心坐标，用于地理编码降级与城市名称归一化

use super::bounds::Coordinates;

/// 城市信息
#[derive(Debug, Clone, Copy)]
pub struct City {
    /// 规范名称（英文）
    pub name: &'static str,
    /// 阿拉伯语名称
    pub name_ar: &'static str,
    /// 其他拼写
    pub aliases: &'static [&'static str],
    pub lat: f64,
    pub lng: f64,
}

impl City {
    pub fn center(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }
}

/// 城市未知时使用的默认中心（利雅得）
pub const DEFAULT_CITY: &str = "riyadh";

pub const CITIES: &[City] = &[
    City { name: "riyadh", name_ar: "الرياض", aliases: &["ar riyadh", "ar-riyadh", "riyad"], lat: 24.7136, lng: 46.6753 },
    City { name: "jeddah", name_ar: "جدة", aliases: &["jiddah", "jedda"], lat: 21.4858, lng: 39.1925 },
    City { name: "mecca", name_ar: "مكة المكرمة", aliases: &["makkah", "مكة", "makkah al mukarramah"], lat: 21.3891, lng: 39.8579 },
    City { name: "medina", name_ar: "المدينة المنورة", aliases: &["madinah", "al madinah", "المدينة"], lat: 24.5247, lng: 39.5692 },
    City { name: "dammam", name_ar: "الدمام", aliases: &["ad dammam"], lat: 26.4207, lng: 50.0888 },
    City { name: "khobar", name_ar: "الخبر", aliases: &["al khobar", "al-khobar"], lat: 26.2172, lng: 50.1971 },
    City { name: "dhahran", name_ar: "الظهران", aliases: &["az zahran"], lat: 26.2361, lng: 50.0393 },
    City { name: "taif", name_ar: "الطائف", aliases: &["at taif", "al taif"], lat: 21.2854, lng: 40.4183 },
    City { name: "tabuk", name_ar: "تبوك", aliases: &["tabouk"], lat: 28.3835, lng: 36.5662 },
    City { name: "buraidah", name_ar: "بريدة", aliases: &["buraydah"], lat: 26.3260, lng: 43.9750 },
    City { name: "unaizah", name_ar: "عنيزة", aliases: &["unayzah"], lat: 26.0842, lng: 43.9936 },
    City { name: "abha", name_ar: "أبها", aliases: &["ابها"], lat: 18.2164, lng: 42.5053 },
    City { name: "khamis mushait", name_ar: "خميس مشيط", aliases: &["khamis mushayt"], lat: 18.3000, lng: 42.7333 },
    City { name: "hail", name_ar: "حائل", aliases: &["ha'il"], lat: 27.5114, lng: 41.7208 },
    City { name: "najran", name_ar: "نجران", aliases: &[], lat: 17.5656, lng: 44.2289 },
    City { name: "jazan", name_ar: "جازان", aliases: &["jizan", "gizan", "جيزان"], lat: 16.8892, lng: 42.5511 },
    City { name: "yanbu", name_ar: "ينبع", aliases: &["yenbo"], lat: 24.0895, lng: 38.0618 },
    City { name: "hofuf", name_ar: "الهفوف", aliases: &["al hofuf", "al ahsa", "al-ahsa", "الأحساء", "الاحساء"], lat: 25.3833, lng: 49.5833 },
    City { name: "jubail", name_ar: "الجبيل", aliases: &["al jubail"], lat: 27.0174, lng: 49.6225 },
    City { name: "qatif", name_ar: "القطيف", aliases: &["al qatif"], lat: 26.5196, lng: 50.0115 },
    City { name: "kharj", name_ar: "الخرج", aliases: &["al kharj"], lat: 24.1556, lng: 47.3120 },
    City { name: "arar", name_ar: "عرعر", aliases: &[], lat: 30.9753, lng: 41.0381 },
    City { name: "sakaka", name_ar: "سكاكا", aliases: &["skaka"], lat: 29.9697, lng: 40.2064 },
];

/// 归一化城市名称：去空白、转小写、合并连续空白
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// 按名称（英文、阿拉伯语或别名）查找城市
pub fn find_city(raw: &str) -> Option<&'static City> {
    let name = normalize_name(raw);
    if name.is_empty() {
        return None;
    }
    CITIES.iter().find(|city| {
        city.name == name
            || normalize_name(city.name_ar) == name
            || city.aliases.iter().any(|alias| normalize_name(alias) == name)
    })
}

/// 默认城市
pub fn default_city() -> &'static City {
    // 表中第一项即默认城市
    CITIES
        .iter()
        .find(|city| city.name == DEFAULT_CITY)
        .unwrap_or(&CITIES[0])
}

/// 城市名称的规范形式，未知城市返回归一化后的原文
pub fn canonical_city_name(raw: &str) -> String {
    find_city(raw)
        .map(|city| city.name.to_string())
        .unwrap_or_else(|| normalize_name(raw))
}
