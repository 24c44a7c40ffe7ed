//! 匹配评分接口

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiResult};
use crate::matching::{rank_matches, score_match};
use crate::models::{BuyerPreference, MatchBreakdown, PropertyListing};
use crate::AppState;

/// 单次排序的房源数量上限
const MAX_RANK_LISTINGS: usize = 1000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/matches/score", post(score))
        .route("/api/matches/rank", post(rank))
}

#[derive(Debug, Deserialize)]
struct ScoreRequest {
    preference: BuyerPreference,
    listing: PropertyListing,
}

async fn score(
    State(state): State<AppState>,
    Json(request): Json<ScoreRequest>,
) -> ApiResult<MatchBreakdown> {
    let settings = state.market.get_matching().await;
    let breakdown = score_match(
        &request.preference,
        &request.listing,
        &settings.weights,
        settings.threshold,
    )?;
    Ok(Json(breakdown))
}

#[derive(Debug, Deserialize)]
struct RankRequest {
    preference: BuyerPreference,
    listings: Vec<PropertyListing>,
    /// 覆盖配置中的阈值
    #[serde(default)]
    threshold: Option<u8>,
}

#[derive(Debug, Serialize)]
struct RankResponse {
    evaluated: usize,
    threshold: u8,
    matches: Vec<MatchBreakdown>,
}

async fn rank(
    State(state): State<AppState>,
    Json(request): Json<RankRequest>,
) -> ApiResult<RankResponse> {
    if request.listings.len() > MAX_RANK_LISTINGS {
        return Err(ApiError::bad_request(format!(
            "عدد العقارات يتجاوز الحد الأقصى ({})",
            MAX_RANK_LISTINGS
        )));
    }

    let settings = state.market.get_matching().await;
    let threshold = request.threshold.unwrap_or(settings.threshold).min(100);
    let matches = rank_matches(
        &request.preference,
        &request.listings,
        &settings.weights,
        threshold,
    )?;

    Ok(Json(RankResponse {
        evaluated: request.listings.len(),
        threshold,
        matches,
    }))
}

#[cfg(test)]
mod tests {
    use crate::commands::test_support::*;
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    fn preference() -> Value {
        json!({
            "city": "Jeddah",
            "districts": ["Al Rawdah"],
            "property_types": ["apartment"],
            "min_price": 500000.0,
            "max_price": 700000.0,
            "min_bedrooms": 2
        })
    }

    fn listing(id: &str, city: &str, price: f64) -> Value {
        json!({
            "id": id,
            "city": city,
            "district": "Al Rawdah",
            "property_type": "apartment",
            "price": price,
            "bedrooms": 3
        })
    }

    #[tokio::test]
    async fn test_score_endpoint() {
        let app = test_app(None, false).await;
        let (status, _, body) = send(
            &app.router,
            json_request(
                "POST",
                "/api/matches/score",
                json!({"preference": preference(), "listing": listing("L-1", "جدة", 650000.0)}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["listing_id"], "L-1");
        assert_eq!(body["total"], 100);
        assert_eq!(body["is_match"], true);
        assert_eq!(body["components"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_score_rejects_invalid_preference() {
        let app = test_app(None, false).await;
        let mut pref = preference();
        pref["min_price"] = json!(900000.0);
        let (status, _, body) = send(
            &app.router,
            json_request(
                "POST",
                "/api/matches/score",
                json!({"preference": pref, "listing": listing("L-1", "Jeddah", 650000.0)}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_rank_endpoint_filters_and_sorts() {
        let app = test_app(None, false).await;
        let listings = json!([
            listing("L-3", "Jeddah", 650000.0),
            listing("L-2", "Riyadh", 650000.0),
            listing("L-1", "Jeddah", 650000.0),
            listing("L-4", "Jeddah", 735000.0)
        ]);
        let (status, _, body) = send(
            &app.router,
            json_request(
                "POST",
                "/api/matches/rank",
                json!({"preference": preference(), "listings": listings.clone()}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["evaluated"], 4);
        assert_eq!(body["threshold"], 60);

        let ids: Vec<&str> = body["matches"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["listing_id"].as_str().unwrap())
            .collect();
        // L-2 城市不符得 75 分，L-4 价格超出 5% 得 94 分
        assert_eq!(ids, vec!["L-1", "L-3", "L-4", "L-2"]);

        let (_, _, body) = send(
            &app.router,
            json_request(
                "POST",
                "/api/matches/rank",
                json!({"preference": preference(), "listings": listings, "threshold": 80}),
            ),
        )
        .await;
        assert_eq!(body["matches"].as_array().unwrap().len(), 3);
    }
}
