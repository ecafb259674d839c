use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::{BigDecimal, Signed};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::external::price_source::{CardPriceSource, PriceSourceError};
use crate::services::rate_limiter::RateLimiter;

/// Card price lookups against the YGOPRODeck card catalog.
pub struct YgoProDeckProvider {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: Arc<RateLimiter>,
}

impl YgoProDeckProvider {
    pub fn new(base_url: &str, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CardInfoResponse {
    #[serde(default)]
    data: Vec<CardInfo>,
}

#[derive(Debug, Deserialize)]
struct CardInfo {
    name: String,
    #[serde(default)]
    card_prices: Vec<CardPrices>,
}

#[derive(Debug, Deserialize)]
struct CardPrices {
    tcgplayer_price: Option<String>,
}

#[async_trait]
impl CardPriceSource for YgoProDeckProvider {
    async fn fetch_price(&self, card_name: &str) -> Result<Option<BigDecimal>, PriceSourceError> {
        let url = format!("{}/cardinfo.php", self.base_url);

        let _guard = self.rate_limiter.acquire().await;

        let resp = self
            .client
            .get(&url)
            .query(&[("name", card_name)])
            .send()
            .await
            .map_err(|e| PriceSourceError::Network(e.to_string()))?;

        // The catalog answers unknown names with 400
        match resp.status() {
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => return Ok(None),
            StatusCode::TOO_MANY_REQUESTS => return Err(PriceSourceError::RateLimited),
            status if !status.is_success() => {
                return Err(PriceSourceError::BadResponse(format!("HTTP {}", status)));
            }
            _ => {}
        }

        let body: CardInfoResponse = resp
            .json()
            .await
            .map_err(|e| PriceSourceError::Parse(e.to_string()))?;

        parse_price(body, card_name)
    }
}

fn parse_price(body: CardInfoResponse, card_name: &str) -> Result<Option<BigDecimal>, PriceSourceError> {
    let Some(card) = body.data.into_iter().next() else {
        return Ok(None);
    };

    let raw = card
        .card_prices
        .into_iter()
        .next()
        .and_then(|prices| prices.tcgplayer_price);

    let Some(raw) = raw else {
        debug!("No TCGplayer price listed for {}", card.name);
        return Ok(None);
    };

    let price = BigDecimal::from_str(raw.trim())
        .map_err(|e| PriceSourceError::Parse(format!("{} price {:?}: {}", card_name, raw, e)))?;

    // Unlisted cards come back as 0.00
    if !price.is_positive() {
        return Ok(None);
    }
    Ok(Some(price))
}
