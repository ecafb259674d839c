use async_trait::async_trait;
use bigdecimal::BigDecimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PriceSourceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited")]
    RateLimited,

    #[error("timed out after {0}s")]
    Timeout(u64),
}

/// Current market price lookup for a card, by name.
///
/// `Ok(None)` means the catalog has no price for the card.
#[async_trait]
pub trait CardPriceSource: Send + Sync {
    async fn fetch_price(&self, card_name: &str) -> Result<Option<BigDecimal>, PriceSourceError>;
}
