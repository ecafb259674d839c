//! Price events and cumulative valuation.
//!
//! A card held `n` times contributes `n` unit events at its current price. The
//! first is stamped at acquisition, the rest at the last update. Summing those
//! events in order gives the value-over-time series the charts are built from.

use bigdecimal::{BigDecimal, Zero};

use crate::models::{round_cents, Card, PriceEntry};

/// One event per unit held. A non-positive quantity yields no events.
pub fn expand(card: &Card) -> Vec<PriceEntry> {
    let count = card.quantity.max(0) as usize;

    (0..count)
        .map(|i| {
            let timestamp = if i == 0 { card.acquired_at } else { card.updated_at };
            PriceEntry::derived(card.price.clone(), timestamp)
        })
        .collect()
}

/// Expands every card, earliest acquisition first.
pub fn expand_all(cards: &[Card]) -> Vec<PriceEntry> {
    let mut ordered: Vec<&Card> = cards.iter().collect();
    ordered.sort_by_key(|card| card.acquired_at);

    ordered.into_iter().flat_map(|card| expand(card)).collect()
}

/// Running sum of event values. The sum is exact; only the emitted values are rounded.
pub fn accumulate(events: &[PriceEntry]) -> Vec<PriceEntry> {
    let mut running = BigDecimal::zero();

    events
        .iter()
        .map(|event| {
            running = &running + &event.value;
            PriceEntry::derived(round_cents(&running), event.timestamp)
        })
        .collect()
}

/// Total value of a card's current holding, as the last point of its accumulated events.
pub fn current_value(card: &Card) -> BigDecimal {
    accumulate(&expand(card))
        .pop()
        .map(|entry| entry.value)
        .unwrap_or_else(BigDecimal::zero)
}
