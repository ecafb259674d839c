//! Per-card and per-collection state transitions used by the reconciliation job.
//!
//! These are pure functions over in-memory entities; fetching and persistence
//! stay in the job.

use bigdecimal::{BigDecimal, Signed, Zero};
use chrono::{DateTime, Utc};

use crate::models::{round_cents, Card, Collection, CollectionStatistics, PriceChangeRecord, PriceEntry};
use crate::services::{chart_service, history_service, price_event_service};

/// Smallest absolute price movement recorded as a change.
pub fn price_epsilon() -> BigDecimal {
    BigDecimal::new(1.into(), 2)
}

/// Applies a freshly fetched price to a card.
///
/// Returns the change record when the price moved by at least one cent against
/// the card's reference price; otherwise the card is left untouched.
pub fn apply_price_update(
    card: &mut Card,
    collection_name: &str,
    fetched_price: &BigDecimal,
    now: DateTime<Utc>,
) -> Option<PriceChangeRecord> {
    let old_price = card.reference_price().clone();
    let difference = fetched_price - &old_price;

    if difference.abs() < price_epsilon() {
        return None;
    }

    let new_price = round_cents(fetched_price);
    let record = PriceChangeRecord::new(now, collection_name, &card.name, old_price, new_price.clone());

    let previous = card
        .latest_price
        .take()
        .unwrap_or_else(|| PriceEntry::derived(card.price.clone(), card.updated_at));
    card.last_saved_price = Some(previous);
    card.latest_price = Some(PriceEntry::derived(new_price.clone(), now));
    card.price = new_price.clone();
    card.updated_at = now;

    card.price_history.push(PriceEntry::derived(new_price.clone(), now));
    let held_value = price_event_service::current_value(card);
    card.value_history.push(PriceEntry::derived(held_value, now));
    card.price_change_history.push(record.clone());

    if history_service::daily_entry_due(&card.daily_price_history, now) {
        card.daily_price_history.push(PriceEntry::derived(new_price, now));
    }

    Some(record)
}

/// Recomputes everything a collection derives from its cards after a pass.
pub fn refresh_collection(
    collection: &mut Collection,
    cards: &[Card],
    changes: &[PriceChangeRecord],
    now: DateTime<Utc>,
) {
    let previous_total = collection.total_price.clone();
    let total_price = round_cents(
        &cards
            .iter()
            .map(|card| card.held_value())
            .fold(BigDecimal::zero(), |acc, value| acc + value),
    );
    let total_quantity = cards.iter().map(|card| card.quantity.max(0)).sum();

    collection.statistics = compute_statistics(cards, &previous_total, &total_price, total_quantity);
    collection.total_quantity = total_quantity;

    if total_price != previous_total || collection.collection_value_history.is_empty() {
        collection
            .collection_value_history
            .push(PriceEntry::derived(total_price.clone(), now));
    }
    collection.total_price = total_price;

    collection
        .collection_price_change_history
        .extend(changes.iter().cloned());

    collection.window_series = chart_service::build_window_map(cards, now);
    collection.chart_data = chart_service::assemble(&collection.window_series);
    collection.updated_at = now;
}

fn compute_statistics(
    cards: &[Card],
    previous_total: &BigDecimal,
    total_price: &BigDecimal,
    total_quantity: i32,
) -> CollectionStatistics {
    let held: Vec<&BigDecimal> = cards
        .iter()
        .filter(|card| card.quantity > 0)
        .map(|card| &card.price)
        .collect();

    let high_point = held.iter().copied().max().cloned().unwrap_or_else(BigDecimal::zero);
    let low_point = held.iter().copied().min().cloned().unwrap_or_else(BigDecimal::zero);

    let average_price = if total_quantity > 0 {
        round_cents(&(total_price / &BigDecimal::from(total_quantity)))
    } else {
        BigDecimal::zero()
    };

    let percentage_change = if previous_total.is_positive() {
        let change = (total_price - previous_total) * BigDecimal::from(100);
        round_cents(&(change / previous_total))
    } else {
        BigDecimal::zero()
    };

    CollectionStatistics {
        high_point,
        low_point,
        average_price,
        percentage_change,
    }
}
