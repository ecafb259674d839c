mod card;
mod chart;
mod collection;
mod price_change;
mod price_entry;
pub mod time_range;
mod user;

pub use card::{Card, CreateCard};
pub use chart::{window_map_from_labels, ChartMap, ChartPoint, ChartSeries, WindowMap, WindowSeries};
pub use collection::{Collection, CollectionStatistics};
pub use price_change::PriceChangeRecord;
pub use price_entry::{round_cents, PriceEntry};
pub use time_range::{definitions, TimeRange, TimeWindowDefinition};
pub use user::User;
