use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::{Card, Collection, User};

/// Access to the entities the reconciliation job walks and updates.
#[async_trait]
pub trait CollectionRepository: Send + Sync {
    async fn list_users(&self) -> Result<Vec<User>, AppError>;

    async fn list_collections_for(&self, user: &User) -> Result<Vec<Collection>, AppError>;

    async fn list_cards_for(&self, collection: &Collection) -> Result<Vec<Card>, AppError>;

    async fn save_card(&self, card: &Card) -> Result<(), AppError>;

    async fn save_collection(&self, collection: &Collection) -> Result<(), AppError>;
}
