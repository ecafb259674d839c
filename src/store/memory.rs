use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Card, Collection, User};
use crate::store::repository::CollectionRepository;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    collections: Vec<Collection>,
    cards: Vec<Card>,
}

/// Process-local repository. Lists come back in insertion order.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) {
        self.tables.write().users.push(user);
    }

    pub fn insert_collection(&self, collection: Collection) -> Result<(), AppError> {
        let mut tables = self.tables.write();
        if !tables.users.iter().any(|u| u.id == collection.user_id) {
            return Err(AppError::NotFound(format!("User {} not found", collection.user_id)));
        }
        tables.collections.push(collection);
        Ok(())
    }

    pub fn insert_card(&self, card: Card) -> Result<(), AppError> {
        let mut tables = self.tables.write();
        if !tables.collections.iter().any(|c| c.id == card.collection_id) {
            return Err(AppError::NotFound(format!("Collection {} not found", card.collection_id)));
        }
        tables.cards.push(card);
        Ok(())
    }

    pub fn card(&self, id: Uuid) -> Option<Card> {
        self.tables.read().cards.iter().find(|c| c.id == id).cloned()
    }

    pub fn collection(&self, id: Uuid) -> Option<Collection> {
        self.tables.read().collections.iter().find(|c| c.id == id).cloned()
    }
}

#[async_trait]
impl CollectionRepository for InMemoryRepository {
    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        Ok(self.tables.read().users.clone())
    }

    async fn list_collections_for(&self, user: &User) -> Result<Vec<Collection>, AppError> {
        Ok(self
            .tables
            .read()
            .collections
            .iter()
            .filter(|c| c.user_id == user.id)
            .cloned()
            .collect())
    }

    async fn list_cards_for(&self, collection: &Collection) -> Result<Vec<Card>, AppError> {
        Ok(self
            .tables
            .read()
            .cards
            .iter()
            .filter(|c| c.collection_id == collection.id)
            .cloned()
            .collect())
    }

    async fn save_card(&self, card: &Card) -> Result<(), AppError> {
        let mut tables = self.tables.write();
        let slot = tables
            .cards
            .iter_mut()
            .find(|c| c.id == card.id)
            .ok_or_else(|| AppError::NotFound(format!("Card {} not found", card.id)))?;
        *slot = card.clone();
        Ok(())
    }

    async fn save_collection(&self, collection: &Collection) -> Result<(), AppError> {
        let mut tables = self.tables.write();
        let slot = tables
            .collections
            .iter_mut()
            .find(|c| c.id == collection.id)
            .ok_or_else(|| AppError::NotFound(format!("Collection {} not found", collection.id)))?;
        *slot = collection.clone();
        Ok(())
    }
}
