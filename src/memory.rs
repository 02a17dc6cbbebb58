//! Recall of previously used clients and line items for autocomplete.

use tracing::warn;

use crate::model::{SavedClient, SavedItem};
use crate::store::{KeyValueStore, StoreError, load_json, save_json};

pub const CLIENTS_KEY: &str = "saved_clients";
pub const ITEMS_KEY: &str = "saved_items";

/// Dedup key: trimmed and case-folded.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Case-insensitive substring test used by every suggestion list. A blank
/// query matches nothing.
pub fn matches_query(candidate: &str, query: &str) -> bool {
    let needle = normalize_key(query);
    !needle.is_empty() && candidate.to_lowercase().contains(&needle)
}

pub struct SavedEntities<S> {
    store: S,
}

impl<S: KeyValueStore> SavedEntities<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn clients(&self) -> Vec<SavedClient> {
        self.load_list(CLIENTS_KEY)
    }

    pub fn items(&self) -> Vec<SavedItem> {
        self.load_list(ITEMS_KEY)
    }

    pub fn find_client(&self, name: &str) -> Option<SavedClient> {
        let key = normalize_key(name);
        self.clients().into_iter().find(|c| normalize_key(&c.name) == key)
    }

    pub fn find_item(&self, description: &str) -> Option<SavedItem> {
        let key = normalize_key(description);
        self.items().into_iter().find(|i| normalize_key(&i.description) == key)
    }

    pub fn suggest_clients(&self, input: &str) -> Vec<SavedClient> {
        self.clients().into_iter().filter(|c| matches_query(&c.name, input)).collect()
    }

    pub fn suggest_items(&self, input: &str) -> Vec<SavedItem> {
        self.items()
            .into_iter()
            .filter(|i| matches_query(&i.description, input))
            .collect()
    }

    /// Insert or merge by normalized name. Blank names are ignored; blank
    /// email/address never overwrite stored ones.
    pub fn upsert_client(&self, client: SavedClient) -> Result<(), StoreError> {
        let key = normalize_key(&client.name);
        if key.is_empty() {
            return Ok(());
        }
        let mut clients = self.clients();
        let client = SavedClient { name: client.name.trim().to_string(), ..client };
        match clients.iter_mut().find(|c| normalize_key(&c.name) == key) {
            Some(existing) => {
                existing.name = client.name;
                if !client.email.trim().is_empty() {
                    existing.email = client.email;
                }
                if !client.address.trim().is_empty() {
                    existing.address = client.address;
                }
            }
            None => clients.push(client),
        }
        save_json(&self.store, CLIENTS_KEY, &clients)
    }

    pub fn upsert_item(&self, item: SavedItem) -> Result<(), StoreError> {
        let key = normalize_key(&item.description);
        if key.is_empty() {
            return Ok(());
        }
        let mut items = self.items();
        let item = SavedItem { description: item.description.trim().to_string(), ..item };
        match items.iter_mut().find(|i| normalize_key(&i.description) == key) {
            Some(existing) => *existing = item,
            None => items.push(item),
        }
        save_json(&self.store, ITEMS_KEY, &items)
    }

    fn load_list<T: serde::de::DeserializeOwned>(&self, key: &str) -> Vec<T> {
        match load_json::<Vec<T>>(&self.store, key) {
            Ok(list) => list.unwrap_or_default(),
            Err(e) => {
                warn!(key, error = %e, "Failed to load saved entities");
                Vec::new()
            }
        }
    }
}
