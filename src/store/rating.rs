use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::Result;

/// Running rating aggregate of one laptop.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rating {
    /// Number of scores received.
    pub count: u32,
    /// Sum of all scores received.
    pub sum: f64,
}

impl Rating {
    /// Mean score, derived from `sum` and `count` on every call.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / f64::from(self.count)
    }
}

/// Concurrent map of laptop id to [`Rating`].
#[derive(Clone, Default)]
pub struct RatingStore {
    ratings: Arc<RwLock<HashMap<String, Rating>>>,
}

impl RatingStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `score` to the aggregate of `laptop_id` and returns the updated
    /// aggregate.
    pub async fn add(&self, laptop_id: &str, score: f64) -> Result<Rating> {
        let mut ratings = self.ratings.write().await;

        let rating = ratings
            .entry(laptop_id.to_string())
            .and_modify(|rating| {
                rating.count = rating.count.saturating_add(1);
                rating.sum += score;
            })
            .or_insert(Rating {
                count: 1,
                sum: score,
            });

        Ok(*rating)
    }

    /// Returns the current aggregate of `laptop_id`, if any.
    pub async fn get(&self, laptop_id: &str) -> Option<Rating> {
        self.ratings.read().await.get(laptop_id).copied()
    }
}
