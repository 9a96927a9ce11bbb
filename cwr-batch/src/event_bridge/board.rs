//! Latest coordinate per record, kept in this context
//!
//! Registered as the topology's direct receiver so detected coordinates stay
//! queryable after their events have scrolled past SSE clients.

use cwr_common::events::CoordinateUpdate;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use super::{CoordinateReceiver, DeliveryError};

#[derive(Debug, Default)]
pub struct CoordinateBoard {
    latest: RwLock<BTreeMap<i64, CoordinateUpdate>>,
}

impl CoordinateBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self, record_id: i64) -> Option<CoordinateUpdate> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&record_id)
            .cloned()
    }

    /// Every known coordinate, ordered by record id
    pub fn all(&self) -> Vec<CoordinateUpdate> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl CoordinateReceiver for CoordinateBoard {
    /// Repeated deliveries for a record overwrite the earlier value
    fn update(&self, update: &CoordinateUpdate) -> Result<(), DeliveryError> {
        self.latest
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(update.record_id, update.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn update(record_id: i64, latitude: f64, saved: bool) -> CoordinateUpdate {
        CoordinateUpdate {
            record_id,
            latitude,
            longitude: 5.9759,
            saved,
            raw: Value::Null,
        }
    }

    #[test]
    fn test_last_update_wins() {
        let board = CoordinateBoard::new();
        board.update(&update(7, 49.1, false)).unwrap();
        board.update(&update(7, 49.7593, true)).unwrap();

        let latest = board.latest(7).unwrap();
        assert_eq!(latest.latitude, 49.7593);
        assert!(latest.saved);
        assert!(board.latest(8).is_none());
    }

    #[test]
    fn test_all_ordered_by_record() {
        let board = CoordinateBoard::new();
        board.update(&update(9, 1.0, false)).unwrap();
        board.update(&update(2, 2.0, false)).unwrap();

        let ids: Vec<i64> = board.all().iter().map(|u| u.record_id).collect();
        assert_eq!(ids, vec![2, 9]);
    }
}
