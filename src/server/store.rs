//! Call correlation store
//!
//! Maps a phone number to the Twilio call and Retell session registered
//! for it. Records are keyed by number, so two concurrent calls involving
//! the same number overwrite each other (last writer wins). Entries are
//! never evicted by the request path and live for the process lifetime.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::models::CallCorrelation;

/// Key-value interface over correlation records
#[async_trait::async_trait]
pub trait CorrelationStore: Send + Sync {
    /// Look up the record for a phone number
    async fn get(&self, phone_number: &str) -> Option<CallCorrelation>;

    /// Store a record under its phone number
    /// Returns the record it replaced, if any
    async fn put(&self, correlation: CallCorrelation) -> Option<CallCorrelation>;

    /// Remove the record for a phone number
    #[allow(dead_code)]
    async fn delete(&self, phone_number: &str) -> Option<CallCorrelation>;

    /// Number of stored records
    async fn len(&self) -> usize;
}

/// Process-local store
#[derive(Default)]
pub struct InMemoryCorrelationStore {
    records: RwLock<HashMap<String, CallCorrelation>>,
}

impl InMemoryCorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CorrelationStore for InMemoryCorrelationStore {
    async fn get(&self, phone_number: &str) -> Option<CallCorrelation> {
        let records = self.records.read().await;
        records.get(phone_number).cloned()
    }

    async fn put(&self, correlation: CallCorrelation) -> Option<CallCorrelation> {
        let key = correlation.phone_number.clone();
        let replaced = {
            let mut records = self.records.write().await;
            records.insert(key.clone(), correlation)
        };

        if let Some(ref old) = replaced {
            tracing::warn!(
                "Correlation for {} overwritten (previous call {}, session {})",
                key,
                old.carrier_call_id,
                old.agent_session_id
            );
        }

        replaced
    }

    async fn delete(&self, phone_number: &str) -> Option<CallCorrelation> {
        let mut records = self.records.write().await;
        records.remove(phone_number)
    }

    async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}
