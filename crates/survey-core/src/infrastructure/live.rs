//! Live chart fan-out
//!
//! One broadcast channel per topic (`live_{survey_uuid}`), created on first
//! subscription and dropped together with its last subscription.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::SurveyResult;
use crate::ports::outbound::LiveUpdateChannel;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

type Topics = DashMap<String, broadcast::Sender<Value>>;

pub struct BroadcastLiveChannel {
    topics: Arc<Topics>,
    capacity: usize,
}

/// Receiver of one topic. Dropping the last one removes the topic.
pub struct LiveSubscription {
    receiver: broadcast::Receiver<Value>,
    topic: String,
    topics: Arc<Topics>,
}

impl Deref for LiveSubscription {
    type Target = broadcast::Receiver<Value>;

    fn deref(&self) -> &Self::Target {
        &self.receiver
    }
}

impl DerefMut for LiveSubscription {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.receiver
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        // `receiver` is still alive here and counts as one.
        let removed = self
            .topics
            .remove_if(&self.topic, |_, sender| sender.receiver_count() <= 1);
        if removed.is_some() {
            debug!(topic = %self.topic, "Live topic released");
        }
    }
}

impl Default for BroadcastLiveChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl BroadcastLiveChannel {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self, topic: &str) -> LiveSubscription {
        let receiver = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        LiveSubscription {
            receiver,
            topic: topic.to_string(),
            topics: Arc::clone(&self.topics),
        }
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl LiveUpdateChannel for BroadcastLiveChannel {
    async fn publish(&self, topic: &str, payload: Value) -> SurveyResult<()> {
        let delivered = self
            .topics
            .get(topic)
            .and_then(|sender| sender.send(payload).ok());

        match delivered {
            Some(receivers) => debug!(topic, receivers, "Live update published"),
            None => {
                self.topics.remove_if(topic, |_, sender| sender.receiver_count() == 0);
                debug!(topic, "No live subscribers");
            }
        }
        Ok(())
    }
}
