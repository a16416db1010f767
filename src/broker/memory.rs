//! In-process broker
//!
//! Keeps namespaces, queues, topics and subscriptions in memory so the
//! engine can run without a cloud namespace. Each sub-queue assigns its own
//! increasing sequence numbers. A namespace can be switched to unavailable
//! to simulate outages, and given response latency to simulate slow links:
//! the operation takes effect immediately, its response arrives late.

use super::{
    BrokerClient, BrokerConnector, BrokerError, BrokerResult, Credential, EntityAddress,
    MessageHandle, OutgoingMessage, SubQueue, TopicDescription, Topology,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
struct EntityQueues {
    active: BTreeMap<i64, MessageHandle>,
    dead_letter: BTreeMap<i64, MessageHandle>,
    next_sequence: i64,
}

impl EntityQueues {
    fn enqueue(&mut self, message: &OutgoingMessage) -> i64 {
        self.next_sequence += 1;
        let sequence_number = self.next_sequence;
        self.active.insert(
            sequence_number,
            MessageHandle {
                sequence_number,
                body: message.body.clone(),
                properties: message.properties.clone(),
                enqueued_time: Utc::now(),
                delivery_count: 0,
            },
        );
        sequence_number
    }

    fn sub_queue(&mut self, dead_letter: bool) -> &mut BTreeMap<i64, MessageHandle> {
        if dead_letter {
            &mut self.dead_letter
        } else {
            &mut self.active
        }
    }
}

#[derive(Debug, Default)]
struct NamespaceState {
    queues: BTreeMap<String, EntityQueues>,
    topics: BTreeMap<String, BTreeMap<String, EntityQueues>>,
}

impl NamespaceState {
    fn entity(&mut self, address: &EntityAddress) -> BrokerResult<&mut EntityQueues> {
        let found = match address {
            EntityAddress::Queue(name) => self.queues.get_mut(name),
            EntityAddress::Subscription {
                topic,
                subscription,
            } => self
                .topics
                .get_mut(topic)
                .and_then(|subs| subs.get_mut(subscription)),
        };
        found.ok_or_else(|| BrokerError::EntityNotFound(address.to_string()))
    }
}

/// One simulated namespace
#[derive(Debug, Default)]
pub struct MemoryNamespace {
    state: Mutex<NamespaceState>,
    unavailable: AtomicBool,
    latency: Mutex<Latency>,
}

#[derive(Debug, Default)]
struct Latency {
    every_call: Duration,
    next_calls: VecDeque<Duration>,
}

impl MemoryNamespace {
    fn state(&self) -> MutexGuard<'_, NamespaceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn respond(&self) {
        let delay = {
            let mut latency = self.latency.lock().unwrap_or_else(PoisonError::into_inner);
            let every_call = latency.every_call;
            latency.next_calls.pop_front().unwrap_or(every_call)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn ensure_available(&self) -> BrokerResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(BrokerError::Unavailable("namespace not reachable".into()))
        } else {
            Ok(())
        }
    }

    pub fn add_queue(&self, name: &str) {
        self.state().queues.entry(name.to_string()).or_default();
    }

    pub fn add_topic(&self, name: &str, subscriptions: &[&str]) {
        let mut state = self.state();
        let topic = state.topics.entry(name.to_string()).or_default();
        for subscription in subscriptions {
            topic.entry(subscription.to_string()).or_default();
        }
    }

    /// Makes every subsequent call against this namespace fail
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delays the response of every client call
    pub fn set_latency(&self, latency: Duration) {
        self.latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .every_call = latency;
    }

    /// Delays only the response of the next client call
    pub fn delay_next_call(&self, delay: Duration) {
        self.latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_calls
            .push_back(delay);
    }

    /// Enqueues directly, bypassing availability checks. Returns the
    /// sequence numbers assigned (one per receiving sub-queue).
    pub fn publish(&self, entity: &str, message: OutgoingMessage) -> BrokerResult<Vec<i64>> {
        let mut state = self.state();
        if let Some(queue) = state.queues.get_mut(entity) {
            return Ok(vec![queue.enqueue(&message)]);
        }
        if let Some(subscriptions) = state.topics.get_mut(entity) {
            return Ok(subscriptions
                .values_mut()
                .map(|sub| sub.enqueue(&message))
                .collect());
        }
        Err(BrokerError::EntityNotFound(entity.to_string()))
    }

    /// Moves an active message into the dead-letter sub-queue
    pub fn dead_letter(&self, address: &EntityAddress, sequence_number: i64) -> BrokerResult<()> {
        let mut state = self.state();
        let entity = state.entity(address)?;
        let mut message =
            entity
                .active
                .remove(&sequence_number)
                .ok_or_else(|| BrokerError::MessageNotFound {
                    entity: address.to_string(),
                    sequence_number,
                })?;
        message.delivery_count += 1;
        entity.dead_letter.insert(sequence_number, message);
        Ok(())
    }

    /// Number of messages currently held in a sub-queue
    pub fn message_count(&self, sub_queue: &SubQueue) -> usize {
        let mut state = self.state();
        state
            .entity(&sub_queue.address)
            .map(|entity| entity.sub_queue(sub_queue.dead_letter).len())
            .unwrap_or(0)
    }
}

/// Broker connector backed by in-memory namespaces keyed by host name
#[derive(Debug, Default)]
pub struct MemoryBroker {
    namespaces: Mutex<HashMap<String, Arc<MemoryNamespace>>>,
    connects: AtomicUsize,
    live_clients: Arc<AtomicUsize>,
    connect_delay: Mutex<Duration>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the namespace for `host`, creating it when missing
    pub fn namespace(&self, host: &str) -> Arc<MemoryNamespace> {
        self.namespaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(host.to_string())
            .or_default()
            .clone()
    }

    /// How many clients have been created so far
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Clients created and not yet closed
    pub fn live_clients(&self) -> usize {
        self.live_clients.load(Ordering::SeqCst)
    }

    /// Makes every connect take `delay` before the client is handed out
    pub fn set_connect_delay(&self, delay: Duration) {
        *self
            .connect_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = delay;
    }
}

#[async_trait]
impl BrokerConnector for MemoryBroker {
    async fn connect(&self, credential: &Credential) -> BrokerResult<Arc<dyn BrokerClient>> {
        let namespace = self
            .namespaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(credential.namespace())
            .cloned()
            .ok_or_else(|| {
                BrokerError::Unavailable(format!("unknown namespace {}", credential.namespace()))
            })?;
        let delay = *self
            .connect_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.live_clients.fetch_add(1, Ordering::SeqCst);
        debug!("Opened in-memory client for {}", credential.namespace());
        Ok(Arc::new(MemoryClient {
            namespace,
            closed: AtomicBool::new(false),
            live_clients: self.live_clients.clone(),
        }))
    }
}

struct MemoryClient {
    namespace: Arc<MemoryNamespace>,
    closed: AtomicBool,
    live_clients: Arc<AtomicUsize>,
}

impl MemoryClient {
    fn check(&self) -> BrokerResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable("client closed".into()));
        }
        self.namespace.ensure_available()
    }
}

#[async_trait]
impl BrokerClient for MemoryClient {
    async fn peek(
        &self,
        sub_queue: &SubQueue,
        max_count: u32,
        from_sequence_number: Option<i64>,
    ) -> BrokerResult<Vec<MessageHandle>> {
        self.check()?;
        let messages = {
            let mut state = self.namespace.state();
            state
                .entity(&sub_queue.address)?
                .sub_queue(sub_queue.dead_letter)
                .range(from_sequence_number.unwrap_or(i64::MIN)..)
                .take(max_count as usize)
                .map(|(_, message)| message.clone())
                .collect()
        };
        self.namespace.respond().await;
        Ok(messages)
    }

    async fn send(&self, entity: &str, message: OutgoingMessage) -> BrokerResult<()> {
        self.check()?;
        let result = self.namespace.publish(entity, message).map(|_| ());
        self.namespace.respond().await;
        result
    }

    async fn complete(&self, sub_queue: &SubQueue, message: &MessageHandle) -> BrokerResult<()> {
        self.check()?;
        let result = {
            let mut state = self.namespace.state();
            state
                .entity(&sub_queue.address)?
                .sub_queue(sub_queue.dead_letter)
                .remove(&message.sequence_number)
                .map(|_| ())
                .ok_or_else(|| BrokerError::MessageNotFound {
                    entity: sub_queue.to_string(),
                    sequence_number: message.sequence_number,
                })
        };
        self.namespace.respond().await;
        result
    }

    async fn list_entities(&self) -> BrokerResult<Topology> {
        self.check()?;
        let topology = {
            let state = self.namespace.state();
            Topology {
                queues: state.queues.keys().cloned().collect(),
                topics: state
                    .topics
                    .iter()
                    .map(|(name, subscriptions)| TopicDescription {
                        name: name.clone(),
                        subscriptions: subscriptions.keys().cloned().collect(),
                    })
                    .collect(),
            }
        };
        self.namespace.respond().await;
        Ok(topology)
    }

    async fn dead_letter_count(&self, address: &EntityAddress) -> BrokerResult<u64> {
        self.check()?;
        let count = {
            let mut state = self.namespace.state();
            state.entity(address)?.dead_letter.len() as u64
        };
        self.namespace.respond().await;
        Ok(count)
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.live_clients.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
