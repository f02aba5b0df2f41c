//! Ref-counted subscription hub
//!
//! Callers register interest in a set of entities together with a route (an
//! opaque value telling them where a delivery belongs) and receive a
//! `SubscriptionToken`. Published events fan out to every registration that
//! names the entity, through a single delivery channel, so deliveries are
//! consumed in publish order.
//!
//! Releasing a token is synchronous: once `unsubscribe` returns, `is_active`
//! reports false and consumers drop any delivery for it still in the channel.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use dashmap::DashMap;

use crate::entity::{EntityEvent, EntityId};
use crate::error::{BusError, Result};
use crate::iter::DeliveryIterator;

/// Handle for one registration; released with `EventHub::unsubscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(u64);

impl SubscriptionToken {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// An event routed to one registration
#[derive(Debug, Clone)]
pub struct Delivery<R> {
    pub token: SubscriptionToken,
    pub route: R,
    pub event: EntityEvent,
}

/// Anything that accepts published entity events
pub trait EventSink: Send + Sync {
    /// Publish an event, returning the number of deliveries queued
    fn publish(&self, event: EntityEvent) -> usize;
}

#[derive(Debug)]
struct Registration<R> {
    entities: Vec<EntityId>,
    route: R,
}

/// Subscription registry plus delivery channel
///
/// # Example
///
/// ```rust
/// use entity_bus::{EntityEvent, EntityId, EventHub, EventSink};
///
/// let hub = EventHub::new();
/// let token = hub.subscribe([EntityId::from("sensor.kitchen")], 7u64);
///
/// assert_eq!(hub.publish(EntityEvent::new("sensor.kitchen", None, None)), 1);
/// let delivery = hub.iter().try_recv().unwrap();
/// assert_eq!(delivery.route, 7);
///
/// hub.unsubscribe(token).unwrap();
/// assert!(!hub.is_active(delivery.token));
/// ```
pub struct EventHub<R> {
    registrations: DashMap<SubscriptionToken, Registration<R>>,

    /// Number of live registrations naming each entity
    entity_refs: DashMap<EntityId, usize>,

    next_token: AtomicU64,

    tx: mpsc::Sender<Delivery<R>>,
    rx: Arc<Mutex<mpsc::Receiver<Delivery<R>>>>,
}

impl<R> EventHub<R>
where
    R: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            registrations: DashMap::new(),
            entity_refs: DashMap::new(),
            next_token: AtomicU64::new(1),
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Register a route for a set of entities
    ///
    /// Duplicate entity ids count once.
    pub fn subscribe<I>(&self, entities: I, route: R) -> SubscriptionToken
    where
        I: IntoIterator<Item = EntityId>,
    {
        let mut entities: Vec<EntityId> = entities.into_iter().collect();
        entities.sort();
        entities.dedup();

        let token = SubscriptionToken(self.next_token.fetch_add(1, Ordering::Relaxed));

        for entity in &entities {
            let mut count = self.entity_refs.entry(entity.clone()).or_insert(0);
            *count += 1;
            tracing::debug!("Entity reference count for {}: {} -> {}", entity, *count - 1, *count);
        }

        tracing::debug!("Registered {} for {} entities", token, entities.len());
        self.registrations
            .insert(token, Registration { entities, route });

        token
    }

    /// Release a registration
    pub fn unsubscribe(&self, token: SubscriptionToken) -> Result<()> {
        let (_, registration) = self
            .registrations
            .remove(&token)
            .ok_or(BusError::SubscriptionNotFound(token))?;

        for entity in &registration.entities {
            let remaining = match self.entity_refs.get_mut(entity) {
                Some(mut count) => {
                    *count = count.saturating_sub(1);
                    *count
                }
                None => {
                    tracing::warn!(
                        "Released {} for {} but no references found",
                        token,
                        entity
                    );
                    continue;
                }
            };

            tracing::debug!("Entity reference count for {}: {} -> {}", entity, remaining + 1, remaining);

            if remaining == 0 {
                self.entity_refs.remove_if(entity, |_, count| *count == 0);
            }
        }

        tracing::debug!("Released {}", token);
        Ok(())
    }

    /// Whether a token is still registered
    pub fn is_active(&self, token: SubscriptionToken) -> bool {
        self.registrations.contains_key(&token)
    }

    /// Number of live registrations naming an entity
    pub fn ref_count(&self, entity: &EntityId) -> usize {
        self.entity_refs.get(entity).map_or(0, |count| *count)
    }

    pub fn is_subscribed(&self, entity: &EntityId) -> bool {
        self.ref_count(entity) > 0
    }

    pub fn subscription_count(&self) -> usize {
        self.registrations.len()
    }

    /// Snapshot of per-entity reference counts
    pub fn subscription_stats(&self) -> HashMap<EntityId, usize> {
        self.entity_refs
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Blocking iterator over deliveries
    pub fn iter(&self) -> DeliveryIterator<R> {
        DeliveryIterator::new(Arc::clone(&self.rx))
    }

    fn routes_for(&self, entity: &EntityId) -> Vec<(SubscriptionToken, R)> {
        let mut routes: Vec<(SubscriptionToken, R)> = self
            .registrations
            .iter()
            .filter(|entry| entry.value().entities.contains(entity))
            .map(|entry| (*entry.key(), entry.value().route.clone()))
            .collect();
        // Registration order, so fan-out is deterministic
        routes.sort_by_key(|(token, _)| *token);
        routes
    }
}

impl<R> EventSink for EventHub<R>
where
    R: Clone + Send + Sync + 'static,
{
    fn publish(&self, event: EntityEvent) -> usize {
        let routes = self.routes_for(&event.entity_id);
        if routes.is_empty() {
            tracing::trace!("No subscribers for {}", event.entity_id);
            return 0;
        }

        let mut delivered = 0;
        for (token, route) in routes {
            let delivery = Delivery {
                token,
                route,
                event: event.clone(),
            };
            if self.tx.send(delivery).is_err() {
                tracing::debug!("Delivery receiver dropped");
                break;
            }
            delivered += 1;
        }

        tracing::debug!("Published {} to {} subscribers", event.entity_id, delivered);
        delivered
    }
}

impl<R> Default for EventHub<R>
where
    R: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for EventHub<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("subscriptions", &self.registrations.len())
            .field("entities", &self.entity_refs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(entity: &str) -> EntityEvent {
        EntityEvent::new(entity, None, None)
    }

    #[test]
    fn test_reference_counting() {
        let hub = EventHub::new();
        let pm25 = EntityId::from("sensor.pm25");

        assert!(!hub.is_subscribed(&pm25));

        let first = hub.subscribe([pm25.clone()], "air");
        let second = hub.subscribe([pm25.clone(), EntityId::from("sensor.pm10")], "air");
        assert_eq!(hub.ref_count(&pm25), 2);
        assert_eq!(hub.subscription_count(), 2);

        hub.unsubscribe(first).unwrap();
        assert_eq!(hub.ref_count(&pm25), 1);
        assert!(hub.is_subscribed(&pm25));

        hub.unsubscribe(second).unwrap();
        assert_eq!(hub.ref_count(&pm25), 0);
        assert!(hub.subscription_stats().is_empty());
    }

    #[test]
    fn test_duplicate_entities_count_once() {
        let hub = EventHub::new();
        let fan = EntityId::from("fan.purifier");
        let token = hub.subscribe([fan.clone(), fan.clone()], 1u64);
        assert_eq!(hub.ref_count(&fan), 1);
        assert_eq!(hub.publish(event("fan.purifier")), 1);
        hub.unsubscribe(token).unwrap();
    }

    #[test]
    fn test_unsubscribe_twice_fails() {
        let hub = EventHub::new();
        let token = hub.subscribe([EntityId::from("switch.lock")], ());
        hub.unsubscribe(token).unwrap();
        assert!(matches!(
            hub.unsubscribe(token),
            Err(BusError::SubscriptionNotFound(t)) if t == token
        ));
    }

    #[test]
    fn test_publish_fans_out_in_registration_order() {
        let hub = EventHub::new();
        hub.subscribe([EntityId::from("fan.purifier")], 1u64);
        hub.subscribe([EntityId::from("sensor.other")], 2u64);
        hub.subscribe([EntityId::from("fan.purifier")], 3u64);

        assert_eq!(hub.publish(event("fan.purifier")), 2);
        let routes: Vec<u64> = hub.iter().try_iter().map(|d| d.route).collect();
        assert_eq!(routes, vec![1, 3]);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let hub = EventHub::<u64>::new();
        assert_eq!(hub.publish(event("sensor.nobody")), 0);
        assert!(hub.iter().try_recv().is_none());
    }

    #[test]
    fn test_in_flight_delivery_is_stale_after_release() {
        let hub = EventHub::new();
        let token = hub.subscribe([EntityId::from("sensor.co")], 5u64);
        hub.publish(event("sensor.co"));
        hub.unsubscribe(token).unwrap();

        let delivery = hub.iter().try_recv().unwrap();
        assert_eq!(delivery.token, token);
        assert!(!hub.is_active(delivery.token));
    }
}
