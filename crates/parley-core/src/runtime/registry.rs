//! Agent factories and the subscription table

use crate::agent::AgentFactory;
use crate::error::{Error, Result};
use crate::topic::{AgentId, AgentType, Subscription, TopicId};
use std::collections::HashMap;

#[derive(Default)]
pub(crate) struct Registry {
    factories: HashMap<AgentType, AgentFactory>,
    order: Vec<AgentType>,
    subscriptions: Vec<Subscription>,
}

impl Registry {
    pub(crate) fn register(&mut self, agent_type: AgentType, factory: AgentFactory) -> Result<()> {
        if self.factories.contains_key(&agent_type) {
            return Err(Error::Configuration(format!(
                "agent type '{}' is already registered",
                agent_type
            )));
        }
        self.order.push(agent_type.clone());
        self.factories.insert(agent_type, factory);
        Ok(())
    }

    pub(crate) fn add_subscription(&mut self, subscription: Subscription) -> Result<()> {
        if !self.factories.contains_key(&subscription.agent_type) {
            return Err(Error::Configuration(format!(
                "cannot subscribe unknown agent type '{}' to '{}'",
                subscription.agent_type, subscription.topic_type
            )));
        }
        if self.subscriptions.contains(&subscription) {
            return Err(Error::Configuration(format!(
                "agent type '{}' is already subscribed to '{}'",
                subscription.agent_type, subscription.topic_type
            )));
        }
        self.subscriptions.push(subscription);
        Ok(())
    }

    /// Every registered type must be reachable through some topic
    pub(crate) fn validate(&self) -> Result<()> {
        let unreachable: Vec<&str> = self
            .order
            .iter()
            .filter(|agent_type| {
                !self
                    .subscriptions
                    .iter()
                    .any(|s| &s.agent_type == *agent_type)
            })
            .map(AgentType::as_str)
            .collect();
        if !unreachable.is_empty() {
            return Err(Error::Configuration(format!(
                "agent types without subscriptions: {}",
                unreachable.join(", ")
            )));
        }
        Ok(())
    }

    /// Recipients of a message on `topic`, in subscription order
    pub(crate) fn recipients(&self, topic: &TopicId, sender: Option<&AgentId>) -> Vec<AgentId> {
        self.subscriptions
            .iter()
            .filter(|s| s.matches(topic))
            .map(|s| s.recipient(topic))
            .filter(|recipient| Some(recipient) != sender)
            .collect()
    }

    pub(crate) fn has_subscribers(&self, topic_type: &str) -> bool {
        self.subscriptions.iter().any(|s| s.topic_type == topic_type)
    }

    pub(crate) fn factory(&self, agent_type: &AgentType) -> Option<AgentFactory> {
        self.factories.get(agent_type).cloned()
    }

    pub(crate) fn agent_types(&self) -> &[AgentType] {
        &self.order
    }
}
