use super::{HandoffAgent, HandoffAgentConfig, HumanAgent, UserAgent};
use crate::config::HandoffConfig;
use crate::console::SharedConsole;
use crate::decision::DecisionLoop;
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use parley_llm::SharedReasoner;
use parley_tools::builtins::transfer_tool;
use parley_tools::{RunnerConfig, ToolRegistry, ToolRunner};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

struct Member {
    config: HandoffAgentConfig,
    reasoner: SharedReasoner,
}

struct Human {
    name: String,
    console: SharedConsole,
}

struct User {
    entry: String,
    console: SharedConsole,
}

/// Installs a set of handoff agents, the user agent and an optional
/// human agent on a runtime.
///
/// Every agent's name is its agent type and topic type. Delegate tools are
/// built from each record's [`DelegateSpec`](super::DelegateSpec)s and added
/// to the shared tool registry.
pub struct HandoffRoster {
    config: HandoffConfig,
    registry: ToolRegistry,
    runner_config: RunnerConfig,
    members: Vec<Member>,
    human: Option<Human>,
    user: Option<User>,
}

impl HandoffRoster {
    /// Create an empty roster
    #[must_use]
    pub fn new(config: HandoffConfig) -> Self {
        Self {
            config,
            registry: ToolRegistry::new(),
            runner_config: RunnerConfig::default(),
            members: Vec::new(),
            human: None,
            user: None,
        }
    }

    /// Tools the agents may call by name
    #[must_use]
    pub fn with_tools(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Timeouts and retries of the shared tool runner
    #[must_use]
    pub fn with_runner_config(mut self, runner_config: RunnerConfig) -> Self {
        self.runner_config = runner_config;
        self
    }

    /// Add an agent
    #[must_use]
    pub fn with_agent(mut self, config: HandoffAgentConfig, reasoner: SharedReasoner) -> Self {
        self.members.push(Member { config, reasoner });
        self
    }

    /// Add the user agent; sessions start at `entry`, which becomes a
    /// coordinator
    #[must_use]
    pub fn with_user(mut self, entry: impl Into<String>, console: SharedConsole) -> Self {
        self.user = Some(User {
            entry: entry.into(),
            console,
        });
        self
    }

    /// Add a human escalation agent
    #[must_use]
    pub fn with_human(mut self, name: impl Into<String>, console: SharedConsole) -> Self {
        self.human = Some(Human {
            name: name.into(),
            console,
        });
        self
    }

    /// Topic type of the user agent
    #[must_use]
    pub fn user_topic(&self) -> &str {
        &self.config.user_topic
    }

    /// Register every agent and subscription, then check that each delegate
    /// target has a subscriber
    pub fn install(mut self, runtime: &Runtime) -> Result<()> {
        let configs: Vec<&HandoffAgentConfig> = self.members.iter().map(|m| &m.config).collect();
        register_transfer_tools(&mut self.registry, &configs)?;
        let runner = ToolRunner::new(Arc::new(self.registry), self.runner_config);
        let user_topic = self.config.user_topic.clone();
        let entry = self.user.as_ref().map(|user| user.entry.clone());

        let mut targets: Vec<(String, String)> = Vec::new();
        for member in self.members {
            let Member { config, reasoner } = member;
            // Sessions start at the entry agent, so it can always answer the user
            let config = if entry.as_deref() == Some(config.name.as_str()) {
                config.as_coordinator()
            } else {
                config
            };
            let agent_user_topic = config
                .user_topic
                .clone()
                .unwrap_or_else(|| user_topic.clone());
            let delegate_targets = config.delegate_targets(&agent_user_topic);
            let decision = Arc::new(decision_loop(
                &config,
                reasoner,
                runner.clone(),
                delegate_targets.clone(),
                self.config.max_iterations,
            )?);
            let max_hops = config.max_hops.unwrap_or(self.config.max_hops);

            runtime.register(config.name.as_str(), move |_| {
                Box::new(HandoffAgent::new(
                    Arc::clone(&decision),
                    agent_user_topic.clone(),
                    max_hops,
                ))
            })?;
            runtime.subscribe(config.name.as_str(), config.name.as_str())?;
            targets.extend(delegate_targets.into_iter().map(|t| (config.name.clone(), t)));
        }

        if let Some(human) = self.human {
            let Human { name, console } = human;
            let topic = user_topic.clone();
            let agent_name = name.clone();
            runtime.register(name.as_str(), move |_| {
                Box::new(HumanAgent::new(
                    agent_name.clone(),
                    topic.clone(),
                    Arc::clone(&console),
                ))
            })?;
            runtime.subscribe(name.as_str(), name.as_str())?;
        }

        if let Some(user) = self.user {
            let User { entry, console } = user;
            let name = user_topic.clone();
            runtime.register(user_topic.as_str(), move |_| {
                Box::new(UserAgent::new(name.clone(), entry.clone(), Arc::clone(&console)))
            })?;
            runtime.subscribe(user_topic.as_str(), user_topic.as_str())?;
        }

        for (agent, target) in &targets {
            if *target != user_topic && !runtime.has_subscribers(target) {
                return Err(Error::Configuration(format!(
                    "{} delegates to '{}', which has no subscribers",
                    agent, target
                )));
            }
        }
        info!(delegations = targets.len(), "Handoff roster installed");
        Ok(())
    }
}

/// Add a transfer tool for every delegate of `configs`.
///
/// The same tool name may be shared by several agents as long as it always
/// hands control to the same target.
pub(crate) fn register_transfer_tools(
    registry: &mut ToolRegistry,
    configs: &[&HandoffAgentConfig],
) -> Result<()> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for spec in configs.iter().flat_map(|c| c.delegates.iter()) {
        match seen.get(spec.tool.as_str()) {
            Some(target) if *target == spec.target => continue,
            Some(target) => {
                return Err(Error::Configuration(format!(
                    "delegate tool '{}' points to both '{}' and '{}'",
                    spec.tool, target, spec.target
                )));
            }
            None => {}
        }
        if registry.has(&spec.tool) {
            return Err(Error::Configuration(format!(
                "delegate tool '{}' clashes with a registered tool",
                spec.tool
            )));
        }
        seen.insert(&spec.tool, &spec.target);
    }

    for spec in configs.iter().flat_map(|c| c.delegates.iter()) {
        if !registry.has(&spec.tool) {
            registry.register(Arc::new(transfer_tool(
                spec.tool.clone(),
                spec.description.clone(),
                spec.target.clone(),
            )));
        }
    }
    Ok(())
}

/// Build the decide-act loop described by `config`
pub(crate) fn decision_loop(
    config: &HandoffAgentConfig,
    reasoner: SharedReasoner,
    runner: ToolRunner,
    delegate_targets: Vec<String>,
    default_max_iterations: usize,
) -> Result<DecisionLoop> {
    let delegate_tools: Vec<&str> = config.delegates.iter().map(|d| d.tool.as_str()).collect();
    Ok(DecisionLoop::new(
        config.name.clone(),
        config.system_prompt.clone(),
        reasoner,
        runner,
    )
    .with_tools(&config.tools)?
    .with_delegates(&delegate_tools, delegate_targets)?
    .with_max_iterations(config.max_iterations.unwrap_or(default_max_iterations)))
}
