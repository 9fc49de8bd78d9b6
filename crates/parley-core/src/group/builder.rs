use super::chooser::{ReasonerChooser, RoundRobinChooser, SpeakerChooser};
use super::manager::{GroupChatManager, ResultStore, Team};
use super::participant::{ChatParticipant, UserProxyParticipant};
use super::selector::SpeakerSelector;
use super::{ChatResult, Participant, TASK_SOURCE};
use crate::agent::{Agent, AgentFactory};
use crate::config::GroupChatConfig;
use crate::console::SharedConsole;
use crate::error::{Error, Result};
use crate::handoff::roster::{decision_loop, register_transfer_tools};
use crate::handoff::HandoffAgentConfig;
use crate::message::Payload;
use crate::runtime::Runtime;
use crate::topic::{AgentId, AgentType, TopicId};
use parley_llm::{Message, SharedReasoner};
use parley_tools::{RunnerConfig, ToolRegistry, ToolRunner};
use std::collections::HashSet;
use std::sync::{Arc, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

enum Member {
    Agent {
        config: HandoffAgentConfig,
        reasoner: SharedReasoner,
    },
    UserProxy {
        participant: Participant,
        console: SharedConsole,
    },
    Custom {
        participant: Participant,
        factory: AgentFactory,
    },
}

impl Member {
    fn participant(&self) -> Participant {
        match self {
            Self::Agent { config, .. } => Participant::new(&config.name, &config.description),
            Self::UserProxy { participant, .. } | Self::Custom { participant, .. } => {
                participant.clone()
            }
        }
    }
}

/// Builder of a team: participants, selection and termination.
///
/// `install` registers each participant under its name (subscribed to its
/// own topic and the group topic) and a manager of type
/// `{group_topic}_manager` subscribed to the group topic.
pub struct GroupChat {
    group_topic: String,
    config: GroupChatConfig,
    registry: ToolRegistry,
    runner_config: RunnerConfig,
    members: Vec<Member>,
    selector: Option<Arc<dyn SpeakerSelector>>,
    chooser: Option<Arc<dyn SpeakerChooser>>,
}

impl GroupChat {
    /// Create an empty team talking on `group_topic`
    #[must_use]
    pub fn new(group_topic: impl Into<String>, config: GroupChatConfig) -> Self {
        Self {
            group_topic: group_topic.into(),
            config,
            registry: ToolRegistry::new(),
            runner_config: RunnerConfig::default(),
            members: Vec::new(),
            selector: None,
            chooser: None,
        }
    }

    /// Tools the reasoning participants may call by name
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

    /// Add a reasoning participant
    #[must_use]
    pub fn with_agent(mut self, config: HandoffAgentConfig, reasoner: SharedReasoner) -> Self {
        self.members.push(Member::Agent { config, reasoner });
        self
    }

    /// Add a participant typed at a console
    #[must_use]
    pub fn with_user_proxy(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        console: SharedConsole,
    ) -> Self {
        self.members.push(Member::UserProxy {
            participant: Participant::new(name, description),
            console,
        });
        self
    }

    /// Add a participant with its own agent implementation
    #[must_use]
    pub fn with_participant(mut self, participant: Participant, factory: AgentFactory) -> Self {
        self.members.push(Member::Custom {
            participant,
            factory,
        });
        self
    }

    /// Override selector consulted before the chooser
    #[must_use]
    pub fn with_selector(mut self, selector: impl SpeakerSelector + 'static) -> Self {
        self.selector = Some(Arc::new(selector));
        self
    }

    /// Chooser used when the selector defers (round-robin by default)
    #[must_use]
    pub fn with_chooser(mut self, chooser: impl SpeakerChooser + 'static) -> Self {
        self.chooser = Some(Arc::new(chooser));
        self
    }

    /// Let a reasoner choose, with the configured prompt and attempts
    #[must_use]
    pub fn with_reasoner_chooser(self, reasoner: SharedReasoner) -> Self {
        let chooser = ReasonerChooser::new(reasoner)
            .with_prompt(self.config.selector_prompt.clone())
            .with_max_attempts(self.config.selector_max_attempts);
        self.with_chooser(chooser)
    }

    /// Agent type of the manager
    #[must_use]
    pub fn manager_type(&self) -> String {
        format!("{}_manager", self.group_topic)
    }

    fn validate(&self) -> Result<Vec<Participant>> {
        if self.members.is_empty() {
            return Err(Error::Configuration(format!(
                "group chat '{}' has no participants",
                self.group_topic
            )));
        }
        if self.config.max_turns == 0 {
            return Err(Error::Configuration(
                "max_turns must be at least 1".to_string(),
            ));
        }

        let participants: Vec<Participant> = self.members.iter().map(Member::participant).collect();
        let mut seen = HashSet::new();
        for participant in &participants {
            if participant.name == self.group_topic || participant.name == self.manager_type() {
                return Err(Error::Configuration(format!(
                    "participant name '{}' is reserved",
                    participant.name
                )));
            }
            if !seen.insert(participant.name.as_str()) {
                return Err(Error::Configuration(format!(
                    "participant '{}' added twice",
                    participant.name
                )));
            }
        }
        Ok(participants)
    }

    /// Register participants, the manager and their subscriptions
    pub fn install(mut self, runtime: &Runtime) -> Result<GroupChatHandle> {
        let participants = self.validate()?;

        let configs: Vec<&HandoffAgentConfig> = self
            .members
            .iter()
            .filter_map(|m| match m {
                Member::Agent { config, .. } => Some(config),
                _ => None,
            })
            .collect();
        register_transfer_tools(&mut self.registry, &configs)?;
        let runner = ToolRunner::new(Arc::new(self.registry), self.runner_config);

        let group_topic = self.group_topic.clone();
        let manager_type = format!("{}_manager", group_topic);
        for member in self.members {
            let name = member.participant().name;
            let factory: AgentFactory = match member {
                Member::Agent { config, reasoner } => {
                    let user_topic = config
                        .user_topic
                        .clone()
                        .unwrap_or_else(|| TASK_SOURCE.to_string());
                    let targets = config.delegate_targets(&user_topic);
                    let decision = Arc::new(decision_loop(
                        &config,
                        reasoner,
                        runner.clone(),
                        targets,
                        self.config.max_iterations,
                    )?);
                    let topic = group_topic.clone();
                    factory(move |_| {
                        Box::new(ChatParticipant::new(Arc::clone(&decision), topic.clone()))
                    })
                }
                Member::UserProxy {
                    participant,
                    console,
                } => {
                    let topic = group_topic.clone();
                    factory(move |_| {
                        Box::new(UserProxyParticipant::new(
                            participant.name.clone(),
                            topic.clone(),
                            Arc::clone(&console),
                        ))
                    })
                }
                Member::Custom { factory, .. } => factory,
            };
            runtime.register_factory(AgentType::new(name.as_str()), factory)?;
            runtime.subscribe(name.as_str(), name.as_str())?;
            runtime.subscribe(group_topic.as_str(), name.as_str())?;
        }

        let results = ResultStore::default();
        let team = Arc::new(Team {
            group_topic: group_topic.clone(),
            participants,
            termination: self.config.termination.clone(),
            selector: self.selector,
            chooser: self
                .chooser
                .unwrap_or_else(|| Arc::new(RoundRobinChooser)),
            allow_repeated_speaker: self.config.allow_repeated_speaker,
            max_turns: self.config.max_turns,
            results: Arc::clone(&results),
        });
        runtime.register(manager_type.as_str(), move |_| {
            Box::new(GroupChatManager::new(Arc::clone(&team)))
        })?;
        runtime.subscribe(group_topic.as_str(), manager_type.as_str())?;

        info!(group_topic = %group_topic, "Group chat installed");
        Ok(GroupChatHandle {
            group_topic,
            results,
        })
    }
}

/// Starts sessions of an installed group chat and reads their results
#[derive(Clone)]
pub struct GroupChatHandle {
    group_topic: String,
    results: ResultStore,
}

impl GroupChatHandle {
    /// Group topic type
    #[must_use]
    pub fn group_topic(&self) -> &str {
        &self.group_topic
    }

    /// Publish `task` as the first turn of `session`
    pub fn start(&self, runtime: &Runtime, session: &str, task: impl Into<String>) -> Uuid {
        runtime.publish(Payload::Chat(task_turn(task)), self.topic(session))
    }

    /// Publish `task` under the caller's cancellation token
    pub fn start_with_token(
        &self,
        runtime: &Runtime,
        session: &str,
        task: impl Into<String>,
        cancellation: CancellationToken,
    ) -> Uuid {
        runtime.publish_with_token(Payload::Chat(task_turn(task)), self.topic(session), cancellation)
    }

    fn topic(&self, session: &str) -> TopicId {
        TopicId::new(self.group_topic.as_str(), session)
    }

    /// Result of a finished session
    #[must_use]
    pub fn result(&self, session: &str) -> Option<ChatResult> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session)
            .cloned()
    }
}

fn task_turn(task: impl Into<String>) -> Message {
    Message::user(task).from_source(TASK_SOURCE)
}

fn factory<F>(build: F) -> AgentFactory
where
    F: Fn(&AgentId) -> Box<dyn Agent> + Send + Sync + 'static,
{
    Arc::new(build)
}
