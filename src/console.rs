//! Console state
//!
//! [`Console`] owns every store and is the only place state changes. Each
//! mutating operation runs synchronously, reports to the event log and ends
//! with one sync to the [`StateStore`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::agents::{Agent, AgentRole, AgentStore};
use crate::conversations::{Conversation, ConversationStore, Message, Sender};
use crate::events::{EventLog, LogKind};
use crate::link::{LinkPhase, LinkState};
use crate::prompt::{HouseRules, PaymentDetails};
use crate::reply::{HISTORY_WINDOW, ReplyOutcome, Turn};
use crate::storage::{Snapshot, StateStore};
use crate::{Error, Result};

/// Characters of a generated reply quoted in the event log
const LOG_PREVIEW_CHARS: usize = 30;

/// Screen the operator last looked at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Dashboard,
    Conversations,
    Agents,
    Link,
    Settings,
    Logs,
}

impl View {
    pub const ALL: [Self; 6] = [
        Self::Dashboard,
        Self::Conversations,
        Self::Agents,
        Self::Link,
        Self::Settings,
        Self::Logs,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Conversations => "conversations",
            Self::Agents => "agents",
            Self::Link => "link",
            Self::Settings => "settings",
            Self::Logs => "logs",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for View {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| Error::Command(format!("unknown view '{s}'")))
    }
}

/// A reply the caller must generate and hand back through [`Console::complete_reply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReply {
    /// Conversation the reply belongs to, captured at send time
    pub conversation_id: String,
    pub agent_name: String,
    pub instruction: String,
    /// Messages before the new one, oldest first
    pub history: Vec<Turn>,
    pub new_message: String,
    pub rules: HouseRules,
}

/// What happened to an inbound customer message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Blank text or unknown conversation; nothing changed
    Ignored,
    /// Appended, but no agent will answer (no active agent, or unlinked)
    Delivered,
    /// Appended and a reply is now pending
    ReplyPending(PendingReply),
}

/// Derived dashboard figures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DashboardStats {
    pub messages_received: usize,
    pub replies_sent: usize,
    pub active_agents: usize,
    pub conversations: usize,
    pub unread: u32,
}

/// All application state plus its persistence sink
pub struct Console {
    agents: AgentStore,
    conversations: ConversationStore,
    log: EventLog,
    link: LinkState,
    view: View,
    /// Operator-set payment details, persisted even when cleared
    payment: Option<PaymentDetails>,
    /// Configured fallback used until the operator sets payment details
    default_payment: PaymentDetails,
    locale: String,
    /// In-flight replies per conversation
    typing: HashMap<String, usize>,
    store: Arc<dyn StateStore>,
}

impl Console {
    /// Restore state from `store`, seeding demo data on first run
    ///
    /// `default_payment` applies until the operator sets payment details.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read or the first sync fails
    pub fn open(
        store: Arc<dyn StateStore>,
        locale: &str,
        default_payment: &PaymentDetails,
    ) -> Result<Self> {
        let snapshot = Snapshot::from_map(&store.load()?);

        let agents = snapshot
            .agents
            .map_or_else(seed_agents, AgentStore::from_agents);
        let conversations = snapshot
            .conversations
            .map_or_else(seed_conversations, ConversationStore::from_conversations);

        let console = Self {
            agents,
            conversations,
            log: EventLog::from_entries(snapshot.logs),
            link: LinkState::new(snapshot.is_linked, snapshot.phone_number),
            view: snapshot.view,
            payment: snapshot.payment,
            default_payment: default_payment.clone(),
            locale: locale.to_string(),
            typing: HashMap::new(),
            store,
        };

        tracing::info!(
            agents = console.agents.len(),
            conversations = console.conversations.len(),
            linked = console.link.is_linked,
            "console state restored"
        );

        console.flush()?;
        Ok(console)
    }

    /// Persist the current snapshot
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the store write fails
    pub fn flush(&self) -> Result<()> {
        self.store.save(&self.snapshot().to_map()?)
    }

    /// Single synchronization point; failures are logged, never fatal
    fn sync(&self) {
        if let Err(e) = self.flush() {
            tracing::error!(error = %e, "failed to persist console state");
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            agents: Some(self.agents.to_vec()),
            conversations: Some(self.conversations.to_vec()),
            logs: self.log.to_vec(),
            is_linked: self.link.is_linked,
            phone_number: self.link.phone_number.clone(),
            view: self.view,
            payment: self.payment.clone(),
        }
    }

    // Agents

    /// Create an active agent; blank name or instruction is ignored
    pub fn create_agent(
        &mut self,
        name: &str,
        role: AgentRole,
        instruction: &str,
    ) -> Option<Agent> {
        let agent = self.agents.create(name, role, instruction)?.clone();
        self.log
            .append(format!("Agent {} created ({})", agent.name, agent.role), LogKind::Success);
        self.sync();
        Some(agent)
    }

    /// Flip an agent's active flag, returning the new value
    pub fn toggle_agent(&mut self, id: &str) -> Option<bool> {
        let agent = self.agents.toggle_active(id)?;
        let (name, active) = (agent.name.clone(), agent.is_active);
        let state = if active { "activated" } else { "deactivated" };
        self.log.append(format!("Agent {name} {state}"), LogKind::Warning);
        self.sync();
        Some(active)
    }

    pub fn update_agent_instruction(&mut self, id: &str, instruction: &str) -> bool {
        let Some(agent) = self.agents.update_instruction(id, instruction) else {
            return false;
        };
        let name = agent.name.clone();
        self.log.append(format!("Agent {name} updated"), LogKind::Success);
        self.sync();
        true
    }

    pub fn update_agent(
        &mut self,
        id: &str,
        name: &str,
        role: AgentRole,
        instruction: &str,
    ) -> bool {
        let Some(agent) = self.agents.update(id, name, role, instruction) else {
            return false;
        };
        let name = agent.name.clone();
        self.log.append(format!("Agent {name} updated"), LogKind::Success);
        self.sync();
        true
    }

    /// Remove an agent; conversations referencing it lose their responder
    pub fn delete_agent(&mut self, id: &str) -> Option<Agent> {
        let agent = self.agents.delete(id)?;
        self.log
            .append(format!("Agent {} removed", agent.name), LogKind::Warning);
        self.sync();
        Some(agent)
    }

    // Conversations

    /// Start a conversation with a new contact
    pub fn create_conversation(
        &mut self,
        contact_name: &str,
        contact_number: &str,
        agent_id: Option<&str>,
    ) -> Option<Conversation> {
        let conversation = self
            .conversations
            .create(contact_name, contact_number, agent_id.map(str::to_string))?
            .clone();
        self.log.append(
            format!("Conversation opened with {}", conversation.contact_name),
            LogKind::Info,
        );
        self.sync();
        Some(conversation)
    }

    /// Bind a conversation to an agent, or unbind with `None`
    pub fn assign_agent(&mut self, conversation_id: &str, agent_id: Option<&str>) -> bool {
        let Some(conversation) = self
            .conversations
            .assign_agent(conversation_id, agent_id.map(str::to_string))
        else {
            return false;
        };
        let contact = conversation.contact_name.clone();
        let target = agent_id
            .and_then(|id| self.agents.get(id))
            .map_or_else(|| "no agent".to_string(), |a| a.name.clone());
        self.log
            .append(format!("Conversation with {contact} assigned to {target}"), LogKind::Info);
        self.sync();
        true
    }

    /// Make a conversation the active one and mark it read
    pub fn select_conversation(&mut self, conversation_id: &str) -> bool {
        if self.conversations.select(conversation_id).is_none() {
            return false;
        }
        self.sync();
        true
    }

    /// Append a simulated customer message and decide whether an agent answers
    ///
    /// The returned [`PendingReply`] keeps the conversation id so a late reply
    /// lands in the right thread whatever the operator has selected since.
    pub fn receive_customer_message(&mut self, conversation_id: &str, text: &str) -> Inbound {
        let text = text.trim();
        if text.is_empty() {
            return Inbound::Ignored;
        }
        let Some(conversation) = self.conversations.get(conversation_id) else {
            return Inbound::Ignored;
        };

        let history: Vec<Turn> = conversation
            .recent(HISTORY_WINDOW)
            .iter()
            .map(Turn::from)
            .collect();
        let contact = conversation.contact_name.clone();
        let agent = self
            .agents
            .active(conversation.agent_id.as_deref())
            .cloned();

        self.conversations
            .append_message(conversation_id, Message::customer(text));
        self.log
            .append(format!("Message received from {contact}: \"{text}\""), LogKind::Info);

        if !self.link.is_linked {
            self.log.append(
                "Message received but the instance is disconnected",
                LogKind::Error,
            );
            self.sync();
            return Inbound::Delivered;
        }

        let Some(agent) = agent else {
            tracing::debug!(conversation_id, "no active agent bound, not replying");
            self.sync();
            return Inbound::Delivered;
        };

        *self.typing.entry(conversation_id.to_string()).or_insert(0) += 1;
        self.log.append(
            format!("Agent {} is composing a reply", agent.name),
            LogKind::Info,
        );
        self.sync();

        Inbound::ReplyPending(PendingReply {
            conversation_id: conversation_id.to_string(),
            agent_name: agent.name,
            instruction: agent.instruction,
            history,
            new_message: text.to_string(),
            rules: self.house_rules(),
        })
    }

    /// Land a finished reply in its originating conversation
    ///
    /// Both terminal states append the outcome's text as a bot message; a
    /// failure additionally leaves an error entry.
    pub fn complete_reply(
        &mut self,
        conversation_id: &str,
        outcome: &ReplyOutcome,
    ) -> Option<Message> {
        if let Some(count) = self.typing.get_mut(conversation_id) {
            *count -= 1;
            if *count == 0 {
                self.typing.remove(conversation_id);
            }
        }

        match outcome {
            ReplyOutcome::Generated(text) => {
                let preview: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
                self.log
                    .append(format!("AI generated reply: \"{preview}...\""), LogKind::Success);
            }
            ReplyOutcome::Empty => {
                self.log
                    .append("Provider returned an empty reply, sent fallback", LogKind::Warning);
            }
            ReplyOutcome::MissingCredential => {
                self.log.append(
                    "Reply not generated: provider credential is not configured",
                    LogKind::Error,
                );
            }
            ReplyOutcome::ProviderFailed(e) => {
                self.log
                    .append(format!("Reply generation failed: {e}"), LogKind::Error);
            }
        }

        let message = self
            .conversations
            .append_message(conversation_id, Message::bot(outcome.text()))
            .cloned();
        self.sync();
        message
    }

    /// A reply is pending for this conversation
    #[must_use]
    pub fn is_typing(&self, conversation_id: &str) -> bool {
        self.typing.contains_key(conversation_id)
    }

    // Link

    /// Register a number and enter the linking phase
    pub fn request_link(&mut self, phone_number: &str) -> Option<String> {
        let number = self.link.request_link(phone_number)?.to_string();
        self.log.append(
            format!("Generating a new key pair to link {number}..."),
            LogKind::Info,
        );
        self.sync();
        Some(number)
    }

    /// Finish the simulated QR scan; `false` if the link was abandoned meanwhile
    pub fn complete_link(&mut self) -> bool {
        if !self.link.complete_link() {
            return false;
        }
        let number = self.link.phone_number.clone();
        self.log
            .append("QR code scanned successfully by the phone camera", LogKind::Success);
        self.log
            .append(format!("Session established for number {number}"), LogKind::Success);
        self.sync();
        true
    }

    pub fn unlink(&mut self) -> bool {
        if !self.link.unlink() {
            return false;
        }
        self.log.append("Session ended by the user", LogKind::Warning);
        self.sync();
        true
    }

    // Settings, view, log

    pub fn set_payment(&mut self, payment: PaymentDetails) {
        self.payment = Some(payment);
        self.log.append("Payment details updated", LogKind::Success);
        self.sync();
    }

    pub fn set_view(&mut self, view: View) {
        self.view = view;
        self.sync();
    }

    pub fn clear_logs(&mut self) {
        self.log.clear();
        self.sync();
    }

    /// House rules in force right now
    #[must_use]
    pub fn house_rules(&self) -> HouseRules {
        HouseRules {
            locale: self.locale.clone(),
            payment: None,
        }
        .with_payment(self.payment())
    }

    #[must_use]
    pub fn stats(&self) -> DashboardStats {
        let mut stats = DashboardStats {
            active_agents: self.agents.iter().filter(|a| a.is_active).count(),
            conversations: self.conversations.len(),
            ..DashboardStats::default()
        };
        for conversation in self.conversations.iter() {
            stats.unread += conversation.unread_count;
            for message in &conversation.messages {
                match message.sender {
                    Sender::Customer => stats.messages_received += 1,
                    Sender::Bot => stats.replies_sent += 1,
                }
            }
        }
        stats
    }

    #[must_use]
    pub const fn agents(&self) -> &AgentStore {
        &self.agents
    }

    #[must_use]
    pub const fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    #[must_use]
    pub const fn log(&self) -> &EventLog {
        &self.log
    }

    #[must_use]
    pub const fn link(&self) -> &LinkState {
        &self.link
    }

    #[must_use]
    pub const fn link_phase(&self) -> LinkPhase {
        self.link.phase()
    }

    #[must_use]
    pub const fn view(&self) -> View {
        self.view
    }

    /// Payment details in force: the operator's, else the configured default
    #[must_use]
    pub fn payment(&self) -> &PaymentDetails {
        self.payment.as_ref().unwrap_or(&self.default_payment)
    }
}

/// Demo persona installed on first run
fn seed_agents() -> AgentStore {
    let mut store = AgentStore::new();
    store.insert(Agent {
        id: "1".to_string(),
        name: "Consultor AO Express".to_string(),
        role: AgentRole::Sales,
        instruction: "Venda serviços de logística em Luanda. Seja muito profissional e use \
                      \"Nguami\" ou \"Kambas\" apenas se o cliente for muito informal."
            .to_string(),
        is_active: true,
        avatar: crate::agents::DEFAULT_AVATAR.to_string(),
    });
    store
}

/// Demo conversation installed on first run
fn seed_conversations() -> ConversationStore {
    let now = Utc::now();
    let mut first = Message::customer("Bom dia, gostaria de saber o status do meu contentor.");
    first.timestamp = now - Duration::hours(2);
    let mut second = Message::customer("A encomenda já chegou no Porto de Luanda?");
    second.timestamp = now;

    let mut conversation = Conversation {
        id: "c1".to_string(),
        contact_name: "Januário Bento".to_string(),
        contact_number: "+244 923 111 222".to_string(),
        last_message: String::new(),
        timestamp: now,
        unread_count: 0,
        messages: Vec::new(),
        agent_id: Some("1".to_string()),
    };
    conversation.append(first);
    conversation.append(second);
    conversation.unread_count = 1;

    ConversationStore::from_conversations(vec![conversation])
}
