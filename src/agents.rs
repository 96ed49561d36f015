//! Agent persona store
//!
//! Agents are reply-generation profiles: a free-text behavioral instruction plus
//! a role tag. Conversations refer to them by id without owning them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Avatar assigned to agents created without one
pub const DEFAULT_AVATAR: &str =
    "https://images.unsplash.com/photo-1507003211169-0a1dd7228f2d?w=100&h=100&fit=crop";

/// Business role an agent plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Sales,
    Support,
    Personal,
    Reservation,
}

impl AgentRole {
    /// Human-facing label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sales => "Sales",
            Self::Support => "Technical Support",
            Self::Personal => "Personal Assistant",
            Self::Reservation => "Reservations & Scheduling",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AgentRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sales" => Ok(Self::Sales),
            "support" => Ok(Self::Support),
            "personal" => Ok(Self::Personal),
            "reservation" | "reservations" => Ok(Self::Reservation),
            other => Err(Error::Command(format!(
                "unknown role '{other}' (expected sales, support, personal or reservation)"
            ))),
        }
    }
}

/// A configurable reply persona
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub role: AgentRole,
    /// Behavioral instruction embedded in the provider's system prompt
    pub instruction: String,
    pub is_active: bool,
    pub avatar: String,
}

/// Owns every agent; lookups by id are the only way to reach one
#[derive(Debug, Clone, Default)]
pub struct AgentStore {
    agents: Vec<Agent>,
}

impl AgentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn from_agents(agents: Vec<Agent>) -> Self {
        Self { agents }
    }

    /// Create an active agent
    ///
    /// Returns `None` without touching the store when name or instruction is blank.
    pub fn create(&mut self, name: &str, role: AgentRole, instruction: &str) -> Option<&Agent> {
        let name = name.trim();
        let instruction = instruction.trim();
        if name.is_empty() || instruction.is_empty() {
            return None;
        }

        let agent = Agent {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            role,
            instruction: instruction.to_string(),
            is_active: true,
            avatar: DEFAULT_AVATAR.to_string(),
        };
        tracing::info!(
            agent_id = %agent.id,
            name = %agent.name,
            role = ?agent.role,
            "agent created"
        );

        self.agents.push(agent);
        self.agents.last()
    }

    /// Insert a fully-formed agent (used for seed data)
    pub fn insert(&mut self, agent: Agent) {
        self.agents.push(agent);
    }

    /// Flip the active flag, returning the updated agent
    pub fn toggle_active(&mut self, id: &str) -> Option<&Agent> {
        let agent = self.agents.iter_mut().find(|a| a.id == id)?;
        agent.is_active = !agent.is_active;
        tracing::info!(agent_id = %id, active = agent.is_active, "agent toggled");
        Some(agent)
    }

    /// Replace the behavioral instruction; blank text is ignored
    pub fn update_instruction(&mut self, id: &str, instruction: &str) -> Option<&Agent> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return None;
        }
        let agent = self.agents.iter_mut().find(|a| a.id == id)?;
        agent.instruction = instruction.to_string();
        Some(agent)
    }

    /// Edit name, role and instruction together; blank fields are ignored
    pub fn update(
        &mut self,
        id: &str,
        name: &str,
        role: AgentRole,
        instruction: &str,
    ) -> Option<&Agent> {
        let (name, instruction) = (name.trim(), instruction.trim());
        if name.is_empty() || instruction.is_empty() {
            return None;
        }
        let agent = self.agents.iter_mut().find(|a| a.id == id)?;
        agent.name = name.to_string();
        agent.role = role;
        agent.instruction = instruction.to_string();
        Some(agent)
    }

    /// Remove an agent; conversations still pointing at it are left alone
    pub fn delete(&mut self, id: &str) -> Option<Agent> {
        let index = self.agents.iter().position(|a| a.id == id)?;
        let removed = self.agents.remove(index);
        tracing::info!(agent_id = %id, "agent deleted");
        Some(removed)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Resolve an optional reference to an agent that can answer right now
    #[must_use]
    pub fn active(&self, id: Option<&str>) -> Option<&Agent> {
        id.and_then(|id| self.get(id)).filter(|a| a.is_active)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<Agent> {
        self.agents.clone()
    }
}
