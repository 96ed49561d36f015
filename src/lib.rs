//! AutoZap - simulated WhatsApp automation console
//!
//! This library provides the core of the AutoZap console:
//! - Agent personas with free-text behavioral instructions
//! - Simulated customer conversations and the replies agents generate
//! - A bounded operator event log
//! - Simulated device linking
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Shell (terminal)                    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │      Automation (reply + link tasks, tokio)          │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │   Console   │  Agents  │  Conversations  │  Log     │
//! └──────┬─────────────────────────────┬────────────────┘
//!        │                             │
//! ┌──────▼──────────┐        ┌─────────▼───────────────┐
//! │ StateStore      │        │ ReplyGenerator → Gemini │
//! └─────────────────┘        └─────────────────────────┘
//! ```

pub mod agents;
pub mod automation;
pub mod config;
pub mod console;
pub mod conversations;
pub mod error;
pub mod events;
pub mod link;
pub mod prompt;
pub mod reply;
pub mod setup;
pub mod shell;
pub mod storage;

pub use agents::{Agent, AgentRole, AgentStore};
pub use automation::{Automation, Notice, ReplyTask, SharedConsole};
pub use config::Config;
pub use console::{Console, DashboardStats, Inbound, PendingReply, View};
pub use conversations::{Conversation, ConversationStore, Message, Sender};
pub use error::{Error, Result};
pub use events::{EventLog, LogEntry, LogKind};
pub use link::{LinkPhase, LinkState};
pub use prompt::{HouseRules, PaymentDetails};
pub use reply::{ReplyGenerator, ReplyOutcome, TextProvider};
pub use shell::Shell;
pub use storage::{JsonFileStore, MemoryStore, StateStore};
