//! Asynchronous drivers for delayed work
//!
//! Replies and link completion both pause for a cosmetic delay and then apply
//! their result to the shared [`Console`]. The console lock is never held
//! across the delay or the provider call.
//!
//! Console mutations save the state file while the lock is held so saves land
//! in mutation order. Those mutations run on the blocking pool so a slow disk
//! never stalls the async workers.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::config::SimulationConfig;
use crate::console::{Console, Inbound};
use crate::reply::{ReplyGenerator, ReplyOutcome};
use crate::{Error, Result};

/// Console shared between the shell and background tasks
pub type SharedConsole = Arc<Mutex<Console>>;

/// Something a background task finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A reply landed in `conversation_id`
    Reply {
        conversation_id: String,
        contact_name: String,
        outcome: ReplyOutcome,
    },
    /// The pending link completed
    Linked { phone_number: String },
}

/// Handle to an in-flight reply
#[derive(Debug)]
pub struct ReplyTask {
    pub conversation_id: String,
    handle: JoinHandle<ReplyOutcome>,
}

impl ReplyTask {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the reply to land
    ///
    /// # Errors
    ///
    /// Returns error if the task panicked or was cancelled
    pub async fn wait(self) -> Result<ReplyOutcome> {
        self.handle
            .await
            .map_err(|e| Error::Provider(format!("reply task aborted: {e}")))
    }
}

/// Spawns reply and link tasks against a shared console
#[derive(Clone)]
pub struct Automation {
    console: SharedConsole,
    generator: ReplyGenerator,
    simulation: SimulationConfig,
    notices: Option<mpsc::UnboundedSender<Notice>>,
}

impl Automation {
    #[must_use]
    pub const fn new(
        console: SharedConsole,
        generator: ReplyGenerator,
        simulation: SimulationConfig,
    ) -> Self {
        Self {
            console,
            generator,
            simulation,
            notices: None,
        }
    }

    /// Report finished work on `tx`
    #[must_use]
    pub fn with_notices(mut self, tx: mpsc::UnboundedSender<Notice>) -> Self {
        self.notices = Some(tx);
        self
    }

    #[must_use]
    pub const fn console(&self) -> &SharedConsole {
        &self.console
    }

    /// Deliver a customer message and, when an agent answers, spawn its reply
    ///
    /// Returns `None` when no reply will follow.
    pub async fn send(&self, conversation_id: &str, text: &str) -> Option<ReplyTask> {
        let (id, text) = (conversation_id.to_string(), text.to_string());
        let inbound = match update_console(&self.console, move |console| {
            console.receive_customer_message(&id, &text)
        })
        .await
        {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::error!(error = %e, "failed to deliver customer message");
                return None;
            }
        };

        let Inbound::ReplyPending(pending) = inbound else {
            return None;
        };

        let console = Arc::clone(&self.console);
        let generator = self.generator.clone();
        let delay = self.simulation.reply_delay;
        let notices = self.notices.clone();
        let conversation_id = pending.conversation_id.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let outcome = generator
                .generate_reply(
                    &pending.rules,
                    &pending.instruction,
                    &pending.history,
                    &pending.new_message,
                )
                .await;

            let (id, landed) = (pending.conversation_id.clone(), outcome.clone());
            let contact_name = update_console(&console, move |console| {
                console.complete_reply(&id, &landed);
                console
                    .conversations()
                    .get(&id)
                    .map(|c| c.contact_name.clone())
                    .unwrap_or_default()
            })
            .await
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "failed to record reply");
                String::new()
            });

            tracing::info!(
                conversation_id = %pending.conversation_id,
                agent = %pending.agent_name,
                resolved = outcome.is_resolved(),
                "reply delivered"
            );

            if let Some(tx) = notices {
                let _ = tx.send(Notice::Reply {
                    conversation_id: pending.conversation_id,
                    contact_name,
                    outcome: outcome.clone(),
                });
            }
            outcome
        });

        Some(ReplyTask {
            conversation_id,
            handle,
        })
    }

    /// Start linking `phone_number`; the link completes after the scan delay
    ///
    /// Returns `None` when the number is invalid or a link is already active.
    pub async fn link(&self, phone_number: &str) -> Option<JoinHandle<bool>> {
        let requested = phone_number.to_string();
        let number = match update_console(&self.console, move |console| {
            console.request_link(&requested)
        })
        .await
        {
            Ok(number) => number?,
            Err(e) => {
                tracing::error!(error = %e, "failed to request link");
                return None;
            }
        };

        let console = Arc::clone(&self.console);
        let delay = self.simulation.link_delay;
        let notices = self.notices.clone();

        Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let linked = update_console(&console, Console::complete_link)
                .await
                .unwrap_or_else(|e| {
                    tracing::error!(error = %e, "failed to complete link");
                    false
                });
            if linked {
                tracing::info!(phone_number = %number, "instance linked");
                if let Some(tx) = notices {
                    let _ = tx.send(Notice::Linked {
                        phone_number: number,
                    });
                }
            } else {
                tracing::debug!("link abandoned before the scan finished");
            }
            linked
        }))
    }
}

/// Apply `f` to the console on the blocking pool
async fn update_console<T, F>(console: &SharedConsole, f: F) -> Result<T>
where
    F: FnOnce(&mut Console) -> T + Send + 'static,
    T: Send + 'static,
{
    let console = Arc::clone(console);
    tokio::task::spawn_blocking(move || f(&mut console.blocking_lock()))
        .await
        .map_err(|e| Error::Storage(format!("console update aborted: {e}")))
}
