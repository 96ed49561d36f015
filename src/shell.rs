//! Line-oriented operator shell
//!
//! Each input line is parsed into a [`Command`] and dispatched against the
//! shared console. Background notices (replies landing, links completing) are
//! printed between commands.

use std::io::Write;

use chrono::{DateTime, Local, Utc};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::agents::AgentRole;
use crate::automation::{Automation, Notice, ReplyTask};
use crate::console::{Console, View};
use crate::conversations::{Conversation, Sender};
use crate::link::LinkPhase;
use crate::prompt::PaymentDetails;
use crate::{Error, Result};

/// Field separator for multi-word arguments
const SEP: &str = "::";

/// Log entries shown on the dashboard
const DASHBOARD_LOG_ENTRIES: usize = 5;

/// Characters of an id shown in listings
const SHORT_ID: usize = 8;

const HELP: &str = "\
Commands:
  view [dashboard|conversations|agents|link|settings|logs]
  agents                                   list agents
  agent add NAME :: ROLE :: INSTRUCTION    create an agent
  agent edit AGENT :: NAME :: ROLE :: INSTRUCTION
  agent instruct AGENT :: INSTRUCTION      replace an agent's instruction
  agent toggle AGENT                       activate or deactivate
  agent delete AGENT
  chats                                    list conversations
  chat new NAME :: NUMBER [:: AGENT]       start a conversation
  chat open CHAT                           select and show a conversation
  chat assign CHAT :: AGENT|none
  send TEXT                                simulate a customer message
  link NUMBER                              link the instance
  unlink
  bank NAME :: HOLDER :: IBAN              set payment details
  logs [clear]
  status
  quit";

/// A parsed shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    View(Option<View>),
    Agents,
    AgentAdd {
        name: String,
        role: AgentRole,
        instruction: String,
    },
    AgentEdit {
        agent: String,
        name: String,
        role: AgentRole,
        instruction: String,
    },
    AgentInstruct {
        agent: String,
        instruction: String,
    },
    AgentToggle(String),
    AgentDelete(String),
    Chats,
    ChatNew {
        name: String,
        number: String,
        agent: Option<String>,
    },
    ChatOpen(String),
    ChatAssign {
        chat: String,
        agent: Option<String>,
    },
    Send(String),
    Link(String),
    Unlink,
    Bank(PaymentDetails),
    Logs,
    LogsClear,
    Status,
    Quit,
}

/// Parse one input line; blank lines yield `None`
///
/// # Errors
///
/// Returns [`Error::Command`] for unknown commands or malformed arguments
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = split_word(line);
    let command = match word.to_lowercase().as_str() {
        "help" | "?" => Command::Help,
        "view" => Command::View(if rest.is_empty() {
            None
        } else {
            Some(rest.parse()?)
        }),
        "agents" => Command::Agents,
        "agent" => parse_agent(rest)?,
        "chats" => Command::Chats,
        "chat" => parse_chat(rest)?,
        "send" => Command::Send(rest.to_string()),
        "link" => Command::Link(required(rest, "link NUMBER")?.to_string()),
        "unlink" => Command::Unlink,
        "bank" => {
            let [bank_name, account_holder, iban] = fields(rest, "bank NAME :: HOLDER :: IBAN")?;
            Command::Bank(PaymentDetails {
                bank_name,
                account_holder,
                iban,
            })
        }
        "logs" => match rest {
            "" => Command::Logs,
            "clear" => Command::LogsClear,
            other => return Err(Error::Command(format!("unknown logs option '{other}'"))),
        },
        "status" => Command::Status,
        "quit" | "exit" => Command::Quit,
        other => {
            return Err(Error::Command(format!(
                "unknown command '{other}', type 'help'"
            )));
        }
    };
    Ok(Some(command))
}

fn parse_agent(args: &str) -> Result<Command> {
    let (sub, rest) = split_word(args);
    match sub {
        "add" => {
            let [name, role, instruction] = fields(rest, "agent add NAME :: ROLE :: INSTRUCTION")?;
            Ok(Command::AgentAdd {
                name,
                role: role.parse()?,
                instruction,
            })
        }
        "edit" => {
            let [agent, name, role, instruction] =
                fields(rest, "agent edit AGENT :: NAME :: ROLE :: INSTRUCTION")?;
            Ok(Command::AgentEdit {
                agent,
                name,
                role: role.parse()?,
                instruction,
            })
        }
        "instruct" => {
            let [agent, instruction] = fields(rest, "agent instruct AGENT :: INSTRUCTION")?;
            Ok(Command::AgentInstruct { agent, instruction })
        }
        "toggle" => Ok(Command::AgentToggle(
            required(rest, "agent toggle AGENT")?.to_string(),
        )),
        "delete" => Ok(Command::AgentDelete(
            required(rest, "agent delete AGENT")?.to_string(),
        )),
        other => Err(Error::Command(format!("unknown agent subcommand '{other}'"))),
    }
}

fn parse_chat(args: &str) -> Result<Command> {
    let (sub, rest) = split_word(args);
    match sub {
        "new" => {
            let parts = split_fields(rest);
            match parts.as_slice() {
                [name, number] => Ok(Command::ChatNew {
                    name: name.clone(),
                    number: number.clone(),
                    agent: None,
                }),
                [name, number, agent] => Ok(Command::ChatNew {
                    name: name.clone(),
                    number: number.clone(),
                    agent: Some(agent.clone()),
                }),
                _ => Err(usage("chat new NAME :: NUMBER [:: AGENT]")),
            }
        }
        "open" => Ok(Command::ChatOpen(
            required(rest, "chat open CHAT")?.to_string(),
        )),
        "assign" => {
            let [chat, agent] = fields(rest, "chat assign CHAT :: AGENT|none")?;
            let agent = (!agent.eq_ignore_ascii_case("none")).then_some(agent);
            Ok(Command::ChatAssign { chat, agent })
        }
        other => Err(Error::Command(format!("unknown chat subcommand '{other}'"))),
    }
}

fn split_word(s: &str) -> (&str, &str) {
    s.split_once(char::is_whitespace)
        .map_or((s, ""), |(word, rest)| (word, rest.trim()))
}

fn split_fields(s: &str) -> Vec<String> {
    if s.trim().is_empty() {
        return Vec::new();
    }
    s.split(SEP).map(|p| p.trim().to_string()).collect()
}

fn fields<const N: usize>(s: &str, usage_text: &str) -> Result<[String; N]> {
    split_fields(s)
        .try_into()
        .map_err(|_| usage(usage_text))
}

fn required<'a>(s: &'a str, usage_text: &str) -> Result<&'a str> {
    if s.is_empty() {
        Err(usage(usage_text))
    } else {
        Ok(s)
    }
}

fn usage(text: &str) -> Error {
    Error::Command(format!("usage: {text}"))
}

/// Resolve an operator reference to an id
///
/// Matches an exact id, then a case-insensitive name, then a unique id prefix.
fn resolve(candidates: &[(&str, &str)], query: &str, what: &str) -> Result<String> {
    if let Some((id, _)) = candidates.iter().find(|(id, _)| *id == query) {
        return Ok((*id).to_string());
    }
    if let Some((id, _)) = candidates
        .iter()
        .find(|(_, name)| name.eq_ignore_ascii_case(query))
    {
        return Ok((*id).to_string());
    }
    let mut matches = candidates.iter().filter(|(id, _)| id.starts_with(query));
    match (matches.next(), matches.next()) {
        (Some((id, _)), None) => Ok((*id).to_string()),
        (Some(_), Some(_)) => Err(Error::Command(format!("{what} '{query}' is ambiguous"))),
        (None, _) => Err(Error::Command(format!("no {what} matches '{query}'"))),
    }
}

fn resolve_agent(console: &Console, query: &str) -> Result<String> {
    let candidates: Vec<(&str, &str)> = console
        .agents()
        .iter()
        .map(|a| (a.id.as_str(), a.name.as_str()))
        .collect();
    resolve(&candidates, query, "agent")
}

fn resolve_chat(console: &Console, query: &str) -> Result<String> {
    let candidates: Vec<(&str, &str)> = console
        .conversations()
        .iter()
        .map(|c| (c.id.as_str(), c.contact_name.as_str()))
        .collect();
    resolve(&candidates, query, "conversation")
}

fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID).unwrap_or(id)
}

fn clock(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M").to_string()
}

// Rendering

/// Print the dashboard: link status, counters and the latest log entries
///
/// # Errors
///
/// Returns error if writing to `out` fails
pub fn render_dashboard(console: &Console, out: &mut impl Write) -> Result<()> {
    let stats = console.stats();
    render_link(console, out)?;
    writeln!(out, "Messages received: {}", stats.messages_received)?;
    writeln!(out, "Replies sent:      {}", stats.replies_sent)?;
    writeln!(out, "Active agents:     {}", stats.active_agents)?;
    writeln!(out, "Conversations:     {} ({} unread)", stats.conversations, stats.unread)?;
    if !console.log().is_empty() {
        writeln!(out, "Recent activity:")?;
        for entry in console.log().recent(DASHBOARD_LOG_ENTRIES) {
            writeln!(out, "  {} {:<7} {}", clock(entry.timestamp), entry.kind, entry.message)?;
        }
    }
    Ok(())
}

fn render_link(console: &Console, out: &mut impl Write) -> Result<()> {
    let link = console.link();
    match console.link_phase() {
        LinkPhase::Linked => writeln!(out, "Instance: linked ({})", link.phone_number)?,
        LinkPhase::Linking => writeln!(out, "Instance: linking {}...", link.phone_number)?,
        LinkPhase::Unlinked => writeln!(out, "Instance: not linked")?,
    }
    Ok(())
}

fn render_agents(console: &Console, out: &mut impl Write) -> Result<()> {
    if console.agents().is_empty() {
        writeln!(out, "No agents")?;
    }
    for agent in console.agents().iter() {
        let state = if agent.is_active { "on " } else { "off" };
        writeln!(
            out,
            "{} [{state}] {} ({})",
            short_id(&agent.id),
            agent.name,
            agent.role
        )?;
        writeln!(out, "    {}", agent.instruction)?;
    }
    Ok(())
}

fn render_chats(console: &Console, out: &mut impl Write) -> Result<()> {
    if console.conversations().is_empty() {
        writeln!(out, "No conversations")?;
    }
    let selected = console.conversations().selected_id();
    for conversation in console.conversations().iter() {
        let marker = if selected == Some(conversation.id.as_str()) { '*' } else { ' ' };
        let unread = match conversation.unread_count {
            0 => String::new(),
            n => format!(" ({n} unread)"),
        };
        let typing = if console.is_typing(&conversation.id) { " [typing...]" } else { "" };
        writeln!(
            out,
            "{marker}{} {} {}{unread}{typing}",
            short_id(&conversation.id),
            conversation.contact_name,
            conversation.contact_number
        )?;
        if !conversation.last_message.is_empty() {
            writeln!(out, "    {} {}", clock(conversation.timestamp), conversation.last_message)?;
        }
    }
    Ok(())
}

fn render_transcript(
    console: &Console,
    conversation: &Conversation,
    out: &mut impl Write,
) -> Result<()> {
    let agent = conversation
        .agent_id
        .as_deref()
        .and_then(|id| console.agents().get(id))
        .map_or("no agent", |a| a.name.as_str());
    writeln!(
        out,
        "-- {} {} [{agent}]",
        conversation.contact_name, conversation.contact_number
    )?;
    for message in &conversation.messages {
        let who = match message.sender {
            Sender::Customer => conversation.contact_name.as_str(),
            Sender::Bot => agent,
        };
        writeln!(out, "{} {who}: {}", clock(message.timestamp), message.content)?;
    }
    if console.is_typing(&conversation.id) {
        writeln!(out, "{agent} is typing...")?;
    }
    Ok(())
}

fn render_logs(console: &Console, out: &mut impl Write) -> Result<()> {
    if console.log().is_empty() {
        writeln!(out, "Log is empty")?;
    }
    for entry in console.log().iter() {
        writeln!(out, "{} {:<7} {}", clock(entry.timestamp), entry.kind, entry.message)?;
    }
    Ok(())
}

fn render_settings(console: &Console, out: &mut impl Write) -> Result<()> {
    let payment = console.payment();
    if payment.is_configured() {
        writeln!(out, "Bank:           {}", payment.bank_name)?;
        writeln!(out, "Account holder: {}", payment.account_holder)?;
        writeln!(out, "IBAN:           {}", payment.iban)?;
    } else {
        writeln!(out, "Payment details not configured")?;
    }
    writeln!(out, "Locale:         {}", console.house_rules().locale)?;
    Ok(())
}

fn render_view(console: &Console, view: View, out: &mut impl Write) -> Result<()> {
    match view {
        View::Dashboard => render_dashboard(console, out),
        View::Conversations => render_chats(console, out),
        View::Agents => render_agents(console, out),
        View::Link => render_link(console, out),
        View::Settings => render_settings(console, out),
        View::Logs => render_logs(console, out),
    }
}

fn render_notice(notice: &Notice, out: &mut impl Write) -> Result<()> {
    match notice {
        Notice::Reply {
            contact_name,
            outcome,
            ..
        } => writeln!(out, "\n[reply to {contact_name}] {}", outcome.text())?,
        Notice::Linked { phone_number } => writeln!(out, "\n[linked] {phone_number}")?,
    }
    Ok(())
}

/// Interactive session over a shared console
pub struct Shell {
    automation: Automation,
    replies: Vec<ReplyTask>,
    links: Vec<JoinHandle<bool>>,
    prompt: bool,
}

impl Shell {
    #[must_use]
    pub const fn new(automation: Automation) -> Self {
        Self {
            automation,
            replies: Vec::new(),
            links: Vec::new(),
            prompt: false,
        }
    }

    /// Print a prompt before each command
    #[must_use]
    pub const fn with_prompt(mut self, prompt: bool) -> Self {
        self.prompt = prompt;
        self
    }

    /// Read commands until `quit` or end of input
    ///
    /// Outstanding replies and links are awaited before returning so nothing
    /// is lost when input ends early.
    ///
    /// # Errors
    ///
    /// Returns error if reading input or writing output fails
    pub async fn run<R, W>(
        &mut self,
        input: R,
        out: &mut W,
        mut notices: mpsc::UnboundedReceiver<Notice>,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        {
            let console = self.automation.console().lock().await;
            render_view(&console, console.view(), out)?;
        }

        let mut lines = input.lines();
        loop {
            if self.prompt {
                write!(out, "autozap> ")?;
                out.flush()?;
            }

            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    match parse_command(&line) {
                        Ok(None) => {}
                        Ok(Some(Command::Quit)) => break,
                        Ok(Some(command)) => {
                            if let Err(e) = self.dispatch(command, out).await {
                                writeln!(out, "error: {e}")?;
                            }
                        }
                        Err(e) => writeln!(out, "error: {e}")?,
                    }
                }
                Some(notice) = notices.recv() => render_notice(&notice, out)?,
            }

            self.replies.retain(|t| !t.is_finished());
            self.links.retain(|h| !h.is_finished());
        }

        self.drain().await;
        while let Ok(notice) = notices.try_recv() {
            render_notice(&notice, out)?;
        }
        Ok(())
    }

    /// Wait for every spawned task
    async fn drain(&mut self) {
        for task in self.replies.drain(..) {
            let conversation_id = task.conversation_id.clone();
            if let Err(e) = task.wait().await {
                tracing::error!(%conversation_id, error = %e, "reply task failed");
            }
        }
        for handle in self.links.drain(..) {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "link task failed");
            }
        }
    }

    async fn dispatch(&mut self, command: Command, out: &mut impl Write) -> Result<()> {
        match command {
            Command::Send(text) => {
                // Blank messages are dropped like an empty composer
                if text.trim().is_empty() {
                    return Ok(());
                }
                let selected = {
                    let console = self.automation.console().lock().await;
                    console.conversations().selected_id().map(str::to_string)
                };
                let Some(conversation_id) = selected else {
                    return Err(Error::Command(
                        "no conversation selected, use 'chat open'".to_string(),
                    ));
                };
                match self.automation.send(&conversation_id, &text).await {
                    Some(task) => {
                        writeln!(out, "sent, agent is typing...")?;
                        self.replies.push(task);
                    }
                    None => writeln!(out, "sent")?,
                }
                return Ok(());
            }
            Command::Link(number) => {
                match self.automation.link(&number).await {
                    Some(handle) => {
                        writeln!(out, "scan the QR code to finish linking...")?;
                        self.links.push(handle);
                    }
                    None => writeln!(
                        out,
                        "cannot link '{number}': need at least 9 digits and an unlinked instance"
                    )?,
                }
                return Ok(());
            }
            _ => {}
        }

        let mut console = self.automation.console().lock().await;
        match command {
            Command::Help => writeln!(out, "{HELP}")?,
            Command::View(None) => render_view(&console, console.view(), out)?,
            Command::View(Some(view)) => {
                console.set_view(view);
                render_view(&console, view, out)?;
            }
            Command::Agents => render_agents(&console, out)?,
            Command::AgentAdd {
                name,
                role,
                instruction,
            } => {
                if let Some(agent) = console.create_agent(&name, role, &instruction) {
                    writeln!(out, "created agent {} ({})", agent.name, short_id(&agent.id))?;
                }
            }
            Command::AgentEdit {
                agent,
                name,
                role,
                instruction,
            } => {
                let id = resolve_agent(&console, &agent)?;
                if console.update_agent(&id, &name, role, &instruction) {
                    writeln!(out, "updated")?;
                }
            }
            Command::AgentInstruct { agent, instruction } => {
                let id = resolve_agent(&console, &agent)?;
                if console.update_agent_instruction(&id, &instruction) {
                    writeln!(out, "updated")?;
                }
            }
            Command::AgentToggle(agent) => {
                let id = resolve_agent(&console, &agent)?;
                if let Some(active) = console.toggle_agent(&id) {
                    writeln!(out, "{}", if active { "activated" } else { "deactivated" })?;
                }
            }
            Command::AgentDelete(agent) => {
                let id = resolve_agent(&console, &agent)?;
                if let Some(agent) = console.delete_agent(&id) {
                    writeln!(out, "deleted {}", agent.name)?;
                }
            }
            Command::Chats => render_chats(&console, out)?,
            Command::ChatNew {
                name,
                number,
                agent,
            } => {
                let agent_id = agent
                    .map(|a| resolve_agent(&console, &a))
                    .transpose()?;
                let conversation = console
                    .create_conversation(&name, &number, agent_id.as_deref())
                    .ok_or_else(|| usage("chat new NAME :: NUMBER [:: AGENT]"))?;
                console.select_conversation(&conversation.id);
                writeln!(
                    out,
                    "opened conversation with {} ({})",
                    conversation.contact_name,
                    short_id(&conversation.id)
                )?;
            }
            Command::ChatOpen(chat) => {
                let id = resolve_chat(&console, &chat)?;
                console.select_conversation(&id);
                if let Some(conversation) = console.conversations().get(&id) {
                    render_transcript(&console, conversation, out)?;
                }
            }
            Command::ChatAssign { chat, agent } => {
                let id = resolve_chat(&console, &chat)?;
                let agent_id = agent
                    .map(|a| resolve_agent(&console, &a))
                    .transpose()?;
                console.assign_agent(&id, agent_id.as_deref());
                writeln!(out, "assigned")?;
            }
            Command::Unlink => {
                if console.unlink() {
                    writeln!(out, "unlinked")?;
                } else {
                    writeln!(out, "instance is not linked")?;
                }
            }
            Command::Bank(payment) => {
                console.set_payment(payment);
                render_settings(&console, out)?;
            }
            Command::Logs => render_logs(&console, out)?,
            Command::LogsClear => {
                console.clear_logs();
                writeln!(out, "log cleared")?;
            }
            Command::Status => render_dashboard(&console, out)?,
            Command::Send(_) | Command::Link(_) | Command::Quit => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_commands() {
        assert_eq!(parse_command("  ").unwrap(), None);
        assert_eq!(parse_command("agents").unwrap(), Some(Command::Agents));
        assert_eq!(
            parse_command("view Logs").unwrap(),
            Some(Command::View(Some(View::Logs)))
        );
        assert_eq!(parse_command("logs clear").unwrap(), Some(Command::LogsClear));
        assert_eq!(
            parse_command("send Bom dia, tudo bem?").unwrap(),
            Some(Command::Send("Bom dia, tudo bem?".to_string()))
        );
    }

    #[test]
    fn test_parse_separated_fields() {
        assert_eq!(
            parse_command("agent add Reservas :: reservations :: Book tables politely").unwrap(),
            Some(Command::AgentAdd {
                name: "Reservas".to_string(),
                role: AgentRole::Reservation,
                instruction: "Book tables politely".to_string(),
            })
        );
        assert_eq!(
            parse_command("chat assign c1 :: none").unwrap(),
            Some(Command::ChatAssign {
                chat: "c1".to_string(),
                agent: None,
            })
        );
        assert_eq!(
            parse_command("bank BAI :: AO Express :: AO06 0040").unwrap(),
            Some(Command::Bank(PaymentDetails {
                bank_name: "BAI".to_string(),
                account_holder: "AO Express".to_string(),
                iban: "AO06 0040".to_string(),
            }))
        );
    }

    #[test]
    fn test_parse_blank_fields() {
        assert_eq!(parse_command("send   ").unwrap(), Some(Command::Send(String::new())));
        assert!(matches!(
            parse_command("agent instruct 1 ::").unwrap(),
            Some(Command::AgentInstruct { ref instruction, .. }) if instruction.is_empty()
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("frobnicate").is_err());
        assert!(parse_command("link").is_err());
        assert!(parse_command("agent add OnlyName").is_err());
        assert!(parse_command("agent add A :: wizard :: text").is_err());
        assert!(parse_command("view inbox").is_err());
        assert!(parse_command("chat new Maria").is_err());
    }

    #[test]
    fn test_resolve_prefers_exact_then_name_then_prefix() {
        let items = [("abc123", "Maria"), ("abd456", "Januário"), ("c1", "Pedro")];

        assert_eq!(resolve(&items, "c1", "chat").unwrap(), "c1");
        assert_eq!(resolve(&items, "maria", "chat").unwrap(), "abc123");
        assert_eq!(resolve(&items, "abd", "chat").unwrap(), "abd456");
        assert!(resolve(&items, "ab", "chat").is_err());
        assert!(resolve(&items, "zz", "chat").is_err());
    }
}
