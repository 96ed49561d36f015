//! Shell integration tests
//!
//! Feeds scripted input through the shell and inspects output and state

use autozap::{MemoryStore, Shell};
use tokio::io::BufReader;

mod common;
use common::{MockProvider, instant_automation};

async fn run_script(store: &MemoryStore, script: &str, reply: &str) -> String {
    let (automation, rx) = instant_automation(store, Some(MockProvider::replying(reply)));
    let input = tokio_test::io::Builder::new().read(script.as_bytes()).build();

    let mut out = Vec::new();
    Shell::new(automation)
        .run(BufReader::new(input), &mut out, rx)
        .await
        .expect("shell failed");
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn test_full_session() {
    let store = MemoryStore::new();
    let output = run_script(&store, "link 923111222\n", "unused").await;
    assert!(output.contains("scan the QR code"));
    assert!(output.contains("[linked] +244 923111222"));

    let script = "\
chat open Januário Bento
send Qual é o preço do frete?
quit
";
    let output = run_script(&store, script, "O frete custa 5000 Kz.").await;

    assert!(output.contains("Instance: linked"));
    assert!(output.contains("Januário Bento"));
    assert!(output.contains("agent is typing"));

    let console = common::memory_console(&store);
    let conversation = console.conversations().get("c1").unwrap();
    assert_eq!(conversation.last_message, "O frete custa 5000 Kz.");
    assert!(console.link().is_linked);
}

#[tokio::test]
async fn test_send_without_selection_is_reported() {
    let store = MemoryStore::new();
    let output = run_script(&store, "send Olá\n", "unused").await;
    assert!(output.contains("no conversation selected"));
}

#[tokio::test]
async fn test_blank_input_is_ignored_quietly() {
    let store = MemoryStore::new();
    run_script(&store, "link 923111222\n", "unused").await;
    let before = common::memory_console(&store).agents().get("1").unwrap().instruction.clone();

    let script = "\
chat open c1
send    
agent add  :: sales :: Sell
agent add Vendas :: sales ::
agent instruct 1 ::   
agent edit 1 :: :: sales ::  
";
    let output = run_script(&store, script, "unused").await;
    assert!(!output.contains("error:"), "unexpected output: {output}");
    assert!(!output.contains("agent is typing"));

    let console = common::memory_console(&store);
    assert_eq!(console.agents().len(), 1);
    assert_eq!(console.agents().get("1").unwrap().instruction, before);
    assert_eq!(console.conversations().get("c1").unwrap().messages.len(), 2);
}

#[tokio::test]
async fn test_agent_management_commands() {
    let store = MemoryStore::new();
    let script = "\
agent add Reservas :: reservation :: Book tables for the restaurant
agent toggle Reservas
agent instruct Reservas :: Book tables and confirm by phone
agent edit Consultor AO Express :: Consultor :: sales :: Sell logistics services
agents
";
    let output = run_script(&store, script, "unused").await;
    assert!(output.contains("created agent Reservas"));
    assert!(output.contains("deactivated"));

    let console = common::memory_console(&store);
    let reservas = console
        .agents()
        .iter()
        .find(|a| a.name == "Reservas")
        .unwrap();
    assert!(!reservas.is_active);
    assert_eq!(reservas.instruction, "Book tables and confirm by phone");
    assert_eq!(console.agents().get("1").unwrap().name, "Consultor");
}

#[tokio::test]
async fn test_unknown_command_keeps_running() {
    let store = MemoryStore::new();
    let output = run_script(&store, "dance\nview logs\nlogs clear\n", "unused").await;
    assert!(output.contains("unknown command 'dance'"));
    assert!(output.contains("log cleared"));

    let console = common::memory_console(&store);
    assert!(console.log().is_empty());
    assert_eq!(console.view(), autozap::View::Logs);
}

#[tokio::test]
async fn test_new_chat_gets_reply_from_assigned_agent() {
    let store = MemoryStore::new();
    run_script(&store, "link 923111222\n", "unused").await;

    let script = "\
chat new Maria :: +244 912 000 000 :: 1
send Olá
";
    run_script(&store, script, "Olá Maria!").await;

    let console = common::memory_console(&store);
    let maria = console
        .conversations()
        .iter()
        .find(|c| c.contact_name == "Maria")
        .unwrap();
    assert_eq!(maria.messages.len(), 2);
    assert_eq!(maria.last_message, "Olá Maria!");
}
