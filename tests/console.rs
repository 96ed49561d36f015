//! Console persistence integration tests
//!
//! Exercises the JSON state file across console restarts

use std::sync::Arc;

use autozap::storage::keys;
use autozap::{AgentRole, Console, JsonFileStore, PaymentDetails, StateStore, View};

fn open(store: &JsonFileStore) -> Console {
    Console::open(Arc::new(store.clone()), "Angolan Portuguese", &PaymentDetails::default())
        .expect("failed to open console")
}

#[test]
fn test_first_run_writes_seeded_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("state.json"));

    let _console = open(&store);

    let map = store.load().unwrap();
    for key in [
        keys::AGENTS,
        keys::CONVERSATIONS,
        keys::LOGS,
        keys::IS_LINKED,
        keys::PHONE_NUMBER,
        keys::VIEW,
    ] {
        assert!(map.contains_key(key), "missing key {key}");
    }
    // Payment keys appear only once the operator sets them
    assert!(!map.contains_key(keys::BANK_NAME));
    assert_eq!(map[keys::AGENTS][0]["name"], "Consultor AO Express");
    assert_eq!(map[keys::VIEW], "dashboard");
}

#[test]
fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("state.json"));

    {
        let mut console = open(&store);
        let agent = console
            .create_agent("Suporte", AgentRole::Support, "Resolve technical issues")
            .unwrap();
        let conversation = console
            .create_conversation("Maria", "+244 912 000 000", Some(&agent.id))
            .unwrap();
        console.select_conversation(&conversation.id);
        console.receive_customer_message(&conversation.id, "O router não liga");
        console.set_payment(PaymentDetails {
            bank_name: "BFA".to_string(),
            account_holder: "AO Express".to_string(),
            iban: "AO06 0006".to_string(),
        });
        console.set_view(View::Settings);
    }

    let console = open(&store);
    assert_eq!(console.agents().len(), 2);
    assert_eq!(console.conversations().len(), 2);
    let maria = console
        .conversations()
        .iter()
        .find(|c| c.contact_name == "Maria")
        .unwrap();
    assert_eq!(maria.last_message, "O router não liga");
    assert_eq!(console.view(), View::Settings);
    assert_eq!(console.payment().bank_name, "BFA");
    assert!(console.house_rules().payment.is_some());
    assert!(
        console
            .log()
            .iter()
            .any(|e| e.message.contains("disconnected"))
    );
}

#[test]
fn test_cleared_payment_is_not_resurrected() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("state.json"));
    let configured = PaymentDetails {
        bank_name: "BAI".to_string(),
        account_holder: "AO Express".to_string(),
        iban: "AO06 0040".to_string(),
    };
    let open_with = |payment: &PaymentDetails| {
        Console::open(Arc::new(store.clone()), "Angolan Portuguese", payment).unwrap()
    };

    {
        let mut console = open_with(&configured);
        assert_eq!(console.payment(), &configured);
        console.set_payment(PaymentDetails::default());
    }

    let console = open_with(&configured);
    assert_eq!(console.payment(), &PaymentDetails::default());
    assert!(console.house_rules().payment.is_none());
    assert_eq!(store.load().unwrap()[keys::BANK_NAME], "");
}

#[test]
fn test_deleting_every_agent_is_not_reseeded() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("state.json"));

    {
        let mut console = open(&store);
        console.delete_agent("1").unwrap();
    }

    let console = open(&store);
    assert!(console.agents().is_empty());
    assert_eq!(
        console.conversations().get("c1").unwrap().agent_id.as_deref(),
        Some("1")
    );
}

#[test]
fn test_corrupt_key_falls_back_to_seed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, r#"{"agents": "oops", "is_linked": true, "view": "logs"}"#).unwrap();

    let console = open(&JsonFileStore::new(&path));
    assert_eq!(console.agents().len(), 1);
    assert!(console.link().is_linked);
    assert_eq!(console.view(), View::Logs);
}

#[test]
fn test_unreadable_state_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "not json").unwrap();

    let result = Console::open(
        Arc::new(JsonFileStore::new(&path)),
        "Angolan Portuguese",
        &PaymentDetails::default(),
    );
    assert!(result.is_err());
}
