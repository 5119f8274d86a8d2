//! Integration test: walk the intake survey with the bundled English pack and
//! a JSON Lines store in a temporary directory.

use parley::channels::{InboundMessage, User};
use parley::conversation::{dispatch, EntryPoint, Outbound, SessionRegistry};
use parley::store::JsonlStore;
use parley::survey::{LanguagePack, SurveyFlow};
use std::path::PathBuf;
use std::sync::Arc;

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("parley-survey-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn message(text: &str) -> InboundMessage {
    InboundMessage {
        channel_id: "tg".to_string(),
        conversation_id: "42".to_string(),
        sender: User {
            id: "42".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            username: Some("ada".to_string()),
        },
        text: text.to_string(),
    }
}

struct Chat {
    sessions: SessionRegistry,
    entry: EntryPoint,
}

impl Chat {
    fn new(flow: &SurveyFlow) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            entry: Arc::new(flow.entry_point()),
        }
    }

    fn say(&mut self, text: &str) -> Vec<Outbound> {
        dispatch(&mut self.sessions, &message(text), &self.entry)
    }
}

fn texts(out: &[Outbound]) -> Vec<&str> {
    out.iter().map(|o| o.text()).collect()
}

fn options(out: &[Outbound]) -> Vec<String> {
    match out.last() {
        Some(Outbound::WithOptions { options, .. }) => options.clone(),
        _ => Vec::new(),
    }
}

fn fill(chat: &mut Chat, pack: &LanguagePack) -> Vec<Outbound> {
    chat.say("/start");
    let out = chat.say(&pack.labels.yes);
    assert_eq!(options(&out), vec!["Ada Lovelace", "Cancel"]);
    chat.say("Ada Lovelace");
    chat.say("33");
    chat.say("Yes");
    chat.say("Exam anxiety");
    chat.say("No");
    chat.say("ada@example.com")
}

#[test]
fn start_command_greets_then_asks_to_apply() {
    let dir = temp_dir();
    let pack = LanguagePack::bundled("en").unwrap();
    let flow = SurveyFlow::new(pack.clone(), Arc::new(JsonlStore::new(dir.join("r.jsonl"))));
    let mut chat = Chat::new(&flow);

    let out = chat.say("/start");
    assert_eq!(
        texts(&out),
        vec![
            pack.start_hint.as_str(),
            pack.welcome.as_str(),
            pack.go_to_survey.as_str()
        ]
    );
    assert!(matches!(out[1], Outbound::Text(_)));
    assert_eq!(options(&out), vec!["Yes", "No", "Cancel"]);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn completed_survey_is_stored_and_returns_to_start() {
    let dir = temp_dir();
    let store = Arc::new(JsonlStore::new(dir.join("records.jsonl")));
    let pack = LanguagePack::bundled("en").unwrap();
    let flow = SurveyFlow::new(pack.clone(), store.clone());
    let mut chat = Chat::new(&flow);

    let summary = fill(&mut chat, &pack);
    let rendered = summary.last().unwrap().text();
    assert!(rendered.contains(&pack.questions.age));
    assert!(rendered.contains("Exam anxiety"));
    assert!(rendered.ends_with(&pack.confirm));
    assert_eq!(options(&summary).first().map(String::as_str), Some("Submit"));
    assert_eq!(options(&summary).last().map(String::as_str), Some("Cancel"));

    let out = chat.say("Submit");
    assert_eq!(texts(&out), vec![pack.thanks.as_str(), pack.start_hint.as_str()]);

    let records = store.read_all().unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.chat_id, "tg:42");
    assert_eq!(record.name, "Ada Lovelace");
    assert_eq!(record.age, "33");
    assert_eq!(record.city, "Yes");
    assert_eq!(record.health, "No");
    assert_eq!(record.contact, "ada@example.com (tg: ada)");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn editing_a_field_returns_to_the_summary() {
    let dir = temp_dir();
    let store = Arc::new(JsonlStore::new(dir.join("records.jsonl")));
    let pack = LanguagePack::bundled("en").unwrap();
    let flow = SurveyFlow::new(pack.clone(), store.clone());
    let mut chat = Chat::new(&flow);

    fill(&mut chat, &pack);
    let out = chat.say(&pack.labels.change_age);
    assert_eq!(texts(&out), vec![pack.questions.age.as_str()]);

    let out = chat.say("34");
    let rendered = out.last().unwrap().text();
    assert!(rendered.contains("34"));
    assert!(!rendered.contains("33"));

    chat.say("Submit");
    assert_eq!(store.read_all().unwrap()[0].age, "34");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unknown_answer_repeats_the_question() {
    let dir = temp_dir();
    let pack = LanguagePack::bundled("en").unwrap();
    let flow = SurveyFlow::new(pack.clone(), Arc::new(JsonlStore::new(dir.join("r.jsonl"))));
    let mut chat = Chat::new(&flow);

    let out = chat.say("hello");
    assert_eq!(texts(&out), vec![pack.start_hint.as_str(), pack.start_hint.as_str()]);

    chat.say("/start");
    let out = chat.say("Maybe");
    assert_eq!(texts(&out), vec![pack.go_to_survey.as_str()]);
    assert_eq!(options(&out), vec!["Yes", "No", "Cancel"]);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn cancel_goes_back_to_start_without_storing() {
    let dir = temp_dir();
    let store = Arc::new(JsonlStore::new(dir.join("records.jsonl")));
    let pack = LanguagePack::bundled("en").unwrap();
    let flow = SurveyFlow::new(pack.clone(), store.clone());
    let mut chat = Chat::new(&flow);

    chat.say("/start");
    chat.say("Yes");
    let out = chat.say(&pack.labels.cancel);
    assert_eq!(texts(&out), vec![pack.start_hint.as_str()]);
    assert!(store.read_all().unwrap().is_empty());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn store_failure_still_thanks_the_user() {
    let dir = temp_dir();
    // Parent of the records file is a regular file, so every append fails.
    let blocker = dir.join("blocker");
    std::fs::write(&blocker, b"").unwrap();
    let pack = LanguagePack::bundled("en").unwrap();
    let flow = SurveyFlow::new(
        pack.clone(),
        Arc::new(JsonlStore::new(blocker.join("records.jsonl"))),
    );
    let mut chat = Chat::new(&flow);

    fill(&mut chat, &pack);
    let out = chat.say("Submit");
    assert_eq!(texts(&out), vec![pack.thanks.as_str(), pack.start_hint.as_str()]);

    let _ = std::fs::remove_dir_all(&dir);
}
