//! The intake survey, assembled from the conversation combinators.
//!
//! start -> welcome -> name -> age -> city -> request -> health -> contact -> summary.
//! Every question offers Cancel (back to start). From the summary a single
//! field can be changed (asked in [`Mode::Edit`], which returns straight to the
//! summary) or the survey submitted to the record store.

use crate::conversation::{
    action, empty_action, save_key, send_text, sequence, transition_to, transition_to_with_answer,
    Action, BoxedHandler, Context, Options, OptionsHandler,
};
use crate::store::{RecordStore, SurveyRecord};
use crate::survey::lang::LanguagePack;
use chrono::Utc;
use std::sync::Arc;

pub const NAME_KEY: &str = "name";
pub const AGE_KEY: &str = "age";
pub const CITY_KEY: &str = "city";
pub const REQUEST_KEY: &str = "request";
pub const HEALTH_KEY: &str = "health";
pub const CONTACT_KEY: &str = "contact";

/// How a question continues once answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Go on to the next question (the summary after the last one).
    Fill,
    /// Go back to the summary.
    Edit,
}

/// One survey question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Age,
    City,
    Request,
    Health,
    Contact,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Name,
        Field::Age,
        Field::City,
        Field::Request,
        Field::Health,
        Field::Contact,
    ];

    /// Key-memory key the answer is saved under.
    pub fn key(self) -> &'static str {
        match self {
            Field::Name => NAME_KEY,
            Field::Age => AGE_KEY,
            Field::City => CITY_KEY,
            Field::Request => REQUEST_KEY,
            Field::Health => HEALTH_KEY,
            Field::Contact => CONTACT_KEY,
        }
    }

    pub fn next(self) -> Option<Field> {
        match self {
            Field::Name => Some(Field::Age),
            Field::Age => Some(Field::City),
            Field::City => Some(Field::Request),
            Field::Request => Some(Field::Health),
            Field::Health => Some(Field::Contact),
            Field::Contact => None,
        }
    }

    pub fn question(self, pack: &LanguagePack) -> &str {
        let q = &pack.questions;
        match self {
            Field::Name => &q.name,
            Field::Age => &q.age,
            Field::City => &q.city,
            Field::Request => &q.request,
            Field::Health => &q.health,
            Field::Contact => &q.contact,
        }
    }

    /// Summary button that re-asks this field.
    pub fn change_label(self, pack: &LanguagePack) -> &str {
        let l = &pack.labels;
        match self {
            Field::Name => &l.change_name,
            Field::Age => &l.change_age,
            Field::City => &l.change_city,
            Field::Request => &l.change_request,
            Field::Health => &l.change_health,
            Field::Contact => &l.change_contact,
        }
    }
}

/// Snapshot of the answers in a chat's key memory. Unanswered fields are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurveyAnswers {
    pub name: String,
    pub age: String,
    pub city: String,
    pub request: String,
    pub health: String,
    pub contact: String,
}

impl SurveyAnswers {
    pub fn from_context(ctx: &Context<'_>) -> Self {
        Self {
            name: ctx.get_str(NAME_KEY).to_string(),
            age: ctx.get_str(AGE_KEY).to_string(),
            city: ctx.get_str(CITY_KEY).to_string(),
            request: ctx.get_str(REQUEST_KEY).to_string(),
            health: ctx.get_str(HEALTH_KEY).to_string(),
            contact: ctx.get_str(CONTACT_KEY).to_string(),
        }
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Name => &self.name,
            Field::Age => &self.age,
            Field::City => &self.city,
            Field::Request => &self.request,
            Field::Health => &self.health,
            Field::Contact => &self.contact,
        }
    }

    /// Every question followed by its answer, then the confirmation question.
    pub fn render(&self, pack: &LanguagePack) -> String {
        let mut blocks: Vec<String> = Field::ALL
            .iter()
            .map(|f| format!("{}\n{}", f.question(pack), self.get(*f)))
            .collect();
        blocks.push(pack.confirm.clone());
        blocks.join("\n\n")
    }
}

/// Stage factories of the survey. Cheap to clone; every stage closure holds a clone.
#[derive(Clone)]
pub struct SurveyFlow {
    pack: Arc<LanguagePack>,
    store: Arc<dyn RecordStore>,
}

impl SurveyFlow {
    pub fn new(pack: LanguagePack, store: Arc<dyn RecordStore>) -> Self {
        Self {
            pack: Arc::new(pack),
            store,
        }
    }

    pub fn pack(&self) -> &LanguagePack {
        &self.pack
    }

    /// Entry point for [`crate::conversation::Manager::new`].
    pub fn entry_point(&self) -> impl Fn() -> BoxedHandler + Send + Sync + 'static {
        let flow = self.clone();
        move || flow.start()
    }

    fn to_start(&self) -> Action {
        let flow = self.clone();
        transition_to(move || flow.start())
    }

    /// Waits for the start command; anything else re-sends the hint.
    pub fn start(&self) -> BoxedHandler {
        let flow = self.clone();
        let options = Options::new().with(
            self.pack.start_command.clone(),
            transition_to(move || flow.welcome()),
        );
        OptionsHandler::new(empty_action(), self.pack.start_hint.clone(), options, empty_action()).boxed()
    }

    /// Greets, then asks whether to apply.
    pub fn welcome(&self) -> BoxedHandler {
        let flow = self.clone();
        let apply = transition_to_with_answer(move |_, ctx| flow.question(Field::Name, Mode::Fill, ctx));
        let labels = &self.pack.labels;
        let options = Options::new()
            .with(labels.yes.clone(), apply)
            .with(labels.no.clone(), self.to_start())
            .with(labels.cancel.clone(), self.to_start());
        OptionsHandler::new(
            send_text(self.pack.welcome.clone(), empty_action()),
            self.pack.go_to_survey.clone(),
            options,
            empty_action(),
        )
        .boxed()
    }

    /// Ask `field`. Any free-form answer is saved; suggestions are offered as quick replies.
    pub fn question(&self, field: Field, mode: Mode, ctx: &Context<'_>) -> BoxedHandler {
        let save = save_key(field.key(), self.after_answer(field, mode));
        let labels = &self.pack.labels;
        let mut options = Options::new();
        match field {
            Field::Name => {
                let full_name = ctx.sender().full_name();
                if !full_name.is_empty() {
                    options.insert(full_name, save.clone());
                }
            }
            Field::City | Field::Health => {
                options.insert(labels.yes.clone(), save.clone());
                options.insert(labels.no.clone(), save.clone());
            }
            Field::Contact => {
                if let Some(username) = ctx.sender().username.as_deref() {
                    options.insert(
                        format!("{}: {}", ctx.message().channel_id, username),
                        save.clone(),
                    );
                }
            }
            Field::Age | Field::Request => {}
        }
        options.insert(labels.cancel.clone(), self.to_start());
        OptionsHandler::new(empty_action(), field.question(&self.pack), options, save).boxed()
    }

    fn after_answer(&self, field: Field, mode: Mode) -> Action {
        let flow = self.clone();
        match (mode, field.next()) {
            (Mode::Fill, Some(next)) => {
                transition_to_with_answer(move |_, ctx| flow.question(next, Mode::Fill, ctx))
            }
            _ => transition_to_with_answer(move |_, ctx| flow.summary(SurveyAnswers::from_context(ctx))),
        }
    }

    /// Shows the collected answers and asks for confirmation.
    pub fn summary(&self, answers: SurveyAnswers) -> BoxedHandler {
        let labels = &self.pack.labels;
        let mut options = Options::new().with(labels.submit.clone(), self.submit(answers.clone()));
        for field in Field::ALL {
            let flow = self.clone();
            options.insert(
                field.change_label(&self.pack),
                transition_to_with_answer(move |_, ctx| flow.question(field, Mode::Edit, ctx)),
            );
        }
        options.insert(labels.cancel.clone(), self.to_start());
        OptionsHandler::new(empty_action(), answers.render(&self.pack), options, empty_action()).boxed()
    }

    /// Thank the user, store the record, return to start. A store failure is
    /// logged and does not change what the user sees.
    fn submit(&self, answers: SurveyAnswers) -> Action {
        let flow = self.clone();
        sequence(
            send_text(self.pack.thanks.clone(), empty_action()),
            action(move |_, ctx| {
                let record = flow.record(&answers, ctx);
                if let Err(e) = flow.store.append(&record) {
                    log::error!(
                        "survey: cannot store answers of {} ({}): {}",
                        record.chat_id,
                        record.contact,
                        e
                    );
                }
                ctx.set_next(flow.start());
                Ok(())
            }),
        )
    }

    fn record(&self, answers: &SurveyAnswers, ctx: &Context<'_>) -> SurveyRecord {
        let msg = ctx.message();
        // Sender ids carry the channel prefix already; the handle shows it once.
        let handle = match msg.sender.username.as_deref() {
            Some(username) => username,
            None => msg
                .sender
                .id
                .strip_prefix(&format!("{}:", msg.channel_id))
                .unwrap_or(&msg.sender.id),
        };
        SurveyRecord {
            record_id: uuid::Uuid::new_v4(),
            chat_id: msg.chat_id().to_string(),
            submitted_at: Utc::now(),
            name: answers.name.clone(),
            age: answers.age.clone(),
            city: answers.city.clone(),
            request: answers.request.clone(),
            health: answers.health.clone(),
            contact: format!("{} ({}: {})", answers.contact, msg.channel_id, handle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{InboundMessage, User};
    use crate::conversation::{Handler, KeyMemory};
    use crate::store::StoreError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<Vec<SurveyRecord>>,
    }

    impl RecordStore for MemoryStore {
        fn append(&self, record: &SurveyRecord) -> Result<(), StoreError> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn pack() -> LanguagePack {
        LanguagePack::bundled("en").unwrap()
    }

    fn message(text: &str) -> InboundMessage {
        InboundMessage {
            channel_id: "tg".to_string(),
            conversation_id: "5".to_string(),
            sender: User {
                id: "tg:5".to_string(),
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                username: Some("ada".to_string()),
            },
            text: text.to_string(),
        }
    }

    fn labels_of(handler: &BoxedHandler, memory: &mut KeyMemory) -> Vec<String> {
        let msg = message("");
        let mut ctx = Context::new(&msg, memory);
        handler.welcome(&mut ctx).unwrap();
        match ctx.into_outbox().pop() {
            Some(crate::conversation::Outbound::WithOptions { options, .. }) => options,
            other => panic!("expected a question with options, got {:?}", other),
        }
    }

    #[test]
    fn fields_chain_to_contact() {
        let mut field = Field::Name;
        let mut seen = vec![field];
        while let Some(next) = field.next() {
            seen.push(next);
            field = next;
        }
        assert_eq!(seen, Field::ALL.to_vec());
    }

    #[test]
    fn name_question_suggests_sender_name() {
        let flow = SurveyFlow::new(pack(), Arc::new(MemoryStore::default()));
        let msg = message("");
        let mut memory = KeyMemory::new();
        let handler = {
            let ctx = Context::new(&msg, &mut memory);
            flow.question(Field::Name, Mode::Fill, &ctx)
        };
        let labels = labels_of(&handler, &mut memory);
        assert_eq!(labels, vec!["Ada Lovelace", "Cancel"]);
    }

    #[test]
    fn contact_question_suggests_channel_handle() {
        let flow = SurveyFlow::new(pack(), Arc::new(MemoryStore::default()));
        let msg = message("");
        let mut memory = KeyMemory::new();
        let handler = {
            let ctx = Context::new(&msg, &mut memory);
            flow.question(Field::Contact, Mode::Fill, &ctx)
        };
        assert_eq!(labels_of(&handler, &mut memory), vec!["tg: ada", "Cancel"]);
    }

    #[test]
    fn summary_lists_answers_and_actions() {
        let flow = SurveyFlow::new(pack(), Arc::new(MemoryStore::default()));
        let answers = SurveyAnswers {
            name: "Ada".to_string(),
            age: "36".to_string(),
            ..SurveyAnswers::default()
        };
        let text = answers.render(flow.pack());
        assert!(text.starts_with(&format!("{}\nAda\n\n{}\n36", pack().questions.name, pack().questions.age)));
        assert!(text.ends_with(&pack().confirm));

        let mut memory = KeyMemory::new();
        let labels = labels_of(&flow.summary(answers), &mut memory);
        assert_eq!(labels.first().map(String::as_str), Some("Submit"));
        assert_eq!(labels.last().map(String::as_str), Some("Cancel"));
        assert_eq!(labels.len(), 8);
    }

    #[test]
    fn submit_stores_record_and_returns_to_start() {
        let store = Arc::new(MemoryStore::default());
        let flow = SurveyFlow::new(pack(), store.clone());
        let answers = SurveyAnswers {
            name: "Ada".to_string(),
            contact: "ada@example.org".to_string(),
            ..SurveyAnswers::default()
        };
        let summary = flow.summary(answers);
        let msg = message("Submit");
        let mut memory = KeyMemory::new();
        let mut ctx = Context::new(&msg, &mut memory);
        summary.handle(&mut ctx).unwrap();
        assert!(ctx.next().is_some());
        assert_eq!(ctx.outbox()[0].text(), pack().thanks);

        let records = store.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].chat_id, "tg:5");
        assert_eq!(records[0].name, "Ada");
        assert_eq!(records[0].contact, "ada@example.org (tg: ada)");
    }

    #[test]
    fn record_without_username_names_the_channel_once() {
        let store = Arc::new(MemoryStore::default());
        let flow = SurveyFlow::new(pack(), store.clone());
        let answers = SurveyAnswers {
            contact: "555-0100".to_string(),
            ..SurveyAnswers::default()
        };
        let mut msg = message("Submit");
        msg.sender.username = None;
        let mut memory = KeyMemory::new();
        let mut ctx = Context::new(&msg, &mut memory);
        flow.summary(answers).handle(&mut ctx).unwrap();

        let records = store.records.lock().unwrap();
        assert_eq!(records[0].contact, "555-0100 (tg: 5)");
    }
}
