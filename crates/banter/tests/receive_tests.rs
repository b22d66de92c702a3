//! Integration tests for message intake through the staged thought process.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use banter::prelude::*;
use banter::{NluResultSet, STATES_COLLECTION};
use serde_json::json;

fn message(text: &str) -> Message {
    Message::text(User::new("u1").room(Room::new("r1")), text)
}

fn wired() -> (Arc<Bot>, Arc<MemoryMessenger>) {
    let messenger = Arc::new(MemoryMessenger::new());
    let bot = Bot::builder()
        .name("brains")
        .messenger(messenger.clone())
        .build();
    (bot, messenger)
}

fn respond_with(text: &'static str) -> Action {
    Action::func(move |state| async move {
        state.lock().await.respond([text]);
        Ok(())
    })
}

fn greet_results() -> NluResults {
    NluResults::new().insert(
        "intent",
        NluResultSet::new().add(NluResult::new().name("greet").score(0.92)),
    )
}

#[tokio::test]
async fn a_matching_branch_responds_through_the_messenger() {
    let (bot, messenger) = wired();
    bot.path()
        .text("hello", respond_with("hi!"), BranchOptions::new())
        .unwrap();

    let state = bot.receive(message("well hello there")).await;

    assert_eq!(messenger.texts(), vec!["hi!"]);
    let state = state.lock().await;
    assert!(state.matched());
    assert!(state.processed_at(Stage::Hear).is_some());
    assert!(state.processed_at(Stage::Listen).is_some());
    assert!(state.processed_at(Stage::Respond).is_some());
    assert!(state.envelopes().iter().all(Envelope::is_sent));
}

#[tokio::test]
async fn the_first_matching_branch_wins() {
    let (bot, messenger) = wired();
    bot.path()
        .text("ping", respond_with("first"), BranchOptions::new())
        .unwrap();
    bot.path()
        .text("ping", respond_with("second"), BranchOptions::new())
        .unwrap();

    let state = bot.receive(message("ping")).await;

    assert_eq!(messenger.texts(), vec!["first"]);
    assert_eq!(state.lock().await.branches().len(), 1);
}

#[tokio::test]
async fn forced_branches_still_run_after_a_match() {
    let (bot, messenger) = wired();
    bot.path()
        .text("ping", respond_with("first"), BranchOptions::new())
        .unwrap();
    bot.path()
        .text("ping", respond_with("second"), BranchOptions::new().force(true))
        .unwrap();

    let state = bot.receive(message("ping")).await;

    assert_eq!(messenger.texts(), vec!["first", "second"]);
    assert_eq!(state.lock().await.branches().len(), 2);
}

#[tokio::test]
async fn unmatched_messages_fall_to_the_catch_all() {
    let (bot, messenger) = wired();
    bot.path()
        .text("hello", respond_with("hi!"), BranchOptions::new())
        .unwrap();
    bot.path()
        .catch_all(respond_with("beg pardon?"), BranchOptions::new());

    let state = bot.receive(message("zxcvb")).await;

    assert_eq!(messenger.texts(), vec!["beg pardon?"]);
    let state = state.lock().await;
    assert!(state.matched());
    assert!(matches!(state.last_match(), Some(BranchMatch::CatchAll)));
    assert!(state.message().is_some_and(Message::is_catch_all));
    assert!(state.processed_at(Stage::Act).is_some());
}

#[tokio::test]
async fn the_catch_all_stays_quiet_after_a_match() {
    let (bot, messenger) = wired();
    bot.path()
        .text("hello", respond_with("hi!"), BranchOptions::new())
        .unwrap();
    bot.path()
        .catch_all(respond_with("beg pardon?"), BranchOptions::new());

    let state = bot.receive(message("hello")).await;

    assert_eq!(messenger.texts(), vec!["hi!"]);
    assert!(state.lock().await.processed_at(Stage::Act).is_none());
}

#[tokio::test]
async fn captures_reach_the_action() {
    let (bot, messenger) = wired();
    bot.path()
        .text(
            Criteria::new().after("my name is"),
            Action::func(|state| async move {
                let name = {
                    let locked = state.lock().await;
                    match locked.captured() {
                        Some(Captured::Single(Some(name))) => name.clone(),
                        _ => String::new(),
                    }
                };
                state.lock().await.respond([format!("hi {name}")]);
                Ok(())
            }),
            BranchOptions::new(),
        )
        .unwrap();

    bot.receive(message("my name is bender")).await;

    assert_eq!(messenger.texts(), vec!["hi bender"]);
}

#[tokio::test]
async fn custom_matchers_decide_with_their_own_value() {
    let (bot, messenger) = wired();
    bot.path().custom(
        |message| async move { Ok(json!(message.text_content() == Some("magic word"))) },
        respond_with("abracadabra"),
        BranchOptions::new(),
    );

    let state = bot.receive(message("magic word")).await;
    assert_eq!(messenger.texts(), vec!["abracadabra"]);
    assert!(matches!(
        state.lock().await.last_match(),
        Some(BranchMatch::Value(value)) if value == &json!(true)
    ));

    let state = bot.receive(message("mundane word")).await;
    assert_eq!(messenger.texts().len(), 1);
    assert!(!state.lock().await.matched());
}

#[tokio::test]
async fn nlu_results_attach_and_match() {
    let messenger = Arc::new(MemoryMessenger::new());
    let nlu = Arc::new(CannedNlu::new(greet_results()));
    let bot = Bot::builder()
        .name("brains")
        .messenger(messenger.clone())
        .nlu(nlu.clone())
        .build();
    bot.path().nlu(
        NluCriteriaSet::intent(NluCriterion::new().name("greet").score(0.8)),
        respond_with("hello friend"),
        BranchOptions::new(),
    );

    let state = bot.receive(message("good morning")).await;

    assert_eq!(nlu.calls(), 1);
    assert_eq!(messenger.texts(), vec!["hello friend"]);
    let state = state.lock().await;
    assert!(state.matched());
    assert!(state.processed_at(Stage::Understand).is_some());
    assert!(matches!(state.last_match(), Some(BranchMatch::Nlu(_))));
}

#[tokio::test]
async fn matched_states_skip_the_nlu_adapter() {
    let nlu = Arc::new(CannedNlu::new(greet_results()));
    let bot = Bot::builder().name("brains").nlu(nlu.clone()).build();
    bot.path()
        .text("hello", respond_with("hi!"), BranchOptions::new())
        .unwrap();
    bot.path().nlu(
        NluCriteriaSet::intent(NluCriterion::new().name("greet").score(0.8)),
        respond_with("hello friend"),
        BranchOptions::new(),
    );

    bot.receive(message("hello")).await;

    assert_eq!(nlu.calls(), 0);
}

#[tokio::test]
async fn messages_without_text_skip_the_nlu_adapter() {
    let nlu = Arc::new(CannedNlu::new(greet_results()));
    let bot = Bot::builder().name("brains").nlu(nlu.clone()).build();
    bot.path().nlu(
        NluCriteriaSet::intent(NluCriterion::new().name("greet").score(0.8)),
        respond_with("hello friend"),
        BranchOptions::new(),
    );

    bot.receive(Message::enter(User::new("u1").room(Room::new("r1"))))
        .await;

    assert_eq!(nlu.calls(), 0);
}

#[tokio::test]
async fn server_payloads_route_to_server_branches() {
    let (bot, messenger) = wired();
    bot.path()
        .server(
            ServerCriteria::new().field("action", "deploy"),
            respond_with("deploying"),
            BranchOptions::new(),
        )
        .unwrap();

    let state = bot
        .receive(Message::server(
            User::new("ci"),
            json!({"action": "deploy", "env": "prod"}),
        ))
        .await;

    assert_eq!(messenger.texts(), vec!["deploying"]);
    let state = state.lock().await;
    assert!(state.matched());
    assert!(state.processed_at(Stage::Serve).is_some());

    let state = bot
        .receive(Message::server(User::new("ci"), json!({"action": "rollback"})))
        .await;
    assert!(!state.lock().await.matched());
}

#[tokio::test]
async fn direct_branches_need_an_address() {
    let messenger = Arc::new(MemoryMessenger::new());
    let bot = Bot::builder()
        .config(BotConfig::new("brains").alias("bb"))
        .messenger(messenger.clone())
        .build();
    bot.path()
        .direct("status", respond_with("all good"), BranchOptions::new())
        .unwrap();

    bot.receive(message("status")).await;
    assert!(messenger.texts().is_empty());

    bot.receive(message("brains: status")).await;
    assert_eq!(messenger.texts(), vec!["all good"]);

    bot.receive(message("@bb status")).await;
    assert_eq!(messenger.texts(), vec!["all good", "all good"]);
}

#[tokio::test]
async fn bits_run_by_id() {
    let (bot, messenger) = wired();
    bot.setup_bit(Bit::new("greeting").string("howdy!"));
    bot.path()
        .text("hello", Action::bit("greeting"), BranchOptions::new())
        .unwrap();

    bot.receive(message("hello")).await;

    assert_eq!(messenger.texts(), vec!["howdy!"]);
}

#[tokio::test]
async fn enter_events_route_to_enter_branches() {
    let (bot, messenger) = wired();
    bot.path().enter(respond_with("welcome!"), BranchOptions::new());

    bot.receive(Message::enter(User::new("u9").room(Room::new("lobby"))))
        .await;
    assert_eq!(messenger.texts(), vec!["welcome!"]);

    bot.receive(message("hello?")).await;
    assert_eq!(messenger.texts().len(), 1);
}

#[tokio::test]
async fn every_run_is_remembered_with_storage() {
    let messenger = Arc::new(MemoryMessenger::new());
    let storage = Arc::new(MemoryStorage::new());
    let bot = Bot::builder()
        .name("brains")
        .messenger(messenger.clone())
        .storage(storage.clone())
        .build();
    bot.path()
        .text("hello", respond_with("hi!"), BranchOptions::new())
        .unwrap();

    let state = bot.receive(message("hello")).await;
    assert!(state.lock().await.processed_at(Stage::Remember).is_some());

    bot.receive(message("zxcvb")).await;

    let kept = storage.collection(STATES_COLLECTION);
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0]["matched"], json!(true));
    assert_eq!(kept[1]["matched"], json!(false));
}

#[tokio::test]
async fn actions_count_once_per_delivery() {
    let (bot, _messenger) = wired();
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&hits);
    bot.path()
        .text(
            "hello",
            Action::func(move |_state| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
            BranchOptions::new(),
        )
        .unwrap();

    bot.receive(message("hello")).await;
    bot.receive(message("hello again")).await;
    bot.receive(message("goodbye")).await;

    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn dispatch_sends_and_stamps() {
    let (bot, messenger) = wired();

    let state = bot
        .dispatch(Envelope::new().to_room(Room::new("general")).write("shipping now"))
        .await;

    let state = state.lock().await;
    assert!(state.processed_at(Stage::Respond).is_some());
    assert!(state.envelopes().iter().all(Envelope::is_sent));
    let sent = messenger.last().unwrap();
    assert_eq!(sent.strings, vec!["shipping now"]);
    assert_eq!(sent.room.as_ref().map(|room| room.id.as_str()), Some("general"));
}

#[tokio::test]
async fn respond_to_replies_to_the_sender() {
    let (bot, messenger) = wired();

    bot.respond_to(&message("original"), ["quick reply"]).await;

    let sent = messenger.last().unwrap();
    assert_eq!(sent.strings, vec!["quick reply"]);
    assert_eq!(sent.method, "send");
    assert_eq!(sent.room.as_ref().map(|room| room.id.as_str()), Some("r1"));
}
