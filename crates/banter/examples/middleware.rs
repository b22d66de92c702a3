//! Middleware example: pieces around the thought stages.
//!
//! Hear pieces gate whole messages, stage pieces wrap every processed
//! branch, and respond pieces run before envelopes reach the messenger.
//!
//! Run with: `cargo run --example middleware`

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use banter::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Surface the engine's own tracing output; RUST_LOG overrides.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "banter=debug".into()),
        )
        .init();

    println!("banter Middleware Example");
    println!("=========================\n");

    let messenger = Arc::new(MemoryMessenger::new());
    let bot = Bot::builder()
        .name("brains")
        .messenger(messenger.clone())
        .build();
    bot.start().await?;

    bot.path().text(
        "deal",
        Action::func(|state| async move {
            state.lock().await.respond(["tell me more"]);
            Ok(())
        }),
        BranchOptions::new(),
    )?;

    // Example 1: a hear piece drops unwanted messages outright
    println!("1. Hear filter...");
    bot.register_middleware(Stage::Hear, |state| async move {
        let spammy = {
            let locked = state.lock().await;
            locked
                .message()
                .and_then(Message::text_content)
                .is_some_and(|text| text.contains("spam"))
        };
        if spammy {
            println!("   (hear piece dropped a message)");
            Ok(Flow::Stop)
        } else {
            Ok(Flow::Continue)
        }
    });

    bot.receive(Message::text(User::new("u1"), "spam deal inside")).await;
    println!("   Replies so far: {}", messenger.texts().len());

    // Example 2: a listen piece observes every processed branch
    println!("\n2. Listen counter...");
    let processed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&processed);
    bot.register_middleware(Stage::Listen, move |_state| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Flow::Continue)
        }
    });

    bot.receive(Message::text(User::new("u1"), "a genuine deal")).await;
    println!("   Branches processed: {}", processed.load(Ordering::SeqCst));
    println!("   Bot replied: {:?}", messenger.texts().last().unwrap());

    // Example 3: a respond piece holds envelopes back
    println!("\n3. Respond gate...");
    bot.register_middleware(Stage::Respond, |state| async move {
        let held = { state.lock().await.envelopes().len() };
        println!("   (respond piece saw {held} pending envelope(s), stopping)");
        Ok(Flow::Stop)
    });

    bot.receive(Message::text(User::new("u1"), "one more deal")).await;
    println!("   Replies still: {}", messenger.texts().len());

    bot.shutdown().await;

    println!("\nMiddleware example completed successfully!");
    Ok(())
}
