//! Dialogue example: an order-taking flow with a timeout.
//!
//! Opening a dialogue scopes follow-up messages from the same audience to
//! the dialogue's own branches. A clock closes the dialogue after silence,
//! telling the audience the time limit was reached.
//!
//! Run with: `cargo run --example dialogue`

use std::sync::Arc;
use std::time::Duration;

use banter::prelude::*;

fn customer(text: &str) -> Message {
    Message::text(User::new("customer").room(Room::new("counter")), text)
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("banter Dialogue Example");
    println!("=======================\n");

    let messenger = Arc::new(MemoryMessenger::new());
    let bot = Bot::builder()
        .config(
            BotConfig::new("brains")
                .dialogue_timeout(Duration::from_secs(2))
                .dialogue_timeout_text("order cancelled, come back any time"),
        )
        .messenger(messenger.clone())
        .build();
    bot.start().await?;

    // Asking for a sandwich opens a dialogue; the bread question only
    // exists inside it.
    let waiter = Arc::clone(&bot);
    bot.path().text(
        Criteria::new().contains("sandwich"),
        Action::func(move |state| {
            let bot = Arc::clone(&waiter);
            async move {
                state.lock().await.respond(["sure - what bread?"]);
                let dialogue = bot.enter(&state, bot.dialogue(Audience::Direct)).await;
                dialogue.path().text(
                    Criteria::new().is("rye").is("wheat").is("white"),
                    Action::func(|state| async move {
                        let (bread, dialogue) = {
                            let locked = state.lock().await;
                            let bread = match locked.captured() {
                                Some(Captured::Single(Some(bread))) => bread.clone(),
                                _ => "mystery".to_string(),
                            };
                            (bread, locked.dialogue())
                        };
                        state
                            .lock()
                            .await
                            .respond([format!("one {bread} sandwich coming up")]);
                        if let Some(dialogue) = dialogue {
                            dialogue.close().await;
                        }
                        Ok(())
                    }),
                    BranchOptions::new(),
                )?;
                Ok(())
            }
        }),
        BranchOptions::new(),
    )?;

    println!("1. Customer asks for a sandwich...");
    bot.receive(customer("can I get a sandwich")).await;
    println!("   Bot: {:?}", messenger.texts().last().unwrap());

    println!("\n2. The follow-up routes to the dialogue...");
    bot.receive(customer("rye")).await;
    println!("   Bot: {:?}", messenger.texts().last().unwrap());
    println!("   Dialogue closed, engaged audiences: {}", bot.dialogues().count());

    println!("\n3. A new order, left to time out...");
    bot.receive(customer("another sandwich please")).await;
    tokio::time::sleep(Duration::from_millis(2500)).await;
    println!("   Bot: {:?}", messenger.texts().last().unwrap());
    println!("   Engaged audiences: {}", bot.dialogues().count());

    bot.shutdown().await;

    println!("\nDialogue example completed successfully!");
    Ok(())
}
