//! Basic banter usage example.
//!
//! This example demonstrates the fundamental receive/respond workflow:
//! text branches, captures, bits and a catch-all, wired to an in-memory
//! messenger so it runs without any chat platform.
//!
//! Run with: `cargo run --example basic`

use std::sync::Arc;

use banter::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    println!("banter Basic Example");
    println!("====================\n");

    let messenger = Arc::new(MemoryMessenger::new());
    let bot = Bot::builder()
        .name("brains")
        .messenger(messenger.clone())
        .build();
    bot.start().await?;

    // Example 1: a plain text branch
    println!("1. Plain text branch...");
    bot.path().text(
        "hello",
        Action::func(|state| async move {
            state.lock().await.respond(["hi there!"]);
            Ok(())
        }),
        BranchOptions::new(),
    )?;

    bot.receive(Message::text(
        User::new("u1").room(Room::new("general")),
        "well hello bot",
    ))
    .await;
    println!("   Bot replied: {:?}", messenger.texts().last().unwrap());

    // Example 2: capturing with criteria
    println!("\n2. Capturing with criteria...");
    bot.path().text(
        Criteria::new().after("my name is"),
        Action::func(|state| async move {
            let name = {
                let locked = state.lock().await;
                match locked.captured() {
                    Some(Captured::Single(Some(name))) => name.clone(),
                    _ => "stranger".to_string(),
                }
            };
            state.lock().await.respond([format!("nice to meet you, {name}")]);
            Ok(())
        }),
        BranchOptions::new(),
    )?;

    bot.receive(Message::text(
        User::new("u1").room(Room::new("general")),
        "my name is zoidberg",
    ))
    .await;
    println!("   Bot replied: {:?}", messenger.texts().last().unwrap());

    // Example 3: a bit shared by id
    println!("\n3. Reusable bits...");
    bot.setup_bit(Bit::new("fortune").strings(["outlook good", "ask again later"]));
    bot.path().text("fortune", Action::bit("fortune"), BranchOptions::new())?;

    bot.receive(Message::text(
        User::new("u2").room(Room::new("general")),
        "fortune please",
    ))
    .await;
    println!("   Bot replied: {:?}", messenger.texts().last().unwrap());

    // Example 4: the catch-all picks up everything else
    println!("\n4. Catch-all branch...");
    bot.path().catch_all(
        Action::func(|state| async move {
            state.lock().await.respond(["sorry, I didn't catch that"]);
            Ok(())
        }),
        BranchOptions::new(),
    );

    bot.receive(Message::text(
        User::new("u2").room(Room::new("general")),
        "qwertyuiop",
    ))
    .await;
    println!("   Bot replied: {:?}", messenger.texts().last().unwrap());

    bot.shutdown().await;

    println!("\nEverything the bot said:");
    for text in messenger.texts() {
        println!("   - {text}");
    }

    println!("\nBasic example completed successfully!");
    Ok(())
}
