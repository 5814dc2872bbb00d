//! Logs in and lists the areas with the logged-in user's posts and drafts.
//!
//! Run with: cargo run --example browse
//!
//! Requires .env file with:
//! - WILDFYRE_URL
//! - WILDFYRE_USERNAME
//! - WILDFYRE_PASSWORD

use std::env;

use wildfyre_lib::WildFyreClient;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    let url = env::var("WILDFYRE_URL").expect("WILDFYRE_URL not set");
    let username = env::var("WILDFYRE_USERNAME").expect("WILDFYRE_USERNAME not set");
    let password = env::var("WILDFYRE_PASSWORD").expect("WILDFYRE_PASSWORD not set");

    let client = WildFyreClient::builder().url(url).build()?;
    client.set_connectivity_error_handler(|err| eprintln!("Lost connection: {}", err));
    client.set_entity_not_found_handler(|key| eprintln!("{} was deleted", key));

    println!("Connecting...\n");
    let me = client.connect(&username, &password).await?;
    println!("Logged in as {} (#{})", me.name(), me.id());

    for area in client.init_areas().await? {
        println!("\n{} [{}]", area.name(), area.id());
        if let Some(area) = client.area(area.id()).await? {
            println!("  reputation: {:?}, spread: {:?}", area.reputation(), area.spread());
        }

        for post in area.own_posts(&client).await? {
            println!("  post #{}: {} ({} comments)", post.id(), post.text(), post.comments().len());
        }
        for draft in area.drafts(&client) {
            println!("  draft #{}: {}", draft.id().unwrap_or_default(), draft.text());
        }
    }

    client.shutdown().await;
    Ok(())
}
