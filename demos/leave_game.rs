//! Leave game - resolve a backend, connect, send one request.
//!
//! This example demonstrates:
//! - Loading `ClientSettings` (optional JSON file in `BLAZE_SETTINGS`)
//! - Getting a pooled connection for a persona id
//! - Sending `Game.leaveGame` and printing the decoded response as JSON
//!
//! ```text
//! RUST_LOG=blaze_client=debug cargo run --example leave_game -- <persona-id> <game-id>
//! ```
//!
//! The backend only answers authenticated sessions; without one expect an
//! error frame back.

use blaze_client::codec::Struct;
use blaze_client::protocol::Packet;
use blaze_client::ClientSettings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let persona_id: u64 = args.next().ok_or("usage: leave_game <persona-id> <game-id>")?.parse()?;
    let game_id: i64 = args.next().ok_or("usage: leave_game <persona-id> <game-id>")?.parse()?;

    let settings = match std::env::var("BLAZE_SETTINGS") {
        Ok(path) => ClientSettings::from_file(path)?,
        Err(_) => ClientSettings::default(),
    };
    let manager = settings.build_manager()?;

    let conn = manager.get_socket_for_pid(persona_id).await?;
    tracing::info!("Connected to {:?}", conn.address());

    let data = Struct::new().with("GAME", "tunguska")?.with("GID", game_id)?;
    let response = conn.send(Packet::request("Game.leaveGame", data)).await?;

    if response.is_error() {
        tracing::warn!("Server returned an error frame for {}", response.method);
    }
    println!("{}", serde_json::to_string_pretty(&response.data)?);

    manager.close_all().await;
    Ok(())
}
