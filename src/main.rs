use shadownet::{ChatStore, Config, ProgramLevel};
use tracing_subscriber::EnvFilter;

/// Walk one session through the store: pick a college, log in, chat, and
/// ask for a verification code. Run with `RUST_LOG=debug` to see the code.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    tracing::info!(storage_key = %config.storage_key, data_dir = ?config.data_dir, "shadownet starting");
    let mut store = ChatStore::from_config(config)?;

    let colleges = store.load_colleges(ProgramLevel::Undergraduate).await?;
    let Some(college) = colleges.first().cloned() else {
        tracing::warn!("college catalog is empty");
        return Ok(());
    };

    let user = store.login("Midnight Owl", Some(&college), None)?;
    store.add_message("hello from the shadows")?;
    store.set_active_room(Some("global"))?;
    store.add_message("anyone around?")?;

    let email = format!("owl@{}.ac.in", college.id);
    store.send_verification_code(&email).await?;

    tracing::info!(
        user_id = %user.id,
        status = ?store.session_status(),
        rooms = store.visible_rooms().len(),
        messages = store.state().messages.len(),
        pending_code = store.has_pending_verification(),
        "session ready"
    );
    Ok(())
}
