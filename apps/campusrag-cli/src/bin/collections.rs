use std::env;

use campusrag_cli::{embedder, init_tracing, load_settings, open_registry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let refresh = env::args().skip(1).any(|a| a == "--refresh");
    let settings = load_settings()?;
    let registry = open_registry(&settings, embedder(&settings)?).await?;
    if refresh { registry.refresh_health().await; }

    let snapshot = registry.snapshot();
    println!("Store: {}", settings.store.root_path().display());
    println!("{} collections\n", snapshot.len());
    println!("{:<20} {:<12} {:>9}  {:<25} label", "collection", "health", "passages", "checked");
    for collection in snapshot.iter() {
        let entry = registry.health_entry(&collection.id);
        let health = entry.map(|e| format!("{:?}", e.status).to_lowercase()).unwrap_or_else(|| "unknown".to_string());
        let checked = entry.map(|e| e.checked_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()).unwrap_or_default();
        println!("{:<20} {:<12} {:>9}  {:<25} {}", collection.id.name(), health, collection.passage_count, checked, collection.label);
    }
    Ok(())
}
