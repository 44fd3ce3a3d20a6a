use std::env;
use std::path::PathBuf;

use campusrag_cli::{build_passages, embedder, init_tracing, load_settings, read_seed_dir};
use campusrag_vector::{LancePassageWriter, LanceStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args: Vec<String> = env::args().collect();
    let mut data_dir = None;
    let mut store_root = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--store" => {
                if let Some(path) = args.get(i + 1) {
                    store_root = Some(PathBuf::from(path));
                    i += 1;
                } else {
                    eprintln!("Error: --store requires a path");
                    std::process::exit(1);
                }
            }
            arg if !arg.starts_with('-') => data_dir = Some(PathBuf::from(arg)),
            _ => {}
        }
        i += 1;
    }
    let Some(data_dir) = data_dir else {
        eprintln!("Usage: {} <dir> [--store PATH]", args.first().map(String::as_str).unwrap_or("campusrag-seed"));
        eprintln!("Reads <dir>/<collection>/*.jsonl with one {{\"doc_id\", \"text\", \"section\"?, \"id\"?}} object per line.");
        std::process::exit(1);
    };

    let settings = load_settings()?;
    let root = store_root.unwrap_or_else(|| settings.store.root_path());
    std::fs::create_dir_all(&root)?;
    println!("Seeding collections\n===================");
    println!("Data directory: {}", data_dir.display());
    println!("Store: {}", root.display());

    let embedder = embedder(&settings)?;
    let store = LanceStore::open(&root.to_string_lossy()).await?;
    let writer = LancePassageWriter::new(store.connection().clone(), embedder.dim());

    let collections = read_seed_dir(&data_dir)?;
    if collections.is_empty() {
        println!("No passages found under {}", data_dir.display());
        return Ok(());
    }
    let mut total = 0;
    for (collection, records) in collections {
        let passages = build_passages(embedder.as_ref(), &collection, records)?;
        let written = writer.write(&collection, &passages).await?;
        tracing::info!(collection = %collection, written, "collection seeded");
        total += written;
    }
    println!("\nSeeded {} passages", total);
    Ok(())
}
