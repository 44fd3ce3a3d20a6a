use std::env;

use campusrag_cli::{embedder, init_tracing, load_settings, open_registry};
use campusrag_core::types::Query;
use campusrag_retrieval::{CancellationToken, PipelineOutcome, RetrievalPipeline};

fn usage(prog: &str) -> ! {
    eprintln!("Usage: {} <question> [--department NAME] [--regulation REG] [--conversation ID] [--json]", prog);
    eprintln!("Example: {} 'What is the fee for B.Tech CSE?' --department cse", prog);
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args: Vec<String> = env::args().collect();
    let prog = args.first().cloned().unwrap_or_else(|| "campusrag-ask".to_string());
    let mut words = Vec::new();
    let (mut department, mut regulation, mut conversation, mut json) = (None, None, None, false);
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--department" | "-d" | "--regulation" | "-r" | "--conversation" | "-c" => {
                let Some(value) = args.get(i + 1).cloned() else {
                    eprintln!("Error: {} requires a value", args[i]);
                    std::process::exit(1);
                };
                match args[i].as_str() {
                    "--department" | "-d" => department = Some(value),
                    "--regulation" | "-r" => regulation = Some(value),
                    _ => conversation = Some(value),
                }
                i += 1;
            }
            "--json" => json = true,
            "--help" | "-h" => usage(&prog),
            arg if !arg.starts_with('-') => words.push(arg.to_string()),
            other => {
                eprintln!("Error: unknown option {}", other);
                usage(&prog);
            }
        }
        i += 1;
    }
    if words.is_empty() { usage(&prog); }

    let settings = load_settings()?;
    let embedder = embedder(&settings)?;
    let registry = open_registry(&settings, embedder.clone()).await?;
    let pipeline = RetrievalPipeline::new(registry, embedder, &settings);

    let mut query = Query::new(words.join(" "));
    query.department = department;
    query.regulation = regulation;
    query.conversation_id = conversation;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() { on_interrupt.cancel(); }
    });

    let outcome = pipeline.run_with_cancel(&query, &cancel).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let report = outcome.report();
    println!("Question: {}", query.text);
    println!("Routed to: {} ({:?})", report.routing.ids().map(|id| id.name()).collect::<Vec<_>>().join(", "), report.routing.selection);
    if let Some(hint) = &report.routing.unresolved_hint {
        println!("Unknown department '{}', used classifier routing", hint);
    }
    println!("State: {:?}", report.state);
    match &outcome {
        PipelineOutcome::Answered { context, .. } => {
            if context.is_partial() {
                let missing: Vec<_> = context.missing_collections.iter().map(|c| c.name()).collect();
                println!("Partial coverage, missing: {}", missing.join(", "));
            }
            if context.budget_relaxed { println!("Budget relaxed for one oversized passage"); }
            println!("\n{}\n", context.render());
            println!("Sources:");
            for source in context.sources() { println!("  - {}", source); }
        }
        PipelineOutcome::FullyDegraded { .. } => {
            println!("\nInsufficient information: no collection returned evidence for this question.");
        }
    }
    Ok(())
}
