use anyhow::{Context, Result};
use mneme_rs::config::{
    BackendConfig, BackendKind, CompactionConfig, LongTermConfig, MnemeConfig, ShortTermConfig,
};
use mneme_rs::init_logging;
use mneme_rs::protocol::{Author, Event};
use mneme_rs::MemoryRuntime;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let data_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("mneme-hello-memory"));
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;

    let config = MnemeConfig::builder()
        .short_term(ShortTermConfig {
            backend: BackendConfig::new(
                BackendKind::Relational,
                Some(data_dir.join("conversations.db").display().to_string()),
            ),
        })
        .long_term(LongTermConfig {
            backend: BackendConfig::new(
                BackendKind::KeyValue,
                Some(data_dir.join("long_term").display().to_string()),
            ),
            ..LongTermConfig::default()
        })
        .compaction(CompactionConfig {
            interval: 4,
            overlap: 1,
            ..CompactionConfig::default()
        })
        .build();
    let runtime =
        MemoryRuntime::from_config(&config, None, None).context("failed to build memory runtime")?;

    let turns = [
        (Author::User, "Hi, I'm planning a trip to Lisbon in May."),
        (Author::Agent, "Great choice. Do you want museum or food suggestions?"),
        (Author::User, "Food, please. I'm vegetarian."),
        (Author::Agent, "Noted: vegetarian food spots in Lisbon."),
        (Author::User, "Also remind me to renew my passport."),
    ];
    for (author, text) in turns {
        let outcome = runtime
            .record_turn("hello-memory", "demo-user", "trip", Event::text(author, text))
            .await
            .context("failed to record turn")?;
        println!("recorded turn {} ({:?})", outcome.index, outcome.compaction);
    }

    println!("\ncontext window:");
    for event in runtime
        .get_context("hello-memory", "demo-user", "trip")
        .await
        .context("failed to load context")?
    {
        let marker = if event.is_summary() { "summary" } else { "event" };
        println!("  [{marker}] {}: {}", event.author, event.text_content());
    }

    let report = runtime
        .archive_conversation("hello-memory", "demo-user", "trip")
        .await
        .context("failed to archive conversation")?;
    println!(
        "\narchived {} chunk(s), {} already present",
        report.stored(),
        report.skipped()
    );

    println!("\nrecall \"vegetarian\":");
    for hit in runtime
        .recall("hello-memory", "demo-user", "vegetarian")
        .await
        .context("failed to search long-term memory")?
    {
        println!("  {:.2} {}", hit.score, hit.record.content);
    }
    Ok(())
}
