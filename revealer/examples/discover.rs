//! Run one search and print the resulting device table.
//!
//! ```sh
//! cargo run --example discover
//! ```

use revealer::{RegistryEvent, Revealer, RevealerError};

fn main() -> Result<(), RevealerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "revealer=info".into()),
        )
        .init();

    let (revealer, events) = Revealer::new();
    revealer.start_search()?;

    for event in events {
        match event {
            RegistryEvent::EntryAdded(entry) => {
                println!(
                    "+ {:?}/{:?} {} -> {}",
                    entry.category, entry.tag, entry.display_name, entry.link
                );
            }
            RegistryEvent::EntryRemoved(entry) => {
                println!("- {}", entry.display_name);
            }
            RegistryEvent::SearchFinished => break,
        }
    }

    println!("\ndevice table:");
    for entry in revealer.snapshot() {
        let configurable = if entry.configurable() { " [configurable]" } else { "" };
        println!("{:>3}. {} ({}){}", entry.row, entry.display_name, entry.link, configurable);
    }

    for diagnostic in revealer.diagnostics() {
        eprintln!("note: {:?} {}: {}", diagnostic.scope, diagnostic.context, diagnostic.message);
    }

    revealer.shutdown();
    Ok(())
}
