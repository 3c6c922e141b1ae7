//! textroom demo driver.
//!
//! ```bash
//! # Walk through two clients sharing a room, locking it, and a third
//! # client unlocking it
//! textroom --room my-notes
//!
//! # Many concurrent typists in one room
//! textroom --stress --sessions 8 --edits 200
//! ```

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use stress_test::{stress_test_room, stress_test_scaling};
use textroom_sdk::{DocumentId, MemoryStore, SessionEvent, SyncConfigBuilder, SyncController};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod stress_test;

const WALKTHROUGH_QUIET_MS: u64 = 500;
const STRESS_QUIET_MS: u64 = 20;

/// Shared text room demo
#[derive(Parser, Debug)]
#[command(name = "textroom")]
#[command(about = "Shared text rooms with debounced sync and optional password lock")]
#[command(version)]
struct Args {
    /// Room to open (a fresh id is generated when omitted)
    #[arg(short, long)]
    room: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Quiet period before an edit is written, in milliseconds
    /// [default: 500, or 20 with --stress]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    quiet_ms: Option<u64>,

    /// Run the concurrent-typing stress test instead of the walkthrough
    #[arg(long)]
    stress: bool,

    /// Concurrent sessions for the stress test
    #[arg(long, default_value = "4")]
    sessions: usize,

    /// Keystrokes per session for the stress test
    #[arg(long, default_value = "100")]
    edits: usize,

    /// Also run the scaling analysis up to this many sessions
    #[arg(long)]
    scale_to: Option<usize>,

    /// RNG seed for the stress test
    #[arg(long, default_value = "42")]
    seed: u64,
}

impl Args {
    /// Quiet period for the selected mode.
    fn quiet_ms(&self) -> u64 {
        let default = if self.stress {
            STRESS_QUIET_MS
        } else {
            WALKTHROUGH_QUIET_MS
        };
        self.quiet_ms.unwrap_or(default)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let quiet_ms = args.quiet_ms();
    if args.stress {
        let stats = stress_test_room(args.sessions, args.edits, args.seed, quiet_ms).await;
        stats.print();
        if let Some(max) = args.scale_to {
            stress_test_scaling(max, args.sessions.max(1), args.seed, quiet_ms).await;
        }
        println!("\n✓ All stress tests completed successfully!");
        return Ok(());
    }

    let room = args.room.map(DocumentId::from).unwrap_or_else(DocumentId::generate);
    walkthrough(room, quiet_ms).await
}

async fn walkthrough(room: DocumentId, quiet_ms: u64) -> Result<(), Box<dyn std::error::Error>> {
    let quiet = Duration::from_millis(quiet_ms);
    let store = Arc::new(MemoryStore::new());
    let config = SyncConfigBuilder::new().quiet_period(quiet).build();
    let controller = SyncController::new(store.clone(), config);

    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║            Shared Room Walkthrough                          ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!("Room: {}", room);

    let alice = controller.open(room.clone()).await;
    let bob = controller.open(room.clone()).await;
    let mut bob_events = bob.subscribe();

    println!("\n[1/4] Alice types a burst of keystrokes...");
    let mut typed = String::new();
    for ch in "Shopping: eggs, milk".chars() {
        typed.push(ch);
        alice.update_text(typed.clone());
        tokio::time::sleep(quiet / 10).await;
    }
    tokio::time::sleep(quiet * 2).await;
    println!("  Writes reaching the store: {}", store.write_count(&room));
    println!("  Bob sees: {:?}", bob.text());
    while let Ok(event) = bob_events.try_recv() {
        match event {
            SessionEvent::TextChanged(text) => println!("  Bob saw text change: {:?}", text),
            other => println!("  Bob event: {:?}", other),
        }
    }

    println!("\n[2/4] Alice locks the room...");
    if let Err(err) = alice.set_credential("abc").await {
        println!("  Rejected: {}", err);
    }
    alice.set_credential("grocer").await?;
    tokio::time::sleep(quiet / 10).await;
    println!("  Bob now sees: {:?} ({:?})", bob.text(), bob.access_state());

    println!("\n[3/4] Carol arrives and guesses...");
    let carol = controller.open(room.clone()).await;
    for guess in ["password", "grocery", "grocer"] {
        let granted = carol.submit_credential(guess).await;
        println!("  {:<10} -> {}", guess, if granted { "access granted" } else { "incorrect password" });
    }
    println!("  Carol sees: {:?}", carol.text());

    println!("\n[4/4] Bob (locked out) tries to write, Carol edits...");
    bob.update_text("bob was here");
    carol.update_text(format!("{}, bread", typed));
    tokio::time::sleep(quiet * 2).await;

    if let Some(doc) = store.document(&room) {
        let updated = chrono::DateTime::from_timestamp_millis(doc.last_updated)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        println!("  Final text: {:?}", doc.text);
        println!("  Last updated: {}", updated);
        println!("  Locked: {}", doc.is_locked);
    }
    if let Some(json) = store.export_json(&room)? {
        println!("\nStored record:\n{}", json);
    }
    println!("\nAlice's view: {}", serde_json::to_string(&alice.snapshot())?);

    carol.close();

    println!("\n✓ Walkthrough completed successfully!");
    Ok(())
}
