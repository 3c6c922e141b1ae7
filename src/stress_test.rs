use async_stream::stream;
use futures::stream::Stream;
use futures::stream::StreamExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};
use textroom_sdk::{DocumentSession, MemoryStore, SyncConfigBuilder, SyncController};

/// Statistics collected during stress testing
#[derive(Clone, Debug)]
pub struct StressTestStats {
    pub num_sessions: usize,
    pub edits_per_session: usize,
    pub total_writes: usize,
    pub total_time: Duration,
    pub coalescing_ratio: f64,
    pub final_len: usize,
    pub converged: bool,
}

impl StressTestStats {
    pub fn print(&self) {
        println!("\n╔════════════════════════════════════════════════════════════╗");
        println!("║              Stress Test Statistics                         ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║  Sessions:                  {:>38} ║", self.num_sessions);
        println!("║  Edits per Session:         {:>38} ║", self.edits_per_session);
        println!("║  Writes Reaching Store:     {:>38} ║", self.total_writes);
        println!("║  Edits per Write:           {:>38} ║", format!("{:.2}", self.coalescing_ratio));
        println!("║  Total Time:                {:>39}s ║", format!("{:.3}", self.total_time.as_secs_f64()));
        println!("║  Final Text Length:         {:>38} ║", self.final_len);
        println!("║  Sessions Converged:        {:>38} ║", self.converged);
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

/// Generator that yields keystrokes and the pause that follows each one
fn keystroke_generator(seed: u64, edits: usize, max_gap_ms: u64) -> impl Stream<Item = (char, Duration)> {
    stream! {
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..edits {
            let ch = rng.gen_range(b'a'..=b'z') as char;
            // Mostly fast typing with the occasional pause past the quiet period
            let gap = if rng.gen_bool(0.1) {
                rng.gen_range(max_gap_ms..=max_gap_ms * 2)
            } else {
                rng.gen_range(0..=max_gap_ms / 4)
            };
            yield (ch, Duration::from_millis(gap));
        }
    }
}

async fn type_into(
    session: DocumentSession<MemoryStore>,
    seed: u64,
    edits: usize,
    max_gap_ms: u64,
) -> DocumentSession<MemoryStore> {
    let mut keys = Box::pin(keystroke_generator(seed, edits, max_gap_ms));
    let mut typed = session.text().unwrap_or_default();
    while let Some((ch, gap)) = keys.next().await {
        typed.push(ch);
        session.update_text(typed.clone());
        tokio::time::sleep(gap).await;
    }
    if let Err(err) = session.flush().await {
        tracing::warn!(error = %err, "final flush failed");
    }
    session
}

/// Many sessions typing into one room at once
pub async fn stress_test_room(num_sessions: usize, edits_per_session: usize, seed: u64, quiet_ms: u64) -> StressTestStats {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║        Shared Room Stress Test                             ║");
    println!("║  Sessions: {} | Edits/Session: {} | Quiet: {}ms ║",
             num_sessions, edits_per_session, quiet_ms);
    println!("╚════════════════════════════════════════════════════════════╝");

    let store = Arc::new(MemoryStore::new());
    let config = SyncConfigBuilder::new().quiet_period_ms(quiet_ms).build();
    let controller = SyncController::new(store.clone(), config);

    let start = Instant::now();

    println!("\n[Phase 1/2] Typing...");

    let mut handles = vec![];
    for idx in 0..num_sessions {
        let session = controller.open("stress-room").await;
        let handle = tokio::spawn(type_into(session, seed.wrapping_add(idx as u64), edits_per_session, quiet_ms));
        handles.push(handle);
    }

    let mut sessions = Vec::with_capacity(num_sessions);
    for handle in handles {
        match handle.await {
            Ok(session) => sessions.push(session),
            Err(err) => tracing::error!(error = %err, "typing task failed"),
        }
    }

    println!("[Phase 1/2] ✓ Completed");
    println!("[Phase 2/2] Waiting for sessions to settle...");

    tokio::time::sleep(Duration::from_millis(quiet_ms * 4)).await;

    let total_time = start.elapsed();
    let final_text = store
        .document(&"stress-room".into())
        .map(|doc| doc.text)
        .unwrap_or_default();
    let converged = sessions
        .iter()
        .all(|s| s.text().as_deref() == Some(final_text.as_str()));

    let total_writes = store.writes().len();
    let total_edits = num_sessions * edits_per_session;
    let coalescing_ratio = if total_writes > 0 {
        total_edits as f64 / total_writes as f64
    } else {
        0.0
    };

    println!("[Phase 2/2] ✓ Completed");

    StressTestStats {
        num_sessions,
        edits_per_session,
        total_writes,
        total_time,
        coalescing_ratio,
        final_len: final_text.chars().count(),
        converged,
    }
}

/// Stress runs at increasing session counts
pub async fn stress_test_scaling(max_sessions: usize, step_size: usize, seed: u64, quiet_ms: u64) {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║      Scaling Analysis - Writes vs Concurrent Sessions      ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let mut current = step_size;
    while current <= max_sessions {
        let stats = stress_test_room(current, 50, seed, quiet_ms).await;
        stats.print();
        current += step_size;
    }
}
