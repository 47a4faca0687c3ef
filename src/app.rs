//! Polling loop over all configured instruments.
//!
//! Serial exchanges block for up to `read_timeout × (threshold + 1)` each, so
//! every cycle runs on Tokio's blocking pool while the async side only keeps
//! time and waits for Ctrl-C. Instruments are polled one after another; an
//! instrument that cannot be reached or a log file that cannot be written is
//! reported and skipped, never fatal.

use crate::adapters::ChannelOpener;
use crate::instrument::CsStandard;
use crate::schedule::LogSchedule;
use anyhow::{Context, Result};
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Outcome of one polling cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Readings appended to their log file.
    pub logged: usize,
    /// Readings dropped because the log file could not be written.
    pub failed: usize,
}

/// Poll every instrument once, sequentially, and log the readings.
///
/// Each reading is stamped by its instrument when its report arrives.
pub fn run_cycle<O: ChannelOpener>(instruments: &mut [CsStandard<O>]) -> CycleSummary {
    let mut summary = CycleSummary::default();
    for cs in instruments.iter_mut() {
        match cs.log_once() {
            Ok(_) => summary.logged += 1,
            Err(e) => {
                error!(
                    instrument = %cs.name(),
                    file = %cs.log_file().path().display(),
                    error = %e,
                    "Log file not updated"
                );
                summary.failed += 1;
            }
        }
    }
    summary
}

/// Identify every instrument on the blocking pool.
pub async fn identify_all<O>(mut instruments: Vec<CsStandard<O>>) -> Result<Vec<CsStandard<O>>>
where
    O: ChannelOpener + 'static,
{
    tokio::task::spawn_blocking(move || {
        for cs in instruments.iter_mut() {
            cs.identify();
        }
        instruments
    })
    .await
    .context("Identification task panicked")
}

/// Run a single cycle immediately.
pub async fn run_once<O>(instruments: Vec<CsStandard<O>>) -> Result<(Vec<CsStandard<O>>, CycleSummary)>
where
    O: ChannelOpener + 'static,
{
    poll_blocking(instruments).await
}

async fn poll_blocking<O>(
    mut instruments: Vec<CsStandard<O>>,
) -> Result<(Vec<CsStandard<O>>, CycleSummary)>
where
    O: ChannelOpener + 'static,
{
    tokio::task::spawn_blocking(move || {
        let summary = run_cycle(&mut instruments);
        (instruments, summary)
    })
    .await
    .context("Polling task panicked")
}

/// Poll on `schedule` until `shutdown` resolves.
///
/// The clock is checked every `poll_period`. A cycle in progress always runs
/// to completion before shutdown is honoured.
pub async fn run<O, S>(
    mut instruments: Vec<CsStandard<O>>,
    mut schedule: LogSchedule,
    poll_period: Duration,
    shutdown: S,
) -> Result<()>
where
    O: ChannelOpener + 'static,
    S: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(poll_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    info!(instruments = instruments.len(), "Polling loop started");
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, leaving polling loop");
                break;
            }
            _ = ticker.tick() => {
                if !schedule.is_due(Utc::now()) {
                    continue;
                }
                let (returned, summary) = poll_blocking(instruments).await?;
                instruments = returned;
                info!(logged = summary.logged, failed = summary.failed, "Polling cycle finished");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{ScriptStep, ScriptedOpener};
    use crate::data::CsvLogFile;
    use crate::report::CsvFormat;
    use crate::transport::Transport;
    use std::sync::{Arc, Mutex};

    fn station(dir: &std::path::Path, name: &str, opener: ScriptedOpener) -> CsStandard<ScriptedOpener> {
        let log = CsvLogFile::new(dir.join(format!("{}.csv", name)), CsvFormat::default());
        CsStandard::new(name, Transport::new(opener), log)
    }

    #[test]
    fn test_cycle_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = station(
            dir.path(),
            "good",
            ScriptedOpener::new("a").with_session(vec![ScriptStep::line("CBT ID: 1")]),
        );
        // Log path is a directory, so the write fails.
        std::fs::create_dir(dir.path().join("bad.csv")).unwrap();
        let bad = station(dir.path(), "bad", ScriptedOpener::new("b"));

        let mut instruments = vec![bad, good];
        let summary = run_cycle(&mut instruments);
        assert_eq!(summary, CycleSummary { logged: 1, failed: 1 });
        assert!(dir.path().join("good.csv").is_file());
    }

    #[test]
    fn test_later_instruments_stamped_when_polled() {
        let dir = tempfile::tempdir().unwrap();
        let delay = Duration::from_millis(20);
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let mut instruments: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|name| {
                let opener = ScriptedOpener::new(name)
                    .with_read_delay(delay)
                    .with_session(vec![ScriptStep::line("CBT ID: 1")]);
                let stamps = Arc::clone(&stamps);
                station(dir.path(), name, opener).with_clock(move || {
                    let now = Utc::now();
                    stamps.lock().unwrap().push(now);
                    now
                })
            })
            .collect();

        let start = Utc::now();
        assert_eq!(run_cycle(&mut instruments).logged, 2);

        let stamps = stamps.lock().unwrap();
        assert_eq!(stamps.len(), 2);
        // Every exchange is one line plus five timeouts, each read taking `delay`.
        let a = (stamps[0] - start).to_std().unwrap();
        let b = (stamps[1] - start).to_std().unwrap();
        assert!(a >= delay * 6, "a stamped after {:?}", a);
        assert!(b >= delay * 12, "b stamped after {:?}", b);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let instruments = vec![station(dir.path(), "cs", ScriptedOpener::new("x"))];
        let result = run(
            instruments,
            LogSchedule::new(1, 10),
            Duration::from_millis(10),
            async {},
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_identify_and_run_once() {
        let dir = tempfile::tempdir().unwrap();
        let opener = ScriptedOpener::new("x").with_session(vec![
            ScriptStep::line("HEWLETT-PACKARD,5071A,0,1"),
            ScriptStep::Timeout,
            ScriptStep::Timeout,
            ScriptStep::Timeout,
            ScriptStep::Timeout,
            ScriptStep::Timeout,
            ScriptStep::line("CBT ID: CBT047"),
        ]);
        let instruments = identify_all(vec![station(dir.path(), "cs", opener)])
            .await
            .unwrap();
        assert_eq!(instruments[0].device_id(), Some("HEWLETT-PACKARD,5071A,0,1"));

        let (_, summary) = run_once(instruments).await.unwrap();
        assert_eq!(summary.logged, 1);
        let content = std::fs::read_to_string(dir.path().join("cs.csv")).unwrap();
        assert!(content.contains(",CBT047,"));
    }
}
