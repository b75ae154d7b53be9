//! Risk event trail
//!
//! Every rejection becomes a [`RiskEvent`]: appended to an in-memory
//! rolling window, mirrored to an append-only CSV, and fanned out to
//! registered callbacks. Separately, every authorisation decision
//! (accept or reject) can be mirrored to a JSON-lines audit trail by a
//! background writer thread so the decision path never touches the
//! filesystem.

use crate::core::errors::RiskEventKind;
use crate::core::types::{SymbolId, Venue};
use anyhow::{Context, Result};
use crossbeam::channel::{bounded, Sender};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::thread;
use tracing::{error, info, warn};

/// Events kept in the in-memory rolling window
pub const MAX_RECENT_EVENTS: usize = 1_000;

#[derive(Debug, Clone)]
pub struct RiskEvent {
    pub timestamp_ns: u64,
    pub kind: RiskEventKind,
    pub venue: Option<Venue>,
    pub symbol: Option<SymbolId>,
    pub description: String,
    pub value: f64,
    pub halted: bool,
}

/// Rolling window plus optional CSV sink
pub struct RiskEventLog {
    recent: VecDeque<RiskEvent>,
    csv: Option<File>,
    violations_today: u64,
}

impl RiskEventLog {
    pub fn new() -> Self {
        Self {
            recent: VecDeque::with_capacity(MAX_RECENT_EVENTS),
            csv: None,
            violations_today: 0,
        }
    }

    /// Attach the CSV sink, writing the header row once on creation
    pub fn with_csv(path: &Path) -> Result<Self> {
        let mut file = File::create(path)
            .with_context(|| format!("creating risk event log {}", path.display()))?;
        writeln!(file, "timestamp_ns,kind,venue,symbol,description,value,halted")?;
        let mut log = Self::new();
        log.csv = Some(file);
        Ok(log)
    }

    pub fn append(&mut self, event: RiskEvent) {
        self.violations_today += 1;
        warn!(
            kind = %event.kind,
            value = event.value,
            halted = event.halted,
            "risk event: {}",
            event.description
        );

        if let Some(file) = self.csv.as_mut() {
            let venue = event.venue.map(|venue| venue.to_string()).unwrap_or_default();
            let sym = event.symbol.map(|sym| sym.to_string()).unwrap_or_default();
            if let Err(write_error) = writeln!(
                file,
                "{},{},{},{},{},{},{}",
                event.timestamp_ns,
                event.kind,
                venue,
                sym,
                event.description,
                event.value,
                if event.halted { 1 } else { 0 }
            ) {
                error!(%write_error, "risk event CSV append failed");
            }
        }

        if self.recent.len() == MAX_RECENT_EVENTS {
            self.recent.pop_front();
        }
        self.recent.push_back(event);
    }

    pub fn recent(&self) -> impl Iterator<Item = &RiskEvent> {
        self.recent.iter()
    }

    pub fn violations_today(&self) -> u64 {
        self.violations_today
    }
}

impl Default for RiskEventLog {
    fn default() -> Self {
        Self::new()
    }
}

/// One line of the per-decision audit trail
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditRecord {
    pub timestamp_ns: u64,
    pub authorized: bool,
    pub venue: String,
    pub symbol: SymbolId,
    pub quantity: f64,
    pub price: f64,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Background JSON-lines writer for the audit trail
///
/// Records are handed to a bounded channel; a full buffer drops the
/// record rather than stalling the authorisation path.
pub struct AuditTrail {
    sender: Option<Sender<AuditRecord>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl AuditTrail {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .with_context(|| format!("creating audit trail {}", path.display()))?;
        let (sender, receiver) = bounded::<AuditRecord>(4_096);

        let handle = thread::spawn(move || {
            let mut file = file;
            for record in receiver {
                match serde_json::to_string(&record) {
                    Ok(line) => {
                        if let Err(write_error) = writeln!(file, "{}", line) {
                            error!(%write_error, "audit trail write failed");
                        }
                    }
                    Err(serialize_error) => {
                        error!(%serialize_error, "audit record serialisation failed");
                    }
                }
            }
            if let Err(flush_error) = file.flush() {
                error!(%flush_error, "audit trail flush failed");
            }
            info!("audit trail writer stopping");
        });

        Ok(Self { sender: Some(sender), handle: Some(handle) })
    }

    /// Non-blocking record; drops on a full buffer
    pub fn record(&self, record: AuditRecord) {
        if let Some(sender) = &self.sender {
            if let Err(send_error) = sender.try_send(record) {
                error!(%send_error, "audit trail buffer full, dropping record");
            }
        }
    }
}

impl Drop for AuditTrail {
    fn drop(&mut self) {
        // Close the channel first so the writer drains and exits
        let _ = self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(value: f64) -> RiskEvent {
        RiskEvent {
            timestamp_ns: 1,
            kind: RiskEventKind::SpreadViolation,
            venue: Some(Venue::Coinbase),
            symbol: Some(1),
            description: "spread below minimum".into(),
            value,
            halted: false,
        }
    }

    #[test]
    fn test_rolling_window_is_bounded() {
        let mut log = RiskEventLog::new();
        for i in 0..(MAX_RECENT_EVENTS + 10) {
            log.append(sample_event(i as f64));
        }
        assert_eq!(log.recent().count(), MAX_RECENT_EVENTS);
        assert_eq!(log.violations_today(), (MAX_RECENT_EVENTS + 10) as u64);
        // Oldest entries were evicted
        assert_eq!(log.recent().next().unwrap().value, 10.0);
    }

    #[test]
    fn test_csv_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("risk_events.csv");
        let mut log = RiskEventLog::with_csv(&path).unwrap();
        log.append(sample_event(42.0));
        drop(log);

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "timestamp_ns,kind,venue,symbol,description,value,halted"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("SPREAD_VIOLATION"));
        assert!(row.contains("COINBASE"));
        assert!(row.ends_with(",0"));
    }

    #[test]
    fn test_audit_trail_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unified_risk_events.log");
        let trail = AuditTrail::create(&path).unwrap();
        trail.record(AuditRecord {
            timestamp_ns: 7,
            authorized: false,
            venue: "BINANCE".into(),
            symbol: 1,
            quantity: 0.5,
            price: 50_000.0,
            confidence: 0.0,
            reason: Some("spread".into()),
        });
        trail.record(AuditRecord {
            timestamp_ns: 8,
            authorized: true,
            venue: "BINANCE".into(),
            symbol: 1,
            quantity: 0.5,
            price: 50_000.0,
            confidence: 0.9,
            reason: None,
        });
        drop(trail); // joins the writer

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: AuditRecord = serde_json::from_str(lines[0]).unwrap();
        assert!(!first.authorized);
        assert_eq!(first.reason.as_deref(), Some("spread"));
        // Authorised records omit the reason field entirely
        assert!(!lines[1].contains("reason"));
    }
}
