use crate::parser::StackFrame;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};

/// The call stack at one stop point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub sequence: u64,
    /// Innermost first.
    pub frames: Vec<StackFrame>,
    pub current_line: Option<u32>,
}

/// Append-only history of stop points.
#[derive(Debug, Default)]
pub struct SnapshotLog {
    snapshots: Vec<Snapshot>,
    sequence: u64,
}

impl SnapshotLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stop. The sequence number only advances for stops with a known source line.
    pub fn record(&mut self, frames: Vec<StackFrame>) -> &Snapshot {
        let current_line = frames
            .iter()
            .find(|f| f.frame_index == 0)
            .and_then(|f| f.source_line);
        if current_line.is_some() {
            self.sequence += 1;
        }
        self.snapshots.push(Snapshot {
            sequence: self.sequence,
            frames,
            current_line,
        });
        &self.snapshots[self.snapshots.len() - 1]
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn into_snapshots(self) -> Vec<Snapshot> {
        self.snapshots
    }

    pub fn write_jsonl<W: Write>(&self, mut out: W) -> io::Result<()> {
        for snapshot in &self.snapshots {
            serde_json::to_writer(&mut out, snapshot)?;
            out.write_all(b"\n")?;
        }
        out.flush()
    }

    pub fn read_jsonl<R: BufRead>(input: R) -> io::Result<Vec<Snapshot>> {
        let mut snapshots = Vec::new();
        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            snapshots.push(serde_json::from_str(&line)?);
        }
        Ok(snapshots)
    }
}
