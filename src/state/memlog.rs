//! Memory events written by an instrumented target, one JSON object per line.

use super::program::{ProgramState, ValueId};
use super::value::{Address, ArraySlot, Location, Value, ValueData};
use serde::Deserialize;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MemlogEvent {
    Alloc {
        site: u32,
        ptr: String,
        n: u64,
    },
    Store {
        site: u32,
        addr: String,
        n: u64,
        bytes: String,
    },
    Local {
        site: u32,
        #[serde(default)]
        name: String,
    },
}

/// `None` for blank or malformed lines.
pub fn parse_memlog_line(line: &str) -> Option<MemlogEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!(error = %e, line, "skipping memlog line");
            None
        }
    }
}

fn parse_address(text: &str) -> Option<Address> {
    let digits = text.trim().strip_prefix("0x").or_else(|| text.trim().strip_prefix("0X"))?;
    Address::from_str_radix(digits, 16).ok()
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Stores of up to eight bytes read as a little-endian integer; wider ones keep their hex.
fn stored_data(bytes: &str, n: u64) -> Option<ValueData> {
    let raw = decode_hex(bytes)?;
    if n <= 8 && raw.len() as u64 == n {
        let value = raw
            .iter()
            .rev()
            .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte));
        Some(ValueData::Scalar(value.to_string()))
    } else {
        Some(ValueData::Scalar(format!("0x{}", bytes.to_ascii_lowercase())))
    }
}

fn unsigned_type(n: u64) -> String {
    match n {
        1 | 2 | 4 | 8 => format!("u{}", n * 8),
        _ => format!("byte[{}]", n),
    }
}

impl ProgramState {
    /// Apply one event. Returns the value it touched, if any.
    pub fn apply_memlog(&mut self, event: &MemlogEvent) -> Option<ValueId> {
        match event {
            MemlogEvent::Alloc { site, ptr, n } => {
                let address = parse_address(ptr)?;
                trace!(site, address, n, "heap allocation");
                self.record_allocation(address, *n);
                let block = Value::new(format!("*{:#x}", address), unsigned_type(*n), Location::Heap)
                    .at(address)
                    .sized(*n as usize);
                Some(self.record_value(block))
            }
            MemlogEvent::Store { site, addr, n, bytes } => {
                let address = parse_address(addr)?;
                let data = stored_data(bytes, *n)?;
                trace!(site, address, n, "store");

                if let Some(id) = self.id_at(address) {
                    let value = self.value_at_mut(address)?;
                    if value.data() != &data {
                        value.assign(data);
                    }
                    return Some(id);
                }

                let start = self.allocation_containing(address)?;
                let mut value = Value::new(format!("*{:#x}", address), unsigned_type(*n), Location::Heap)
                    .at(address)
                    .sized(*n as usize);
                if *n > 0 {
                    let len = self.allocation_len(start).map_or(1, |len| (len / n).max(1) as usize);
                    value = value.in_array(ArraySlot {
                        start,
                        index: ((address - start) / n) as usize,
                        len,
                    });
                }
                Some(self.record_value(value.with_data(data)))
            }
            MemlogEvent::Local { .. } => None,
        }
    }
}

/// Reads events appended to a memlog file since the last poll.
#[derive(Debug)]
pub struct MemlogTail {
    path: PathBuf,
    offset: u64,
}

impl MemlogTail {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            offset: 0,
        }
    }

    /// New complete lines since the last call. A missing file reads as empty.
    pub fn poll(&mut self) -> io::Result<Vec<MemlogEvent>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        file.seek(SeekFrom::Start(self.offset))?;
        let mut appended = String::new();
        file.read_to_string(&mut appended)?;

        // A line still being written waits for the next poll.
        let complete = match appended.rfind('\n') {
            Some(end) => &appended[..=end],
            None => return Ok(Vec::new()),
        };
        self.offset += complete.len() as u64;
        Ok(complete.lines().filter_map(parse_memlog_line).collect())
    }
}
