mod ingest;
mod memlog;
mod program;
mod snapshot;
mod value;

pub use ingest::Observed;
pub use memlog::{parse_memlog_line, MemlogEvent, MemlogTail};
pub use program::{Frame, ProgramState, ValueId};
pub use snapshot::{Snapshot, SnapshotLog};
pub use value::{Address, ArraySlot, Location, Value, ValueData, GARBAGE};
