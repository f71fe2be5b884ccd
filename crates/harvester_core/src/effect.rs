use crate::{BusinessRecord, Cursor};

/// IO the runner must perform on behalf of the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    LoadCursor,
    ReadSinkKeys,
    FetchPage { cursor: Option<Cursor> },
    AppendRecords { records: Vec<BusinessRecord> },
    StoreCursor { cursor: Option<Cursor> },
}
