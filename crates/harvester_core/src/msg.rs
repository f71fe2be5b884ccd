use std::collections::HashSet;

use crate::{Cursor, PageBatch};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Invocation requested.
    Started,
    /// Cursor slot read; `None` starts a fresh sequence.
    CursorLoaded(Option<Cursor>),
    /// Names already present in the sink.
    SinkKeysLoaded(HashSet<String>),
    /// A page arrived. `processed_at` stamps every record normalized from it.
    PageFetched {
        batch: PageBatch,
        processed_at: String,
    },
    /// The source failed; the loop stops with the last good cursor.
    FetchFailed { reason: String },
    /// The buffered batch reached the sink.
    RecordsAppended { count: usize },
    /// The cursor slot was written.
    CursorStored,
    /// Sink or cursor store could not be reached. Ends the run without
    /// touching the cursor.
    StorageFailed { reason: String },
}
