//! Harvester core: record model, normalization, dedup and the pure harvest
//! state machine. No IO happens here; the engine executes the effects.
mod cursor;
mod dedup;
mod effect;
mod msg;
mod normalize;
mod raw;
mod record;
mod report;
mod state;
mod update;

pub use cursor::{Cursor, PageBatch, PageSignal};
pub use dedup::DedupIndex;
pub use effect::Effect;
pub use msg::Msg;
pub use normalize::{name_key, FieldNormalizer, TextBlockFields, SEGMENT_SEPARATOR};
pub use raw::RawListing;
pub use record::{BusinessRecord, COLUMNS, NOT_AVAILABLE, NO_REVIEWS};
pub use report::{HarvestReport, RunStats};
pub use state::{HarvestState, Phase, StopReason, DEFAULT_PAGE_BUDGET};
pub use update::update;
