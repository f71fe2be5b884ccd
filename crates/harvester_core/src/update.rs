use crate::{Effect, HarvestState, Msg, PageBatch, PageSignal, Phase, StopReason};

/// Pure update function: applies a message to state and returns any effects.
///
/// Messages that do not belong to the current phase are ignored.
pub fn update(mut state: HarvestState, msg: Msg) -> (HarvestState, Vec<Effect>) {
    let effects = match (state.phase(), msg) {
        (Phase::Init, Msg::Started) => vec![Effect::LoadCursor],
        (Phase::Init, Msg::CursorLoaded(cursor)) => {
            state.load_cursor(cursor);
            vec![Effect::ReadSinkKeys]
        }
        (Phase::Init, Msg::SinkKeysLoaded(keys)) => {
            state.seed(keys);
            state.set_phase(Phase::Running);
            vec![Effect::FetchPage {
                cursor: state.cursor().cloned(),
            }]
        }
        (Phase::Running, Msg::PageFetched {
            batch,
            processed_at,
        }) => apply_page(&mut state, batch, &processed_at),
        (Phase::Running, Msg::FetchFailed { reason }) => {
            state.stop(StopReason::ProviderFailed(reason));
            finalize(&mut state)
        }
        (Phase::Finalize, Msg::RecordsAppended { count }) => {
            state.record_appended(count);
            vec![Effect::StoreCursor {
                cursor: state.cursor_to_persist(),
            }]
        }
        (Phase::Finalize, Msg::CursorStored) => {
            state.set_phase(Phase::Done);
            Vec::new()
        }
        (phase, Msg::StorageFailed { reason }) if phase != Phase::Done => {
            // Nothing further is written, the cursor slot keeps its old value.
            state.fail_storage(reason);
            state.set_phase(Phase::Done);
            Vec::new()
        }
        _ => Vec::new(),
    };

    (state, effects)
}

fn apply_page(state: &mut HarvestState, batch: PageBatch, processed_at: &str) -> Vec<Effect> {
    let budget_spent = state.page_completed();

    if batch.is_empty() {
        let reason = match batch.signal {
            PageSignal::Exhausted => StopReason::Exhausted,
            PageSignal::HasMore(_) => StopReason::EmptyPage,
        };
        state.stop(reason);
        return finalize(state);
    }

    let normalizer = state.normalizer();
    for raw in &batch.records {
        match normalizer.normalize(raw, processed_at) {
            Some(record) => {
                state.offer(record);
            }
            None => state.reject(),
        }
    }

    match batch.signal {
        PageSignal::Exhausted => {
            state.stop(StopReason::Exhausted);
            finalize(state)
        }
        PageSignal::HasMore(next) => {
            state.advance_cursor(next);
            if budget_spent {
                state.stop(StopReason::BudgetReached);
                finalize(state)
            } else {
                vec![Effect::FetchPage {
                    cursor: state.cursor().cloned(),
                }]
            }
        }
    }
}

fn finalize(state: &mut HarvestState) -> Vec<Effect> {
    state.set_phase(Phase::Finalize);
    let records = state.take_buffer();
    if records.is_empty() {
        vec![Effect::StoreCursor {
            cursor: state.cursor_to_persist(),
        }]
    } else {
        vec![Effect::AppendRecords { records }]
    }
}
