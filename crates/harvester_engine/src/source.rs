use harvester_core::{Cursor, PageBatch};

use crate::ProviderError;

/// One page at a time from a provider's result sequence.
///
/// `cursor` is `None` for the first page, otherwise a token this source
/// issued for the same query. After a batch signalling
/// [`harvester_core::PageSignal::Exhausted`] callers must not fetch again.
/// Implementations do not retry.
#[async_trait::async_trait]
pub trait ResultSource: Send + Sync {
    async fn fetch(&self, cursor: Option<&Cursor>) -> Result<PageBatch, ProviderError>;
}

#[async_trait::async_trait]
impl<T: ResultSource + ?Sized> ResultSource for Box<T> {
    async fn fetch(&self, cursor: Option<&Cursor>) -> Result<PageBatch, ProviderError> {
        (**self).fetch(cursor).await
    }
}
