use async_trait::async_trait;
use marquee_model::ResolveKey;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;

/// Maps an image request to a concrete URL.
///
/// `Ok(None)` and `Ok(Some(""))` both mean the variant does not exist and the
/// next candidate should be tried.
#[async_trait]
pub trait ImageResolver: Send + Sync {
    async fn resolve(
        &self,
        key: &ResolveKey,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, FetchError>;
}

/// Background download hint for a resolved URL.
#[async_trait]
pub trait AssetLoader: Send + Sync {
    async fn prefetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<(), FetchError>;
}

/// Loader that only records the URL; warming is left to the renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLoader;

#[async_trait]
impl AssetLoader for NoopLoader {
    async fn prefetch(
        &self,
        url: &str,
        _cancel: &CancellationToken,
    ) -> Result<(), FetchError> {
        log::trace!("Skipping asset warm-up for {}", url);
        Ok(())
    }
}
