use tinyurl_core::filter::Result;
use tinyurl_core::{scan_short_codes, CacheError, ExistenceFilter, UrlMappingRepository};
use tracing::info;

/// Pages through every allocated code in `repository` and adds it to `filter`.
///
/// Returns the number of codes loaded.
pub(crate) async fn load_from_store(
    filter: &dyn ExistenceFilter,
    repository: &dyn UrlMappingRepository,
    page_size: usize,
) -> Result<usize> {
    let mut pages = scan_short_codes(repository, page_size);
    let mut loaded = 0;

    while let Some(page) = pages
        .next_page()
        .await
        .map_err(|e| CacheError::Initialization(format!("failed to scan short codes: {e}")))?
    {
        filter.add_batch(&page).await?;
        loaded += page.len();
        info!(page = page.len(), loaded, "Added short codes to existence filter");
    }

    Ok(loaded)
}
