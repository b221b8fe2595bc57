use std::sync::Arc;

use tinyurl_allocator::Allocator;
use tinyurl_core::UrlMappingRepository;
use tinyurl_generator::CodeGenerator;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Warms the allocator's existence filter in the background.
///
/// Requests are served while this runs; a failed warm-up only leaves the
/// filter cold.
pub fn spawn_filter_warm_up<R, G>(allocator: Arc<Allocator<R, G>>) -> JoinHandle<()>
where
    R: UrlMappingRepository,
    G: CodeGenerator,
{
    tokio::spawn(async move {
        match allocator.warm_up_filter().await {
            Ok(()) => info!("Existence filter warm-up finished"),
            Err(e) => warn!(error = %e, "Existence filter warm-up failed, filter stays cold"),
        }
    })
}
