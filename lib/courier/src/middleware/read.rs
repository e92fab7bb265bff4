//! Auto-read stage.

use crate::dispatch::guarded;
use crate::stage::{ResponseStage, StageFuture};
use crate::{Client, Response};

/// Buffers the response body, bounded by the call deadline.
///
/// Skipped for downloads and when the client disabled auto-read.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoRead;

impl ResponseStage for AutoRead {
    fn after_response<'a>(
        &'a self,
        client: &'a Client,
        response: &'a mut Response,
    ) -> StageFuture<'a> {
        Box::pin(async move {
            if client.state().disable_auto_read_response || response.request().is_download() {
                return Ok(());
            }
            let deadline = response.request().deadline;
            let cancel = response.request().cancel.clone();
            guarded(response.bytes(), deadline, cancel.as_ref()).await?;
            Ok(())
        })
    }
}
