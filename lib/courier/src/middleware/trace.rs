//! Trace attachment stage.

use courier_core::{Result, Trace};

use crate::stage::RequestStage;
use crate::{Client, Request};

/// Creates the trace handle of timed calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttachTrace;

impl RequestStage for AttachTrace {
    fn before_request(&self, client: &Client, request: &mut Request) -> Result<()> {
        if request.trace_enabled || client.state().trace_all {
            request.trace = Some(Trace::new());
        }
        Ok(())
    }
}
