//! Download stage.

use std::path::{Path, PathBuf};

use courier_core::{BodyStream, Error, Result, full_body};
use futures_util::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::dispatch::guarded;
use crate::request::Output;
use crate::response::Body;
use crate::stage::{ResponseStage, StageFuture};
use crate::{Client, Response};

/// Streams the response body into the request output.
///
/// Relative file paths are resolved against the client output directory and
/// missing parent directories are created. The body is consumed afterwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct Download;

impl ResponseStage for Download {
    fn after_response<'a>(
        &'a self,
        client: &'a Client,
        response: &'a mut Response,
    ) -> StageFuture<'a> {
        Box::pin(async move {
            let Some(output) = response.request_mut().output.take() else {
                return Ok(());
            };
            let deadline = response.request().deadline;
            let cancel = response.request().cancel.clone();

            let stream = match response.take_body() {
                Body::Stream(stream) => stream,
                Body::Buffered(bytes) => full_body(bytes),
                Body::Consumed => return Err(Error::BodyConsumed),
            };
            let directory = client.state().output_directory.as_deref();
            let written = guarded(write_output(stream, output, directory), deadline, cancel.as_ref()).await?;
            tracing::debug!(bytes = written, "download complete");
            Ok(())
        })
    }
}

async fn write_output(stream: BodyStream, output: Output, directory: Option<&Path>) -> Result<u64> {
    match output {
        Output::File(path) => {
            let path = output_path(directory, path);
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            let mut file = tokio::fs::File::create(&path).await?;
            copy(stream, &mut file).await
        }
        Output::Writer(mut writer) => copy(stream, &mut writer).await,
    }
}

fn output_path(directory: Option<&Path>, path: PathBuf) -> PathBuf {
    match directory {
        Some(directory) if path.is_relative() => directory.join(path),
        _ => path,
    }
}

async fn copy<W>(mut stream: BodyStream, writer: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    let mut written = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    writer.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use assert2::check;

    use super::*;

    #[test]
    fn relative_paths_use_output_directory() {
        let directory = Path::new("/tmp/downloads");
        check!(output_path(Some(directory), "a/b.bin".into()) == PathBuf::from("/tmp/downloads/a/b.bin"));
        check!(output_path(Some(directory), "/abs/b.bin".into()) == PathBuf::from("/abs/b.bin"));
        check!(output_path(None, "b.bin".into()) == PathBuf::from("b.bin"));
    }

    #[tokio::test]
    async fn copies_every_chunk() {
        let stream: BodyStream = Box::pin(futures_util::stream::iter([
            Ok(bytes::Bytes::from_static(b"hello ")),
            Ok(bytes::Bytes::from_static(b"world")),
        ]));
        let mut sink = Vec::new();
        let written = copy(stream, &mut sink).await.expect("copy");

        check!(written == 11);
        check!(sink == b"hello world");
    }
}
