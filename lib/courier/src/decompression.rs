//! Transparent response decompression.
//!
//! [`HyperTransport`](crate::HyperTransport) asks for gzip, deflate, br (brotli)
//! and zstd and decodes the response body according to its
//! `Content-Encoding` header. Decoding is lazy: nothing is read from the
//! network until the caller polls the body.

use std::io::Read;

use bytes::Bytes;
use courier_core::{BodyStream, Error, Result, collect_body};
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH};

/// Value sent in `Accept-Encoding`.
pub(crate) const ACCEPT_ENCODING: &str = "gzip, deflate, br, zstd";

/// Returns `true` if [`decompress`] knows `encoding`.
pub(crate) fn is_supported(encoding: &str) -> bool {
    matches!(encoding, "gzip" | "x-gzip" | "deflate" | "br" | "zstd")
}

/// Decompress bytes based on encoding.
pub(crate) fn decompress(encoding: &str, body: &Bytes) -> Result<Bytes> {
    let mut decompressed = Vec::new();
    match encoding {
        "gzip" | "x-gzip" => {
            flate2::read::GzDecoder::new(body.as_ref())
                .read_to_end(&mut decompressed)
                .map_err(|e| Error::invalid_request(format!("gzip decompression failed: {e}")))?;
        }
        "deflate" => {
            flate2::read::ZlibDecoder::new(body.as_ref())
                .read_to_end(&mut decompressed)
                .map_err(|e| {
                    Error::invalid_request(format!("deflate decompression failed: {e}"))
                })?;
        }
        "br" => {
            brotli::BrotliDecompress(&mut body.as_ref(), &mut decompressed)
                .map_err(|e| Error::invalid_request(format!("brotli decompression failed: {e}")))?;
        }
        "zstd" => {
            decompressed = zstd::decode_all(body.as_ref())
                .map_err(|e| Error::invalid_request(format!("zstd decompression failed: {e}")))?;
        }
        // Unknown encoding, return as-is
        _ => return Ok(body.clone()),
    }
    Ok(Bytes::from(decompressed))
}

/// Replace a compressed body by its decoded form.
///
/// `Content-Encoding` and `Content-Length` are dropped since they describe
/// the bytes on the wire, not the bytes the caller reads.
pub(crate) fn decompress_response(
    mut response: http::Response<BodyStream>,
) -> http::Response<BodyStream> {
    let Some(encoding) = response
        .headers()
        .get(CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_ascii_lowercase())
    else {
        return response;
    };
    if !is_supported(&encoding) {
        return response;
    }

    response.headers_mut().remove(CONTENT_ENCODING);
    response.headers_mut().remove(CONTENT_LENGTH);
    response.map(move |body| -> BodyStream {
        Box::pin(futures_util::stream::once(async move {
            let raw = collect_body(body).await?;
            decompress(&encoding, &raw)
        }))
    })
}
