//! Charset decoding stage.

use bytes::Bytes;
use courier_core::{Error, Result};
use encoding_rs::{Encoding, UTF_8};

use crate::stage::{ResponseStage, StageFuture};
use crate::{Client, Response, ResponseOptions};

/// Bytes scanned for an in-document `charset=` declaration.
const PRESCAN_LIMIT: usize = 1024;

/// Transcodes buffered bodies to UTF-8.
///
/// The body is transcoded when it is first buffered, whether by auto-read
/// or by a later [`Response::bytes`] call; this stage covers bodies that
/// were buffered before any transcoding happened. Only content types
/// passing the client predicate are touched. Bodies already in UTF-8, or
/// without a detectable charset, are left as they are; a byte sequence
/// invalid in the detected charset fails with [`Error::Decode`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoDecode;

impl ResponseStage for AutoDecode {
    fn after_response<'a>(
        &'a self,
        _client: &'a Client,
        response: &'a mut Response,
    ) -> StageFuture<'a> {
        Box::pin(std::future::ready(response.transcode()))
    }
}

/// Transcode `body` to UTF-8 when `options` select `content_type`.
///
/// Returns `None` when the body is kept as is.
pub(crate) fn transcode(
    options: &ResponseOptions,
    content_type: &str,
    body: &Bytes,
) -> Result<Option<Bytes>> {
    if !options.should_decode(content_type) {
        return Ok(None);
    }
    let Some((encoding, bom_len)) = detect_charset(content_type, body) else {
        return Ok(None);
    };

    let decoded = if encoding == UTF_8 {
        if bom_len == 0 {
            return Ok(None);
        }
        body.slice(bom_len..)
    } else {
        let content = body.get(bom_len..).unwrap_or_default();
        let text = encoding
            .decode_without_bom_handling_and_without_replacement(content)
            .ok_or_else(|| Error::decode(encoding.name()))?;
        Bytes::from(text.into_owned())
    };

    tracing::debug!(charset = encoding.name(), "decoded response body to utf-8");
    Ok(Some(decoded))
}

/// Detect the charset of a body with its byte order mark length.
///
/// Looks at the BOM first, then the `charset` parameter of `content_type`,
/// then a `charset=` declaration in the first kilobyte of the body, as
/// found in HTML `<meta>` tags.
#[must_use]
pub fn detect_charset(content_type: &str, body: &[u8]) -> Option<(&'static Encoding, usize)> {
    if let Some(found) = Encoding::for_bom(body) {
        return Some(found);
    }

    let declared = content_type
        .parse::<mime::Mime>()
        .ok()
        .and_then(|parsed| {
            parsed
                .get_param(mime::CHARSET)
                .map(|charset| charset.as_str().trim_matches('"').to_string())
        })
        .and_then(|label| Encoding::for_label(label.as_bytes()));
    if let Some(encoding) = declared {
        return Some((encoding, 0));
    }

    prescan(body.get(..PRESCAN_LIMIT).unwrap_or(body)).map(|encoding| (encoding, 0))
}

fn prescan(head: &[u8]) -> Option<&'static Encoding> {
    const NEEDLE: &[u8] = b"charset";

    let head = head.to_ascii_lowercase();
    let mut rest = head.as_slice();
    while let Some(pos) = rest.windows(NEEDLE.len()).position(|window| window == NEEDLE) {
        rest = rest.get(pos + NEEDLE.len()..)?;
        let Some(value) = rest.trim_ascii_start().strip_prefix(b"=") else {
            continue;
        };
        let value = value
            .trim_ascii_start()
            .strip_prefix(b"\"")
            .or_else(|| value.trim_ascii_start().strip_prefix(b"'"))
            .unwrap_or_else(|| value.trim_ascii_start());
        let end = value
            .iter()
            .position(|&b| matches!(b, b'"' | b'\'' | b';' | b'>' | b'/') || b.is_ascii_whitespace())
            .unwrap_or(value.len());
        // a UTF-16 document could not have been scanned as ASCII
        if let Some(encoding) = value.get(..end).and_then(Encoding::for_label) {
            return Some(encoding.output_encoding());
        }
    }
    None
}
