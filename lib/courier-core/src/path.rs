//! Path parameter expansion.

use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Characters escaped inside a single path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Replace `{name}` placeholders with percent-encoded values.
///
/// Placeholders without a value are left untouched, so a later pass (the
/// client-level parameters) can still fill them.
///
/// ```
/// use std::collections::BTreeMap;
/// use courier_core::expand_path_params;
///
/// let params = BTreeMap::from([("user".to_string(), "a b/c".to_string())]);
/// let url = expand_path_params("/users/{user}/repos/{repo}", &params);
/// assert_eq!(url, "/users/a%20b%2Fc/repos/{repo}");
/// ```
#[must_use]
pub fn expand_path_params(raw: &str, params: &BTreeMap<String, String>) -> String {
    if params.is_empty() || !raw.contains('{') {
        return raw.to_string();
    }

    let mut result = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('{') {
        let (before, candidate) = rest.split_at(start);
        result.push_str(before);

        let Some(end) = candidate.find('}') else {
            result.push_str(candidate);
            return result;
        };
        let name = candidate.get(1..end).unwrap_or_default();
        match params.get(name) {
            Some(value) => {
                result.extend(utf8_percent_encode(value, PATH_SEGMENT));
            }
            None => result.push_str(candidate.get(..=end).unwrap_or(candidate)),
        }
        rest = candidate.get(end + 1..).unwrap_or_default();
    }
    result.push_str(rest);
    result
}
