//! Small helpers shared by handlers.

use url::Url;

/// Derive an artifact name from the last path segment of a URL.
///
/// Query strings and fragments are ignored and the segment is
/// percent-decoded. Returns `None` for unparsable URLs and for URLs whose
/// path ends in a slash.
pub fn artifact_name_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    let name = urlencoding::decode(segment).ok()?;
    (!name.is_empty()).then(|| name.into_owned())
}
