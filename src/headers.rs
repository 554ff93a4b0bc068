use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::ApiClientError;

/// Builds a header map from name/value pairs, keeping repeated names as
/// multiple values.
pub(crate) fn header_map<I, K, V>(pairs: I) -> Result<HeaderMap, ApiClientError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        map.append(name, value);
    }
    Ok(map)
}

pub(crate) fn parse_header(
    name: &str,
    value: &str,
) -> Result<(HeaderName, HeaderValue), ApiClientError> {
    let header_name =
        HeaderName::from_bytes(name.as_bytes()).map_err(|err| ApiClientError::InvalidHeader {
            name: name.to_owned(),
            reason: err.to_string(),
        })?;
    let header_value = HeaderValue::from_str(value).map_err(|err| ApiClientError::InvalidHeader {
        name: name.to_owned(),
        reason: err.to_string(),
    })?;
    Ok((header_name, header_value))
}

/// Overlays `overlay` on `base`. Colliding names accumulate values; nothing
/// in `base` is overwritten.
pub(crate) fn merge_headers(base: &HeaderMap, overlay: HeaderMap) -> HeaderMap {
    let mut merged = base.clone();
    let mut current: Option<HeaderName> = None;
    for (name, value) in overlay {
        // `HeaderMap::into_iter` yields the name only for the first value.
        if let Some(name) = name {
            current = Some(name);
        }
        if let Some(name) = &current {
            merged.append(name.clone(), value);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::{header_map, merge_headers};
    use crate::ApiClientError;

    fn values<'a>(map: &'a reqwest::header::HeaderMap, name: &str) -> Vec<&'a str> {
        map.get_all(name)
            .iter()
            .map(|value| value.to_str().expect("header must be ascii"))
            .collect()
    }

    #[test]
    fn colliding_names_keep_both_values() {
        let base = header_map([("X", "a"), ("User-Agent", "client/1")]).expect("valid headers");
        let overlay = header_map([("x", "b")]).expect("valid headers");

        let merged = merge_headers(&base, overlay);

        assert_eq!(values(&merged, "x"), vec!["a", "b"]);
        assert_eq!(values(&merged, "user-agent"), vec!["client/1"]);
    }

    #[test]
    fn repeated_overlay_values_are_all_kept() {
        let base = header_map([("Accept", "text/html")]).expect("valid headers");
        let overlay = header_map([("Accept", "application/json"), ("Accept", "text/plain")])
            .expect("valid headers");

        let merged = merge_headers(&base, overlay);

        assert_eq!(
            values(&merged, "accept"),
            vec!["text/html", "application/json", "text/plain"]
        );
    }

    #[test]
    fn invalid_header_name_is_reported() {
        let err = header_map([("bad header", "v")]).expect_err("space is not allowed in names");
        match err {
            ApiClientError::InvalidHeader { name, .. } => assert_eq!(name, "bad header"),
            other => panic!("expected invalid header error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_header_value_is_reported() {
        assert!(header_map([("X-Value", "line\nbreak")]).is_err());
    }
}
