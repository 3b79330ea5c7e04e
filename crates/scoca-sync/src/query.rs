//! CourtListener filter encoding.

/// A filter value: a single string, or a list sent comma-joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterValue<'a> {
    One(&'a str),
    List(&'a [&'a str]),
}

/// Encode filters as a query string, including the leading `?`.
///
/// Keys and values are percent-encoded, except that a trailing `!` on a key
/// is kept literally (CourtListener's field-exclusion syntax). List elements
/// are encoded one by one and joined with unencoded commas. An empty filter
/// set yields an empty string.
pub fn filters_to_query(filters: &[(&str, FilterValue<'_>)]) -> String {
    if filters.is_empty() {
        return String::new();
    }
    let params: Vec<String> = filters
        .iter()
        .map(|(key, value)| {
            let key = match key.strip_suffix('!') {
                Some(stem) => format!("{}!", urlencoding::encode(stem)),
                None => urlencoding::encode(key).into_owned(),
            };
            let value = match value {
                FilterValue::One(v) => urlencoding::encode(v).into_owned(),
                FilterValue::List(vs) => vs
                    .iter()
                    .map(|v| urlencoding::encode(v).into_owned())
                    .collect::<Vec<_>>()
                    .join(","),
            };
            format!("{key}={value}")
        })
        .collect();
    format!("?{}", params.join("&"))
}
