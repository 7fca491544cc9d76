//! Helpers for building Cypher text. Store clients only accept query text, so
//! literals and identifiers are quoted here rather than passed as parameters.

/// Single-quoted Cypher string literal.
pub fn string_literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

/// Backtick-quoted identifier (labels, constraint names).
pub fn identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Default columns of `SHOW CONSTRAINTS` without a `YIELD`, in server order.
pub const SHOW_CONSTRAINTS_COLUMNS: [&str; 8] = [
    "id",
    "name",
    "type",
    "entityType",
    "labelsOrTypes",
    "properties",
    "ownedIndex",
    "propertyType",
];

/// Result column names of a read query, in projection order.
///
/// Taken from the last top-level `RETURN` or `YIELD`: an `AS` alias names its
/// column, otherwise the expression text does. `None` when the query has no
/// projection or projects `*`.
pub fn result_columns(query: &str) -> Option<Vec<String>> {
    let mask = top_level_mask(query);
    let clause = ["RETURN", "YIELD"]
        .iter()
        .flat_map(|kw| {
            find_keyword(query, &mask, kw)
                .into_iter()
                .map(move |at| at + kw.len())
        })
        .max();
    let Some(from) = clause else {
        return is_show_constraints(query)
            .then(|| SHOW_CONSTRAINTS_COLUMNS.iter().map(|c| c.to_string()).collect());
    };

    let to = ["ORDER", "SKIP", "LIMIT", "UNION", "WHERE"]
        .iter()
        .flat_map(|kw| find_keyword(query, &mask, kw))
        .chain(
            query
                .char_indices()
                .filter(|&(i, c)| c == ';' && mask[i])
                .map(|(i, _)| i),
        )
        .filter(|&at| at > from)
        .min()
        .unwrap_or(query.len());

    let mut from = from;
    if let Some(distinct) = find_keyword(query, &mask, "DISTINCT")
        .into_iter()
        .find(|&at| at >= from && query[from..at].trim().is_empty())
    {
        from = distinct + "DISTINCT".len();
    }

    let projection = query[from..to].trim();
    if projection.is_empty() || projection == "*" {
        return None;
    }

    let mut columns = Vec::new();
    let mut start = from;
    for (i, c) in query[from..to].char_indices() {
        if c == ',' && mask[from + i] {
            columns.push(column_name(query, &mask, start, from + i));
            start = from + i + 1;
        }
    }
    columns.push(column_name(query, &mask, start, to));
    Some(columns)
}

fn column_name(query: &str, mask: &[bool], start: usize, end: usize) -> String {
    let alias = find_keyword(query, mask, "AS")
        .into_iter()
        .filter(|&at| at >= start && at < end)
        .last();
    match alias {
        Some(at) => unquote_identifier(query[at + 2..end].trim()),
        None => query[start..end].trim().to_string(),
    }
}

fn unquote_identifier(name: &str) -> String {
    match name.strip_prefix('`').and_then(|n| n.strip_suffix('`')) {
        Some(inner) => inner.replace("``", "`"),
        None => name.to_string(),
    }
}

fn is_show_constraints(query: &str) -> bool {
    let mut words = query.split_whitespace().map(|w| w.to_ascii_uppercase());
    words.next().as_deref() == Some("SHOW")
        && words.take(2).any(|w| w.starts_with("CONSTRAINT"))
}

/// Per byte: true outside string literals, quoted identifiers and brackets.
fn top_level_mask(query: &str) -> Vec<bool> {
    let bytes = query.as_bytes();
    let mut mask = vec![false; bytes.len()];
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' && q != b'`' {
                escaped = true;
            } else if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'\'' | b'"' | b'`' => quote = Some(b),
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            _ => mask[i] = depth == 0,
        }
    }
    mask
}

/// Offsets of `keyword` as a whole top-level word, case-insensitive.
fn find_keyword(query: &str, mask: &[bool], keyword: &str) -> Vec<usize> {
    let upper = query.to_ascii_uppercase();
    let bytes = upper.as_bytes();
    let kw = keyword.as_bytes();
    let is_word = |b: u8| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'$');
    if bytes.len() < kw.len() {
        return Vec::new();
    }
    (0..=bytes.len() - kw.len())
        .filter(|&i| {
            &bytes[i..i + kw.len()] == kw
                && mask[i..i + kw.len()].iter().all(|&top| top)
                && (i == 0 || !is_word(bytes[i - 1]))
                && bytes.get(i + kw.len()).map_or(true, |&b| !is_word(b))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(query: &str) -> Vec<String> {
        result_columns(query).unwrap_or_default()
    }

    #[test]
    fn string_literal_escapes_quotes_and_backslashes() {
        assert_eq!(string_literal("plain"), "'plain'");
        assert_eq!(string_literal("it's"), r"'it\'s'");
        assert_eq!(string_literal(r"a\b"), r"'a\\b'");
    }

    #[test]
    fn identifier_doubles_backticks() {
        assert_eq!(identifier("user_name_constraint"), "`user_name_constraint`");
        assert_eq!(identifier("odd`name"), "`odd``name`");
    }

    #[test]
    fn unaliased_columns_keep_expression_text() {
        assert_eq!(
            columns("MATCH (u:User) RETURN u.name, u.age, u.city, u.email ORDER BY u.name"),
            ["u.name", "u.age", "u.city", "u.email"]
        );
        assert_eq!(
            columns(
                "MATCH (u:User)-[r:CREATED]->(p:Post) \
                 RETURN elementId(r), datetime(r.timestamp).epochMillis ORDER BY elementId(r)"
            ),
            ["elementId(r)", "datetime(r.timestamp).epochMillis"]
        );
    }

    #[test]
    fn aliases_name_their_columns() {
        assert_eq!(columns("MATCH (n) RETURN count(n) AS count"), ["count"]);
        assert_eq!(
            columns("MATCH (n) RETURN DISTINCT n.name as `odd``name`, coalesce(n.a, 'x, y') LIMIT 3"),
            ["odd`name", "coalesce(n.a, 'x, y')"]
        );
    }

    #[test]
    fn last_projection_wins() {
        assert_eq!(
            columns("MATCH (n) WITH n RETURN n.order, {a: 1, b: 2} AS m SKIP 1"),
            ["n.order", "m"]
        );
        assert_eq!(
            columns("CALL { MATCH (n) RETURN n } RETURN count(*) AS total"),
            ["total"]
        );
    }

    #[test]
    fn show_constraints_uses_server_columns() {
        assert_eq!(columns("SHOW CONSTRAINTS"), SHOW_CONSTRAINTS_COLUMNS);
        assert_eq!(columns("show all constraints"), SHOW_CONSTRAINTS_COLUMNS);
        assert_eq!(
            columns("SHOW CONSTRAINTS YIELD name, type WHERE type = 'UNIQUENESS'"),
            ["name", "type"]
        );
    }

    #[test]
    fn statements_without_projection_have_no_columns() {
        assert_eq!(result_columns("MATCH (n) DETACH DELETE n"), None);
        assert_eq!(result_columns("MATCH (n) RETURN *"), None);
        assert_eq!(result_columns("CREATE (:User {name: 'RETURN x'})"), None);
    }
}
