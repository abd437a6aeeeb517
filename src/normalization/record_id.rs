/// Strip SurrealDB record-id syntax (`table:⟨key⟩`, `` table:`key` ``, `table:key`)
/// down to the bare key.
///
/// Ids that do not start with `"<table>:"` are returned unchanged.
pub fn normalize_record_id<'a>(raw: &'a str, table: &str) -> &'a str {
    let Some(rest) = raw
        .strip_prefix(table)
        .and_then(|r| r.strip_prefix(':'))
    else {
        return raw;
    };

    if raw.contains('⟨') && raw.contains('⟩') {
        // Text after the first ⟨, cut at the next ⟨ and then at the first ⟩.
        let inner = rest.split('⟨').nth(1).unwrap_or_default();
        return inner.split('⟩').next().unwrap_or_default();
    }

    if let Some(inner) = rest
        .strip_prefix('`')
        .and_then(|r| r.strip_suffix('`'))
    {
        return inner;
    }

    rest
}
