//! Raw scanning of STEP data records.
//!
//! Covers what truck's table does not expose: which closed shells bound
//! voids, and renumbering records so documents can be merged.

/// `(id, body)` of every `#id = BODY;` instance record in `text`.
pub(crate) fn records(text: &str) -> impl Iterator<Item = (u64, &str)> {
    text.split(';').filter_map(|record| {
        let rest = record.trim().strip_prefix('#')?;
        let (id, body) = rest.split_once('=')?;
        let id = id.trim().parse::<u64>().ok()?;
        Some((id, body.trim_start()))
    })
}

/// Every `#n` entity reference in a record, in order.
pub(crate) fn hash_refs(record: &str) -> Vec<u64> {
    let mut refs = Vec::new();
    let mut rest = record;
    while let Some(pos) = rest.find('#') {
        rest = &rest[pos + 1..];
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if let Ok(r) = rest[..digits].parse() {
            refs.push(r);
        }
        rest = &rest[digits..];
    }
    refs
}

/// Add `offset` to every `#n` reference in `text`.
pub(crate) fn renumber(text: &str, offset: u64) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('#') {
        out.push_str(&rest[..=pos]);
        rest = &rest[pos + 1..];
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        match rest[..digits].parse::<u64>() {
            Ok(n) => out.push_str(&(n + offset).to_string()),
            Err(_) => out.push_str(&rest[..digits]),
        }
        rest = &rest[digits..];
    }
    out.push_str(rest);
    out
}

/// Id of the first record whose body starts with `keyword(`.
pub(crate) fn first_record(text: &str, keyword: &str) -> Option<u64> {
    records(text)
        .find(|(_, body)| {
            body.strip_prefix(keyword)
                .is_some_and(|tail| tail.trim_start().starts_with('('))
        })
        .map(|(id, _)| id)
}
