//! Expander stage (spec §6): inserts one space between each pair of adjacent
//! bytes; length 0 and 1 inputs pass through unchanged. Grounded on
//! `original_source/plugins/expander.c`.

fn transform(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    if bytes.len() < 2 {
        return Some(input.to_string());
    }
    let mut out = Vec::with_capacity(bytes.len() * 2 - 1);
    for (i, &b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(b' ');
        }
        out.push(b);
    }
    String::from_utf8(out).ok()
}

stage_abi::export_stage!("expander", transform);
