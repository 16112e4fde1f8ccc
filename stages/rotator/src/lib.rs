//! Rotator stage (spec §6): rotates a record one byte to the right. Grounded
//! on `original_source/plugins/rotator.c`, which moves the last byte to the
//! front and shifts the rest down by one.
//!
//! Operates on bytes, not `char`s, matching the original; a record containing
//! multi-byte UTF-8 sequences can in principle come back invalid after a
//! rotation that splits one. The built-in stages only ever see plain ASCII
//! demo input, so this mirrors the original's behavior rather than working
//! around a case it never had to handle.

fn transform(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    if bytes.len() < 2 {
        return Some(input.to_string());
    }
    let mut out = Vec::with_capacity(bytes.len());
    out.push(bytes[bytes.len() - 1]);
    out.extend_from_slice(&bytes[..bytes.len() - 1]);
    String::from_utf8(out).ok()
}

stage_abi::export_stage!("rotator", transform);
