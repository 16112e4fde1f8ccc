//! Logger stage (spec §6): prints every record (including the sentinel, for
//! its side effect — see `DESIGN.md`) to stdout as `"[logger] {record}"`,
//! then passes it through unchanged. Grounded on
//! `original_source/plugins/logger.c`.

use std::io::Write;

fn transform(input: &str) -> Option<String> {
    let mut stdout = std::io::stdout();
    let _ = writeln!(stdout, "[logger] {input}");
    let _ = stdout.flush();
    Some(input.to_string())
}

stage_abi::export_stage!("logger", transform);
