//! Typewriter stage (spec §6): prints `"[typewriter] "` then each byte of the
//! record with a 100ms delay between bytes, then a newline, passing the
//! record through unchanged. Grounded on
//! `original_source/plugins/typewriter.c`'s `usleep(100000)` loop.

use std::io::Write;
use std::time::Duration;

const INTER_CHAR_DELAY: Duration = Duration::from_millis(100);

fn transform(input: &str) -> Option<String> {
    let mut stdout = std::io::stdout();
    let _ = write!(stdout, "[typewriter] ");
    let _ = stdout.flush();
    for byte in input.as_bytes() {
        let _ = stdout.write_all(&[*byte]);
        let _ = stdout.flush();
        std::thread::sleep(INTER_CHAR_DELAY);
    }
    let _ = writeln!(stdout);
    let _ = stdout.flush();
    Some(input.to_string())
}

stage_abi::export_stage!("typewriter", transform);
