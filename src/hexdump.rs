/// Render `data` as `prefix | XX XX ... | ascii` lines of `line_size` bytes.
///
/// A short final line is padded with `__` so the ASCII column stays aligned.
/// Control characters, space and 0xFF print as `.`.
pub fn hex_dump(data: &[u8], line_size: usize, prefix: &str) -> String {
    let line_size = line_size.max(1);
    let mut out = String::new();

    for (i, chunk) in data.chunks(line_size).enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(prefix);
        out.push_str(" | ");
        for byte in chunk {
            out.push_str(&format!("{:02X} ", byte));
        }
        for _ in chunk.len()..line_size {
            out.push_str("__ ");
        }
        out.push_str(" | ");
        out.extend(chunk.iter().map(|&c| {
            if c < 33 || c == 255 {
                '.'
            } else {
                c as char
            }
        }));
    }

    out
}
