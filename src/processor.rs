use crate::error::{Result, SearchError};
use crate::search::pattern::ContentMatcher;
use crate::search::{CancellationToken, LineMatch};
use log::debug;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read};
use std::path::Path;

/// Size of the prefix inspected by the binary heuristic.
pub const BINARY_CHECK_SIZE: usize = 8 * 1024;
const CANCEL_CHECK_LINES: usize = 1024;

/// Text encodings understood by the content scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileEncoding {
    #[default]
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
}

impl FileEncoding {
    pub fn from_label(label: &str) -> Result<Self> {
        let key: String = label
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "utf8" => Ok(FileEncoding::Utf8),
            "utf8bom" => Ok(FileEncoding::Utf8Bom),
            "utf16le" => Ok(FileEncoding::Utf16Le),
            "utf16be" => Ok(FileEncoding::Utf16Be),
            _ => Err(SearchError::invalid(format!("unsupported file encoding '{label}'"))),
        }
    }

    /// Encoding announced by a byte order mark, if any.
    pub fn detect(prefix: &[u8]) -> Option<Self> {
        if prefix.starts_with(&[0xEF, 0xBB, 0xBF]) {
            Some(FileEncoding::Utf8Bom)
        } else if prefix.starts_with(&[0xFF, 0xFE]) {
            Some(FileEncoding::Utf16Le)
        } else if prefix.starts_with(&[0xFE, 0xFF]) {
            Some(FileEncoding::Utf16Be)
        } else {
            None
        }
    }

    fn is_utf8(self) -> bool {
        matches!(self, FileEncoding::Utf8 | FileEncoding::Utf8Bom)
    }
}

/// Outcome of scanning one file's content.
#[derive(Debug)]
pub enum ScanOutcome {
    Binary,
    Lines(Vec<LineMatch>),
}

/// NUL/control-byte heuristic over a bounded prefix.
pub fn looks_binary(prefix: &[u8]) -> bool {
    if prefix.is_empty() {
        return false;
    }
    if FileEncoding::detect(prefix).is_some_and(|e| !e.is_utf8()) {
        return false;
    }
    if memchr::memchr(0, prefix).is_some() {
        return true;
    }
    let control = prefix
        .iter()
        .filter(|&&b| (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0c | 0x1b)) || b == 0x7f)
        .count();
    (control as f64 / prefix.len() as f64) > 0.3
}

fn read_prefix(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Scans `path` for `matcher`. The file handle is dropped on every return path.
pub fn scan_file(
    path: &Path,
    matcher: &ContentMatcher,
    encoding: FileEncoding,
    token: &CancellationToken,
) -> Result<ScanOutcome> {
    let mut file = File::open(path)?;
    let mut prefix = vec![0u8; BINARY_CHECK_SIZE];
    let n = read_prefix(&mut file, &mut prefix)?;
    prefix.truncate(n);

    let encoding = FileEncoding::detect(&prefix).unwrap_or(encoding);
    if encoding.is_utf8() && looks_binary(&prefix) {
        debug!("Skipping binary file: {}", path.display());
        return Ok(ScanOutcome::Binary);
    }

    let reader = Cursor::new(prefix).chain(file);
    let lines = if encoding.is_utf8() && !matcher.is_multiline() {
        scan_utf8_lines(reader, matcher, token)?
    } else {
        let text = decode_all(reader, encoding)?;
        scan_text(&text, matcher, token)
    };
    Ok(ScanOutcome::Lines(lines))
}

fn scan_utf8_lines<R: Read>(
    reader: R,
    matcher: &ContentMatcher,
    token: &CancellationToken,
) -> io::Result<Vec<LineMatch>> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut matches = Vec::new();
    let mut line_no = 0usize;

    loop {
        if line_no % CANCEL_CHECK_LINES == 0 && token.is_cancelled() {
            return Ok(Vec::new());
        }
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;

        let mut bytes = buf.as_slice();
        if line_no == 1 {
            bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
        }
        let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        let line = String::from_utf8_lossy(bytes);

        let ranges = matcher.find_ranges(&line);
        if !ranges.is_empty() {
            matches.push(LineMatch {
                line_number: line_no,
                preview: line.into_owned(),
                match_ranges: ranges,
            });
        }
    }
    Ok(matches)
}

fn decode_all<R: Read>(mut reader: R, encoding: FileEncoding) -> io::Result<String> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let text = match encoding {
        FileEncoding::Utf8 | FileEncoding::Utf8Bom => {
            let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
            String::from_utf8_lossy(body).into_owned()
        }
        FileEncoding::Utf16Le | FileEncoding::Utf16Be => {
            let bom: &[u8] = if encoding == FileEncoding::Utf16Le {
                &[0xFF, 0xFE]
            } else {
                &[0xFE, 0xFF]
            };
            let body = bytes.strip_prefix(bom).unwrap_or(&bytes);
            let units = body.chunks_exact(2).map(|pair| {
                if encoding == FileEncoding::Utf16Le {
                    u16::from_le_bytes([pair[0], pair[1]])
                } else {
                    u16::from_be_bytes([pair[0], pair[1]])
                }
            });
            char::decode_utf16(units)
                .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        }
    };
    Ok(text)
}

/// Line matches over already decoded text. Multiline patterns run over the
/// whole text and are reported on the line where each match starts.
pub fn scan_text(text: &str, matcher: &ContentMatcher, token: &CancellationToken) -> Vec<LineMatch> {
    if !matcher.is_multiline() {
        let mut out = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if idx % CANCEL_CHECK_LINES == 0 && token.is_cancelled() {
                return Vec::new();
            }
            let ranges = matcher.find_ranges(line);
            if !ranges.is_empty() {
                out.push(LineMatch {
                    line_number: idx + 1,
                    preview: line.to_string(),
                    match_ranges: ranges,
                });
            }
        }
        return out;
    }

    let mut starts = vec![0usize];
    starts.extend(memchr::memchr_iter(b'\n', text.as_bytes()).map(|i| i + 1));

    let line_at = |offset: usize| starts.partition_point(|&s| s <= offset) - 1;
    let line_text = |idx: usize| {
        let begin = starts[idx];
        let end = starts.get(idx + 1).map_or(text.len(), |&next| next - 1);
        text[begin..end].strip_suffix('\r').unwrap_or(&text[begin..end])
    };

    let mut out: Vec<LineMatch> = Vec::new();
    for m in matcher.regex().find_iter(text) {
        if m.start() == m.end() {
            continue;
        }
        if token.is_cancelled() {
            return Vec::new();
        }
        let idx = line_at(m.start());
        let line = line_text(idx);
        let line_chars = line.chars().count();
        let start_col = text[starts[idx]..m.start()].chars().count().min(line_chars);
        let end_col = (start_col + m.as_str().chars().count()).min(line_chars);

        match out.last_mut() {
            Some(last) if last.line_number == idx + 1 => last.match_ranges.push((start_col, end_col)),
            _ => out.push(LineMatch {
                line_number: idx + 1,
                preview: line.to_string(),
                match_ranges: vec![(start_col, end_col)],
            }),
        }
    }
    out
}
