//! Text trace reader and writer.
//!
//! The format is line-oriented:
//!
//! ```text
//! # optional comments and blank lines anywhere
//! 20000        suggested heap bytes
//! 2            id count
//! 4            op count
//! 1            weight
//! a 0 512
//! r 0 1024
//! a 1 128
//! f 0
//! ```
//!
//! The four header integers may share lines or sit on separate ones.
//! Text after a `#` is ignored.

use std::io::{BufRead, Write};

use crate::error::TraceError;
use crate::types::{Trace, TraceHeader, TraceOp};

/// Parse a trace from an in-memory string.
pub fn parse_trace(text: &str) -> Result<Trace, TraceError> {
    read_trace(text.as_bytes())
}

/// Read and validate a trace from any buffered source.
///
/// Generic over `R: BufRead` so tests can use `&[u8]` and the driver can
/// use `BufReader<File>`. Every op id is checked against the header id
/// count and the op count must match exactly.
pub fn read_trace<R: BufRead>(reader: R) -> Result<Trace, TraceError> {
    let mut header_vals: Vec<(usize, u64)> = Vec::with_capacity(4);
    let mut header: Option<TraceHeader> = None;
    let mut ops = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let lineno = idx + 1;
        let text = strip_comment(&line).trim();
        if text.is_empty() {
            continue;
        }

        match &header {
            None => {
                for token in text.split_whitespace() {
                    if header_vals.len() == 4 {
                        return Err(parse_err(lineno, format!("unexpected token {token:?}")));
                    }
                    let value = parse_number(lineno, token, "header value")?;
                    header_vals.push((lineno, value));
                }
                if header_vals.len() == 4 {
                    header = Some(build_header(&header_vals)?);
                }
            }
            Some(h) => {
                let op = parse_op(lineno, text)?;
                if op.id() >= h.num_ids {
                    return Err(TraceError::IdOutOfRange {
                        line: lineno,
                        id: op.id(),
                        num_ids: h.num_ids,
                    });
                }
                ops.push(op);
            }
        }
    }

    let header = match header {
        Some(h) => h,
        None => {
            return Err(parse_err(
                header_vals.last().map_or(0, |&(line, _)| line),
                format!("truncated header: {} of 4 values", header_vals.len()),
            ))
        }
    };
    if ops.len() != header.num_ops {
        return Err(TraceError::CountMismatch {
            expected: header.num_ops,
            found: ops.len(),
        });
    }
    Ok(Trace { header, ops })
}

/// Write `trace` in the text format accepted by [`read_trace`].
///
/// Generic over `W: Write` so tests can use `Vec<u8>`.
pub fn write_trace<W: Write>(trace: &Trace, mut writer: W) -> Result<(), TraceError> {
    writeln!(writer, "{}", trace.header)?;
    for op in &trace.ops {
        writeln!(writer, "{op}")?;
    }
    writer.flush()?;
    Ok(())
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn parse_err(line: usize, detail: String) -> TraceError {
    TraceError::Parse { line, detail }
}

fn parse_number(line: usize, token: &str, what: &str) -> Result<u64, TraceError> {
    token
        .parse::<u64>()
        .map_err(|e| parse_err(line, format!("bad {what} {token:?}: {e}")))
}

fn to_usize(line: usize, value: u64, what: &str) -> Result<usize, TraceError> {
    usize::try_from(value).map_err(|_| parse_err(line, format!("{what} {value} too large")))
}

fn build_header(vals: &[(usize, u64)]) -> Result<TraceHeader, TraceError> {
    let [(l0, heap), (l1, ids), (l2, nops), (l3, weight)] = vals else {
        return Err(parse_err(0, "header needs 4 values".to_string()));
    };
    Ok(TraceHeader {
        suggested_heap_bytes: to_usize(*l0, *heap, "heap size")?,
        num_ids: to_usize(*l1, *ids, "id count")?,
        num_ops: to_usize(*l2, *nops, "op count")?,
        weight: u32::try_from(*weight)
            .map_err(|_| parse_err(*l3, format!("weight {weight} too large")))?,
    })
}

fn parse_op(line: usize, text: &str) -> Result<TraceOp, TraceError> {
    let mut tokens = text.split_whitespace();
    let kind = tokens.next().unwrap_or_default();
    let mut field = |what: &str| -> Result<usize, TraceError> {
        let token = tokens
            .next()
            .ok_or_else(|| parse_err(line, format!("missing {what}")))?;
        let value = parse_number(line, token, what)?;
        to_usize(line, value, what)
    };

    let op = match kind {
        "a" => TraceOp::Alloc {
            id: field("id")?,
            size: field("size")?,
        },
        "r" => TraceOp::Realloc {
            id: field("id")?,
            size: field("size")?,
        },
        "f" => TraceOp::Free { id: field("id")? },
        other => return Err(parse_err(line, format!("unknown op {other:?}"))),
    };
    if let Some(extra) = tokens.next() {
        return Err(parse_err(line, format!("trailing token {extra:?}")));
    }
    Ok(op)
}
