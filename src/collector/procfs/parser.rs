//! Pure parsers for per-process `/proc` files.
//!
//! These are pure functions over file contents, designed to be testable with
//! string inputs. File access, path formatting and the warn/parse error
//! split live one layer up in [`super::process`].

use std::collections::HashMap;

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Intermediate per-task stats parsed from one `stat` line.
///
/// Produced for both process-level (`/proc/[pid]/stat`) and thread-level
/// (`/proc/[pid]/task/[tid]/stat`) files. Tick-based fields are already
/// scaled to milliseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PidStat {
    /// Executable name without the surrounding brackets.
    pub comm: String,
    /// Single-character task state; `D` is uninterruptible I/O wait.
    pub state: char,
    /// Major page faults.
    pub major_faults: u64,
    /// User plus system CPU time in milliseconds.
    pub cpu_time_ms: u64,
    /// Start time in milliseconds since boot.
    pub start_time_ms: u64,
}

/// Returns the single content line of a file that must have exactly one,
/// tolerating one trailing empty line after a final newline.
pub fn single_line(content: &str) -> Result<&str, ParseError> {
    let lines: Vec<&str> = content.split('\n').collect();
    if lines.len() != 1 && (lines.len() != 2 || !lines[1].is_empty()) {
        return Err(ParseError::new(format!(
            "contains {} lines != 1",
            lines.len()
        )));
    }
    Ok(lines[0])
}

/// Parses one `/proc/[pid]/stat` or `/proc/[pid]/task/[tid]/stat` line.
///
/// The comm field is enclosed in `( )` brackets and may itself contain
/// spaces or brackets, so the line is split on single spaces and fields are
/// re-joined until one ends with `)`. All numeric offsets after the comm are
/// biased by the number of extra fields the comm consumed.
///
/// `utime`, `stime` and `starttime` are accepted as signed values but
/// clamped to zero before scaling by `millis_per_clock_tick`.
pub fn parse_pid_stat_line(line: &str, millis_per_clock_tick: u64) -> Result<PidStat, ParseError> {
    let fields: Vec<&str> = line.split(' ').collect();

    let mut comm = String::new();
    let mut comm_end_offset = None;
    for (i, field) in fields.iter().enumerate().skip(1) {
        comm.push_str(field);
        if field.ends_with(')') {
            comm_end_offset = Some(i - 1);
            break;
        }
        comm.push(' ');
    }
    let Some(offset) = comm_end_offset else {
        return Err(ParseError::new(format!(
            "comm string `{comm}` not enclosed in brackets"
        )));
    };
    if !comm.starts_with('(') || !comm.ends_with(')') {
        return Err(ParseError::new(format!(
            "comm string `{comm}` not enclosed in brackets"
        )));
    }
    let comm = comm[1..comm.len() - 1].to_string();

    if fields.len() < 22 + offset {
        return Err(ParseError::new(format!(
            "expected at least {} fields, got {}",
            22 + offset,
            fields.len()
        )));
    }

    let parse_u64 = |idx: usize, name: &str| -> Result<u64, ParseError> {
        fields[idx]
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {name} `{}`", fields[idx])))
    };
    let parse_i64 = |idx: usize, name: &str| -> Result<i64, ParseError> {
        fields[idx]
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {name} `{}`", fields[idx])))
    };

    let major_faults = parse_u64(11 + offset, "major faults")?;
    let utime = parse_i64(13 + offset, "utime")?;
    let stime = parse_i64(14 + offset, "stime")?;
    let start_ticks = parse_i64(21 + offset, "starttime")?;

    let cpu_ticks = u64::try_from(utime.saturating_add(stime)).unwrap_or(0);
    let start_ticks = u64::try_from(start_ticks).unwrap_or(0);

    Ok(PidStat {
        comm,
        state: fields[2 + offset].chars().next().unwrap_or('?'),
        major_faults,
        cpu_time_ms: cpu_ticks.saturating_mul(millis_per_clock_tick),
        start_time_ms: start_ticks.saturating_mul(millis_per_clock_tick),
    })
}

/// Returns the lines of `buffer` that contain a not-yet-seen tag as a
/// substring. Scanning stops as soon as every tag has been seen once.
fn lines_with_tags<'a>(buffer: &'a str, tags: &[&str]) -> Vec<&'a str> {
    let mut not_found: Vec<&str> = tags.to_vec();
    let mut result = Vec::new();
    for line in buffer.split('\n') {
        if not_found.is_empty() {
            break;
        }
        let before = not_found.len();
        not_found.retain(|tag| !line.contains(tag));
        if not_found.len() != before {
            result.push(line);
        }
    }
    result
}

/// Parses a key/value file (e.g. `/proc/[pid]/status`), keeping only lines
/// that match one of `tags`.
///
/// Each retained line is split at the first occurrence of `delimiter`; the
/// value is the trimmed remainder. Duplicate keys and lines without the
/// delimiter are parse errors.
pub fn parse_key_value(
    content: &str,
    delimiter: &str,
    tags: &[&str],
) -> Result<HashMap<String, String>, ParseError> {
    let mut contents = HashMap::new();
    for line in lines_with_tags(content, tags) {
        if line.is_empty() {
            continue;
        }
        let Some((key, _)) = line.split_once(delimiter) else {
            return Err(ParseError::new(format!(
                "line {line:?} does not contain the delimiter {delimiter:?}"
            )));
        };
        let value = line[key.len() + delimiter.len()..].trim().to_string();
        if contents.insert(key.to_string(), value).is_some() {
            return Err(ParseError::new(format!("duplicate {key} line: {line:?}")));
        }
    }
    Ok(contents)
}

/// Parses the owning UID and thread-group id from `/proc/[pid]/status`
/// contents.
///
/// The `Uid` value carries four tab-separated ids (real, effective,
/// saved-set, filesystem); the real UID is taken.
pub fn parse_pid_status(content: &str) -> Result<(u32, u32), ParseError> {
    let contents = parse_key_value(content, ":\t", &["Uid", "Tgid"])?;
    if contents.is_empty() {
        return Err(ParseError::new("empty status contents"));
    }
    let uid = contents
        .get("Uid")
        .and_then(|value| value.split('\t').next())
        .and_then(|value| value.parse::<u32>().ok())
        .ok_or_else(|| ParseError::new("failed to read `Uid`"))?;
    let tgid = contents
        .get("Tgid")
        .and_then(|value| value.parse::<u32>().ok())
        .ok_or_else(|| ParseError::new("failed to read `Tgid`"))?;
    Ok((uid, tgid))
}

/// Parses a per-thread `time_in_state` frequency histogram into a total CPU
/// cycle estimate.
///
/// The file alternates `cpuX` policy headers with `<freq_khz> <ticks>`
/// lines. Frequency is in kHz and time in clock ticks, so the accumulated
/// `freq * ticks` sum is scaled by `cycles_per_khz_clock_tick`
/// (`1000 / clock ticks per second`) to obtain cycles. All arithmetic
/// saturates at `u64::MAX`.
pub fn parse_time_in_state(
    content: &str,
    cycles_per_khz_clock_tick: u64,
) -> Result<u64, ParseError> {
    let mut one_tenth_cycles: u64 = 0;
    for line in content.split('\n') {
        if line.is_empty() || line.starts_with("cpu") {
            continue;
        }
        let elements: Vec<&str> = line.split(' ').collect();
        if elements.len() < 2 {
            return Err(ParseError::new(format!(
                "line {line:?} does not contain the delimiter \" \""
            )));
        }
        let freq_khz: u64 = elements[0]
            .parse()
            .map_err(|_| ParseError::new(format!("line {line:?} has an invalid frequency")))?;
        let ticks: u64 = elements[1]
            .trim()
            .parse()
            .map_err(|_| ParseError::new(format!("line {line:?} has an invalid tick count")))?;
        one_tenth_cycles = one_tenth_cycles.saturating_add(freq_khz.saturating_mul(ticks));
    }
    Ok(one_tenth_cycles.saturating_mul(cycles_per_khz_clock_tick))
}

/// Parses resident and shared page counts from `/proc/[pid]/statm`.
///
/// The file holds a single line of page counts:
/// `<size> <resident> <shared> <text> 0 <data> 0`.
pub fn parse_statm(content: &str) -> Result<(u64, u64), ParseError> {
    let line = single_line(content)?;
    let fields: Vec<&str> = line.split(' ').collect();
    if fields.len() < 6 {
        return Err(ParseError::new("insufficient entries"));
    }
    let rss_pages: u64 = fields[1]
        .parse()
        .map_err(|_| ParseError::new(format!("invalid resident pages `{}`", fields[1])))?;
    let shared_pages: u64 = fields[2]
        .parse()
        .map_err(|_| ParseError::new(format!("invalid shared pages `{}`", fields[2])))?;
    Ok((rss_pages, shared_pages))
}
