use crate::record::{FieldValue, LogField, Record};
use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use time::macros::format_description;
use time::OffsetDateTime;
use walkdir::WalkDir;

lazy_static! {
    static ref ACCESS_LINE: Regex = Regex::new(
        r#"^(?P<ip_address>\S+) \S+ \S+ \[(?P<timestamp>[^\]]+)\] "(?P<method>\S+) (?P<url>\S+) (?P<http_protocol>[^"]+)" (?P<status>\d{3}) (?P<size>\d+|-) "(?P<referer>[^"]*)" "(?P<user_agent>[^"]*)""#
    )
    .expect("valid regex");
}

/// Anything that can hand the engine an ordered batch of records.
pub trait RecordSource {
    fn read_records(&mut self) -> Result<Vec<Record>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub lines: usize,
    pub parsed: usize,
    pub skipped: usize,
}

impl ParseStats {
    pub fn merge(&mut self, other: ParseStats) {
        self.lines += other.lines;
        self.parsed += other.parsed;
        self.skipped += other.skipped;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputFormat {
    /// nginx "combined" access log lines.
    #[default]
    Access,
    /// One JSON object per line.
    Jsonl,
}

impl InputFormat {
    fn extension(self) -> &'static str {
        match self {
            InputFormat::Access => "log",
            InputFormat::Jsonl => "jsonl",
        }
    }
}

impl FromStr for InputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "access" | "nginx" => Ok(InputFormat::Access),
            "jsonl" => Ok(InputFormat::Jsonl),
            other => Err(format!("unknown input format: {other} (expected access or jsonl)")),
        }
    }
}

/// Parse an access-log timestamp such as `10/Oct/2023:13:55:36 -0700`.
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let fmt = format_description!(
        "[day]/[month repr:short]/[year]:[hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute]"
    );
    OffsetDateTime::parse(raw, &fmt).ok()
}

/// Parse one access-log line; `None` for lines that do not match the format.
pub fn parse_access_line(line: &str) -> Option<Record> {
    let caps = ACCESS_LINE.captures(line)?;
    let timestamp = parse_timestamp(&caps["timestamp"])?;
    let status: i64 = caps["status"].parse().ok()?;
    let size = match &caps["size"] {
        "-" => FieldValue::Null,
        s => FieldValue::Integer(s.parse().ok()?),
    };
    let record = Record::new()
        .with(LogField::IpAddress.as_str(), &caps["ip_address"])
        .with(LogField::Timestamp.as_str(), timestamp)
        .with(LogField::Method.as_str(), &caps["method"])
        .with(LogField::Url.as_str(), &caps["url"])
        .with(LogField::HttpProtocol.as_str(), &caps["http_protocol"])
        .with(LogField::Status.as_str(), status)
        .with(LogField::Size.as_str(), size)
        .with(LogField::Referer.as_str(), &caps["referer"])
        .with(LogField::UserAgent.as_str(), &caps["user_agent"]);
    Some(record)
}

/// Read the next non-blank line into `buf`, counting it in `stats`. Lines
/// that are not valid UTF-8 are counted as skipped and passed over.
fn next_line<'a, R: BufRead>(reader: &mut R, buf: &'a mut Vec<u8>, stats: &mut ParseStats) -> Result<Option<&'a str>> {
    loop {
        buf.clear();
        if reader.read_until(b'\n', buf)? == 0 { return Ok(None); }
        let blank = buf.iter().all(|b| b.is_ascii_whitespace());
        if blank { continue; }
        stats.lines += 1;
        if std::str::from_utf8(buf).is_err() {
            stats.skipped += 1;
            tracing::debug!(line = stats.lines, "skipping line that is not valid UTF-8");
            continue;
        }
        break;
    }
    let line = std::str::from_utf8(buf)?;
    Ok(Some(line.trim_end_matches(['\r', '\n'])))
}

/// Reads nginx access-log lines, skipping any that do not parse.
pub struct AccessLogSource<R> {
    reader: R,
    stats: ParseStats,
}

impl AccessLogSource<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Ok(Self::new(BufReader::new(f)))
    }
}

impl<R: BufRead> AccessLogSource<R> {
    pub fn new(reader: R) -> Self { Self { reader, stats: ParseStats::default() } }
    pub fn stats(&self) -> ParseStats { self.stats }
}

impl<R: BufRead> RecordSource for AccessLogSource<R> {
    fn read_records(&mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        let mut buf = Vec::new();
        while let Some(line) = next_line(&mut self.reader, &mut buf, &mut self.stats)? {
            match parse_access_line(line) {
                Some(r) => {
                    self.stats.parsed += 1;
                    records.push(r);
                }
                None => {
                    self.stats.skipped += 1;
                    tracing::debug!(line = self.stats.lines, "skipping malformed access-log line");
                }
            }
        }
        Ok(records)
    }
}

/// Reads one JSON object per line; scalar values keep their type, nested
/// values are kept as JSON text.
pub struct JsonlSource<R> {
    reader: R,
    stats: ParseStats,
}

impl JsonlSource<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Ok(Self::new(BufReader::new(f)))
    }
}

impl<R: BufRead> JsonlSource<R> {
    pub fn new(reader: R) -> Self { Self { reader, stats: ParseStats::default() } }
    pub fn stats(&self) -> ParseStats { self.stats }
}

fn json_field(value: serde_json::Value) -> FieldValue {
    use serde_json::Value;
    match value {
        Value::Null => FieldValue::Null,
        Value::Bool(b) => FieldValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => FieldValue::Integer(i),
            None => n.as_f64().map(FieldValue::Float).unwrap_or_else(|| FieldValue::Text(n.to_string())),
        },
        Value::String(s) => FieldValue::Text(s),
        other => FieldValue::Text(other.to_string()),
    }
}

impl<R: BufRead> RecordSource for JsonlSource<R> {
    fn read_records(&mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        let mut buf = Vec::new();
        while let Some(line) = next_line(&mut self.reader, &mut buf, &mut self.stats)? {
            match serde_json::from_str::<serde_json::Value>(line) {
                Ok(serde_json::Value::Object(map)) => {
                    let mut record = Record::new();
                    for (k, v) in map {
                        record.insert(k, json_field(v));
                    }
                    self.stats.parsed += 1;
                    records.push(record);
                }
                Ok(_) | Err(_) => {
                    self.stats.skipped += 1;
                    tracing::debug!(line = self.stats.lines, "skipping non-object jsonl line");
                }
            }
        }
        Ok(records)
    }
}

/// Load records from a file, or from every matching file under a directory
/// in path order. Symlinks are followed; entries that cannot be read are
/// logged and skipped.
pub fn load_path(path: &Path, format: InputFormat) -> Result<(Vec<Record>, ParseStats)> {
    let mut files: Vec<PathBuf> = Vec::new();
    if path.is_dir() {
        for entry in WalkDir::new(path).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable directory entry");
                    continue;
                }
            };
            let p = entry.path();
            if p.is_file() && p.extension().and_then(|s| s.to_str()) == Some(format.extension()) {
                files.push(p.to_path_buf());
            }
        }
    } else if path.is_file() {
        files.push(path.to_path_buf());
    } else {
        anyhow::bail!("input path {} does not exist", path.display());
    }

    let mut records = Vec::new();
    let mut stats = ParseStats::default();
    for file in files {
        let (batch, file_stats) = match format {
            InputFormat::Access => {
                let mut src = AccessLogSource::open(&file)?;
                (src.read_records()?, src.stats())
            }
            InputFormat::Jsonl => {
                let mut src = JsonlSource::open(&file)?;
                (src.read_records()?, src.stats())
            }
        };
        if file_stats.skipped > 0 {
            tracing::warn!(file = %file.display(), skipped = file_stats.skipped, "skipped unparseable lines");
        }
        records.extend(batch);
        stats.merge(file_stats);
    }
    tracing::info!(path = %path.display(), records = records.len(), skipped = stats.skipped, "records loaded");
    Ok((records, stats))
}
