// Primitives for writing and reading back the CSV export.

use std::io;

use chrono::NaiveDateTime;
use log::debug;
use snafu::{prelude::*, Snafu};

use crate::config::*;

/// The columns of the export, in order. The store id is not part of it.
pub const EXPORT_COLUMNS: [&str; 11] = [
    "name",
    "organization",
    "org_size",
    "org_type",
    "location",
    "q1",
    "q2",
    "q3",
    "q4",
    "q5",
    "submitted_at",
];

/// Same layout as the CURRENT_TIMESTAMP default of the table. Fractional seconds
/// are only written when the time has some, and read back when present.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

#[derive(Debug, Snafu)]
pub enum ExportError {
    #[snafu(display("Failed to write CSV record"))]
    WritingCsv { source: csv::Error },
    #[snafu(display("Failed to flush the CSV output"))]
    FlushingCsv { source: io::Error },
    #[snafu(display("Failed to read CSV record"))]
    ReadingCsv { source: csv::Error },
    #[snafu(display("Unexpected CSV header {found:?}"))]
    UnexpectedHeader { found: Vec<String> },
    #[snafu(display("Line {lineno}: cannot read timestamp {value:?}"))]
    InvalidTimestamp {
        lineno: usize,
        value: String,
        source: chrono::ParseError,
    },
}

/// One line of an export.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ExportedResponse {
    pub name: String,
    pub organization: String,
    pub org_size: String,
    pub org_type: String,
    pub location: String,
    pub answers: Answers,
    pub submitted_at: NaiveDateTime,
}

impl From<&RespondentAnswer> for ExportedResponse {
    fn from(r: &RespondentAnswer) -> Self {
        ExportedResponse {
            name: r.name.clone(),
            organization: r.organization.clone(),
            org_size: r.org_size.clone(),
            org_type: r.org_type.clone(),
            location: r.location.clone(),
            answers: r.answers.clone(),
            submitted_at: r.submitted_at,
        }
    }
}

/// Writes the header and one line per response. Multi-select answers stay in
/// their `||` joined form; missing answers are empty cells.
pub fn write_table<W: io::Write>(rows: &[RespondentAnswer], out: W) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(EXPORT_COLUMNS).context(WritingCsvSnafu {})?;
    for r in rows {
        let answers: Vec<String> = QuestionId::ALL
            .iter()
            .map(|qid| r.answers.encoded(*qid).unwrap_or_default())
            .collect();
        let submitted_at = r.submitted_at.format(TIMESTAMP_FORMAT).to_string();
        let mut record: Vec<&str> = vec![
            r.name.as_str(),
            r.organization.as_str(),
            r.org_size.as_str(),
            r.org_type.as_str(),
            r.location.as_str(),
        ];
        record.extend(answers.iter().map(|s| s.as_str()));
        record.push(submitted_at.as_str());
        wtr.write_record(&record).context(WritingCsvSnafu {})?;
    }
    wtr.flush().context(FlushingCsvSnafu {})?;
    debug!("write_table: wrote {} rows", rows.len());
    Ok(())
}

/// The export as a byte buffer, ready to be offered as a download.
pub fn to_exportable_table(rows: &[RespondentAnswer]) -> Result<Vec<u8>, ExportError> {
    let mut buf: Vec<u8> = Vec::new();
    write_table(rows, &mut buf)?;
    Ok(buf)
}

/// Parses an export produced by [`write_table`].
pub fn read_table<R: io::Read>(input: R) -> Result<Vec<ExportedResponse>, ExportError> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(input);
    let header: Vec<String> = rdr
        .headers()
        .context(ReadingCsvSnafu {})?
        .iter()
        .map(|s| s.to_string())
        .collect();
    ensure!(
        header == EXPORT_COLUMNS,
        UnexpectedHeaderSnafu { found: header }
    );

    let mut res: Vec<ExportedResponse> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(ReadingCsvSnafu {})?;
        let cell = |i: usize| line.get(i).unwrap_or_default();
        let ts = cell(10);
        let submitted_at = NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT)
            .context(InvalidTimestampSnafu { lineno, value: ts })?;
        res.push(ExportedResponse {
            name: cell(0).to_string(),
            organization: cell(1).to_string(),
            org_size: cell(2).to_string(),
            org_type: cell(3).to_string(),
            location: cell(4).to_string(),
            answers: Answers::decode([
                Some(cell(5)),
                Some(cell(6)),
                Some(cell(7)),
                Some(cell(8)),
                Some(cell(9)),
            ]),
            submitted_at,
        });
    }
    debug!("read_table: read {} rows", res.len());
    Ok(res)
}
