//! CSV rendering of analysis records

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::curation::MatchedRecord;

pub const CSV_HEADER: [&str; 9] = [
    "Timestamp",
    "Curator",
    "Author",
    "Permlink",
    "Reward SP",
    "Vote Weight %",
    "Vote Value STEEM",
    "Voted After Minutes",
    "Efficiency %",
];

/// Quote a field when it holds a delimiter, quote or line break
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn decimal_field(value: Option<Decimal>, dp: u32) -> String {
    value.map(|v| v.round_dp(dp).normalize().to_string()).unwrap_or_default()
}

fn write_row(out: &mut String, fields: &[String]) {
    let line: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
    out.push_str(&line.join(","));
    out.push_str("\r\n");
}

/// Render records as CSV, header first. Missing enrichment becomes an empty cell.
pub fn records_to_csv(records: &[MatchedRecord]) -> String {
    let mut out = String::new();
    write_row(&mut out, &CSV_HEADER.map(String::from));

    for record in records {
        let efficiency = record
            .vote_value_steem
            .filter(|_| record.reward_sp.is_some())
            .map(|_| record.efficiency());

        write_row(
            &mut out,
            &[
                record.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
                record.curator.clone(),
                record.comment_author.clone(),
                record.comment_permlink.clone(),
                decimal_field(record.reward_sp, 6),
                decimal_field(record.vote_weight_percent(), 2),
                decimal_field(record.vote_value_steem, 4),
                record
                    .voted_after_minutes
                    .map(|m| format!("{:.1}", m))
                    .unwrap_or_default(),
                decimal_field(efficiency, 2),
            ],
        );
    }

    out
}

/// Attachment name, e.g. `curator_alice_2024-03-20.csv`
pub fn csv_filename(account: &str, date: NaiveDate) -> String {
    format!("curator_{}_{}.csv", account, date.format("%Y-%m-%d"))
}
