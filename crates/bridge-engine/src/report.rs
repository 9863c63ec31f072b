//! Correlation output: the fixed 12-column record layout plus table and CSV
//! rendering. Invalid records ride along as half-filled rows with a trailing
//! reason, so unlinked outcomes are part of the exported report rather than
//! log-only.

use alloy::primitives::U256;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;

/// Column order of every export surface. Consumers key on these names, so
/// the order is part of the output contract. Rendered reports append one
/// extra `reason` column, empty for correlated rows.
pub const REPORT_COLUMNS: [&str; 12] = [
    "srcHash",
    "srcSender",
    "srcReceiver",
    "srcTokenAddr",
    "srcChainId",
    "srcValue",
    "destChainId",
    "destReceiver",
    "destHash",
    "destSender",
    "destTokenAddr",
    "destValue",
];

fn header() -> Vec<&'static str> {
    let mut columns: Vec<&'static str> = REPORT_COLUMNS.to_vec();
    columns.push("reason");
    columns
}

/// One correlated source/destination pair.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationRecord {
    pub src_hash: String,
    pub src_sender: String,
    pub src_receiver: String,
    pub src_token: String,
    pub src_chain_id: u64,
    pub src_value: U256,
    pub dest_chain_id: u64,
    pub dest_receiver: String,
    pub dest_hash: String,
    pub dest_sender: String,
    pub dest_token: String,
    pub dest_value: U256,
}

impl CorrelationRecord {
    fn row(&self) -> [String; 13] {
        [
            self.src_hash.clone(),
            self.src_sender.clone(),
            self.src_receiver.clone(),
            self.src_token.clone(),
            self.src_chain_id.to_string(),
            self.src_value.to_string(),
            self.dest_chain_id.to_string(),
            self.dest_receiver.clone(),
            self.dest_hash.clone(),
            self.dest_sender.clone(),
            self.dest_token.clone(),
            self.dest_value.to_string(),
            String::new(),
        ]
    }
}

/// A transaction that failed validation, with the reason it failed.
#[derive(Clone, Debug, PartialEq)]
pub struct InvalidRecord {
    pub hash: String,
    pub chain_id: u64,
    pub reason: String,
}

impl InvalidRecord {
    fn row(&self) -> [String; 13] {
        let mut row: [String; 13] = Default::default();
        row[0] = self.hash.clone();
        row[4] = self.chain_id.to_string();
        row[12] = self.reason.clone();
        row
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Table,
    Csv,
}

impl ExportFormat {
    pub fn render(self, correlated: &[CorrelationRecord], invalid: &[InvalidRecord]) -> String {
        match self {
            ExportFormat::Table => render_table(correlated, invalid),
            ExportFormat::Csv => render_csv(correlated, invalid),
        }
    }
}

fn rows<'a>(
    correlated: &'a [CorrelationRecord],
    invalid: &'a [InvalidRecord],
) -> impl Iterator<Item = [String; 13]> + 'a {
    correlated
        .iter()
        .map(CorrelationRecord::row)
        .chain(invalid.iter().map(InvalidRecord::row))
}

fn render_table(correlated: &[CorrelationRecord], invalid: &[InvalidRecord]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(header());
    for row in rows(correlated, invalid) {
        table.add_row(row);
    }
    table.to_string()
}

fn render_csv(correlated: &[CorrelationRecord], invalid: &[InvalidRecord]) -> String {
    let mut out = header().join(",");
    out.push('\n');
    for row in rows(correlated, invalid) {
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}
