use std::collections::VecDeque;
use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use vigia_proto::DetectionRecord;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Print one delivered record in the selected format.
pub fn print_record(record: &DetectionRecord, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", json_line(record)),
        OutputFormat::Table => {
            let mut table = record_table();
            table.add_row(record_row(record));
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", pretty_line(record)),
    }
}

/// Print a batch of records, e.g. the watch exit summary.
pub fn print_records<'a>(
    records: impl IntoIterator<Item = &'a DetectionRecord>,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let all: Vec<&DetectionRecord> = records.into_iter().collect();
            println!(
                "{}",
                serde_json::to_string(&all).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = record_table();
            for record in records {
                table.add_row(record_row(record));
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for record in records {
                println!("{}", pretty_line(record));
            }
        }
    }
}

fn json_line(record: &DetectionRecord) -> String {
    serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
}

fn record_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", "LABEL", "CAMERA", "CONF", "DATE", "TIME"]);
    table
}

fn record_row(record: &DetectionRecord) -> Vec<String> {
    vec![
        record.id.to_string(),
        record.label.clone(),
        record.camera_id.to_string(),
        format!("{:.2}", record.confidence),
        record.date.clone(),
        record.time.clone(),
    ]
}

fn pretty_line(record: &DetectionRecord) -> String {
    format!(
        "#{} {} conf={:.2} cam={} bbox=[{}, {}, {}, {}] {} {}",
        record.id,
        record.label,
        record.confidence,
        record.camera_id,
        record.bounding_box[0],
        record.bounding_box[1],
        record.bounding_box[2],
        record.bounding_box[3],
        record.date,
        record.time
    )
}

/// Bounded log of delivered records, newest first.
///
/// Backs the watch summary the way operator consoles keep a rolling table:
/// new rows go on top, the oldest fall off once capacity is reached.
#[derive(Debug)]
pub struct RecordLog {
    records: VecDeque<DetectionRecord>,
    capacity: usize,
}

impl RecordLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::new(),
            capacity,
        }
    }

    pub fn push(&mut self, record: DetectionRecord) {
        self.records.push_front(record);
        while self.records.len() > self.capacity {
            self.records.pop_back();
        }
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &DetectionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
