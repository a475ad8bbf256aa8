//! Single-row CSV export of an instance record

use std::fmt::Write;

use api_types::InstanceMetricRecord;

pub const CSV_HEADER: &str =
    "Timestamp,CPU Usage (%),Memory Usage (%),Network RX (MB),Network TX (MB)";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub fn export_filename(instance_id: &str) -> String {
    format!("metrics_export_{instance_id}.csv")
}

/// Header plus one row. Absent CPU or memory sections leave the cell empty;
/// an absent network section counts as no traffic.
pub fn render_csv(record: &InstanceMetricRecord) -> String {
    let cpu = record
        .cpu
        .as_ref()
        .map(|cpu| format!("{:.2}", cpu.total_usage))
        .unwrap_or_default();
    let memory = record
        .memory
        .as_ref()
        .map(|memory| format!("{:.2}", memory.memory_usage_percent))
        .unwrap_or_default();
    let (rx_bytes, tx_bytes) = record
        .network
        .iter()
        .flatten()
        .fold((0u64, 0u64), |(rx, tx), iface| {
            (rx.saturating_add(iface.rx_bytes), tx.saturating_add(iface.tx_bytes))
        });

    let mut csv = String::with_capacity(CSV_HEADER.len() + 64);
    csv.push_str(CSV_HEADER);
    csv.push('\n');
    // Writing to a String cannot fail
    let _ = writeln!(
        csv,
        "{},{cpu},{memory},{:.2},{:.2}",
        record.timestamp.to_rfc3339(),
        rx_bytes as f64 / BYTES_PER_MB,
        tx_bytes as f64 / BYTES_PER_MB,
    );
    csv
}
