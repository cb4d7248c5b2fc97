//! Inspect command implementation.

use serde::Serialize;
use shelfdb_storage::{FileStore, RecordStore};
use std::path::Path;

/// Data directory inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Root path.
    pub path: String,
    /// Number of record files across all partitions.
    pub record_count: usize,
    /// Total size in bytes.
    pub total_size: u64,
    /// Per-partition statistics.
    pub partitions: Vec<PartitionStats>,
}

/// Statistics for a single partition.
#[derive(Debug, Serialize)]
pub struct PartitionStats {
    /// Partition name.
    pub name: String,
    /// Number of files.
    pub record_count: usize,
    /// Number of empty files.
    pub empty_files: usize,
    /// Total data size in bytes.
    pub data_size: u64,
    /// File names (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<String>>,
}

/// Collects statistics for the data directory at `path`.
pub fn collect(path: &Path, list_records: bool) -> Result<InspectResult, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No database found at {path:?}").into());
    }
    let store = FileStore::open(path)?;

    let mut result = InspectResult {
        path: path.display().to_string(),
        record_count: 0,
        total_size: 0,
        partitions: Vec::new(),
    };

    for name in store.partitions()? {
        let files = store.read_partition(&name)?;
        let data_size: u64 = files.iter().map(|f| f.bytes.len() as u64).sum();
        let stats = PartitionStats {
            record_count: files.len(),
            empty_files: files.iter().filter(|f| f.bytes.is_empty()).count(),
            data_size,
            records: list_records.then(|| {
                files
                    .iter()
                    .filter_map(|f| f.location.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .collect()
            }),
            name,
        };
        result.record_count += stats.record_count;
        result.total_size += stats.data_size;
        result.partitions.push(stats);
    }

    tracing::debug!(partitions = result.partitions.len(), "inspected data directory");
    Ok(result)
}

/// Runs the inspect command.
pub fn run(path: &Path, list_records: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = collect(path, list_records)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("shelfdb data directory: {}", result.path);
    println!("================================");
    println!();
    println!("Records: {}", result.record_count);
    println!("Total size: {} bytes", result.total_size);

    if result.partitions.is_empty() {
        println!();
        println!("No partitions.");
        return;
    }

    println!();
    println!("Partitions:");
    for partition in &result.partitions {
        println!(
            "  {}: {} records, {} bytes, {} empty",
            partition.name, partition.record_count, partition.data_size, partition.empty_files
        );
        if let Some(records) = &partition.records {
            for record in records {
                println!("    {record}");
            }
        }
    }
}
