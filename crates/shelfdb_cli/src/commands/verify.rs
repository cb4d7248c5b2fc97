//! Verify command implementation.

use shelfdb_core::TextFields;
use shelfdb_storage::{FileStore, RecordStore, StoredRecord, RECORD_EXTENSION};
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of files checked.
    pub records_checked: usize,
    /// Number of valid files.
    pub valid_records: usize,
    /// List of problems found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Checks every record file under `path`.
///
/// A file is valid when it is named `<positive integer>.db`, is not empty
/// and holds UTF-8 text. With `decode`, its contents must also parse as a
/// text record whose `id` field matches the file name.
pub fn check(path: &Path, decode: bool) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No database found at {path:?}").into());
    }
    let store = FileStore::open(path)?;
    let mut result = VerifyResult::default();

    for partition in store.partitions()? {
        for file in store.read_partition(&partition)? {
            result.records_checked += 1;
            match verify_file(&file, decode) {
                Ok(()) => result.valid_records += 1,
                Err(problem) => {
                    tracing::debug!(location = %file.location.display(), %problem, "invalid record file");
                    result
                        .errors
                        .push(format!("{}: {problem}", file.location.display()));
                }
            }
        }
    }

    Ok(result)
}

fn verify_file(file: &StoredRecord, decode: bool) -> Result<(), String> {
    let id = file_id(file).ok_or_else(|| format!("name is not <positive integer>.{RECORD_EXTENSION}"))?;
    if file.bytes.is_empty() {
        return Err("file is empty".to_string());
    }
    let text = std::str::from_utf8(&file.bytes).map_err(|e| format!("not UTF-8: {e}"))?;

    if decode {
        let fields = TextFields::parse(text).map_err(|e| e.to_string())?;
        let recorded = fields.id().map_err(|e| e.to_string())?;
        if recorded.as_u64() != id {
            return Err(format!("id field {recorded} does not match file name"));
        }
    }
    Ok(())
}

fn file_id(file: &StoredRecord) -> Option<u64> {
    let extension = file.location.extension()?.to_str()?;
    if extension != RECORD_EXTENSION {
        return None;
    }
    let id: u64 = file.stem()?.parse().ok()?;
    (id > 0).then_some(id)
}

/// Runs the verify command.
pub fn run(path: &Path, decode: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying data directory at {path:?}");
    println!();

    let result = check(path, decode)?;
    print_result(&result);

    println!();
    if result.is_ok() {
        println!("✓ Verification passed");
        Ok(())
    } else {
        println!("✗ Verification failed");
        Err("Verification failed".into())
    }
}

fn print_result(result: &VerifyResult) {
    println!("  Files checked: {}", result.records_checked);
    println!("  Valid: {}", result.valid_records);
    println!("  Problems: {}", result.errors.len());
    for error in result.errors.iter().take(20) {
        println!("    - {error}");
    }
    if result.errors.len() > 20 {
        println!("    ... and {} more", result.errors.len() - 20);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(root: &Path, partition: &str, name: &str, bytes: &[u8]) {
        fs::create_dir_all(root.join(partition)).unwrap();
        fs::write(root.join(partition).join(name), bytes).unwrap();
    }

    #[test]
    fn clean_directory_passes() {
        let dir = tempdir().unwrap();
        write(dir.path(), "TestThing", "1.db", b"{ id: 1 }");
        write(dir.path(), "TestThing", "2.db", b"{ id: 2 }");

        let result = check(dir.path(), true).unwrap();
        assert!(result.is_ok());
        assert_eq!(result.valid_records, 2);
    }

    #[test]
    fn reports_each_problem() {
        let dir = tempdir().unwrap();
        write(dir.path(), "TestThing", "bad.db", b"{ id: 1 }");
        write(dir.path(), "TestThing", "0.db", b"{ id: 0 }");
        write(dir.path(), "TestThing", "3.db", b"");
        write(dir.path(), "TestThing", "4.db", &[0xff, 0xfe]);
        write(dir.path(), "TestThing", "5.txt", b"{ id: 5 }");

        let result = check(dir.path(), false).unwrap();
        assert_eq!(result.records_checked, 5);
        assert_eq!(result.valid_records, 0);
        assert_eq!(result.errors.len(), 5);
    }

    #[test]
    fn decode_checks_contents() {
        let dir = tempdir().unwrap();
        write(dir.path(), "TestThing", "1.db", b"{ id: 2 }");
        write(dir.path(), "TestThing", "3.db", &[1, 2, 3]);

        assert!(check(dir.path(), false).unwrap().is_ok());
        let result = check(dir.path(), true).unwrap();
        assert_eq!(result.errors.len(), 2);
    }
}
