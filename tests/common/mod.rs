#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// A small marketplace export in the raw layout: padded headers, a bad date,
/// a duplicated order, a blank row, and missing categorical values.
pub const RAW_EXPORT: &str = "\
index, Order ID ,Date,Status,Fulfilment,Category,Qty,Amount,ship-state,fulfilled-by,
0,171-001,04-30-22,Cancelled,Merchant,Set,0,647.62,MAHARASHTRA,Easy Ship,
1,171-002,04-30-22,Shipped,Merchant,kurta,1,406,KARNATAKA,Easy Ship,
2,171-003,05-01-22,Shipped,Amazon,kurta,1,329,MAHARASHTRA,,
2,171-003,05-01-22,Shipped,Amazon,kurta,1,329,MAHARASHTRA,,
,,,,,,,,,,
4,171-005,not-a-date,Shipped,Amazon,,2,574,,,
5,171-006,06-02-22,Shipped - Delivered to Buyer,Merchant,Top,1,abc,TAMIL NADU,Easy Ship,
";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    /// Writes raw bytes, for inputs that are not valid UTF-8.
    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.temp_dir.path().join(name)).expect("read workspace file")
    }
}
