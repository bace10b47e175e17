//! Per-file availability statistics and CSV export

use crate::error::{RefreshError, Result};
use crate::nzb::Nzb;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Availability tally for one NZB file
///
/// The tally mutex is held only for the increment; the file set itself is
/// fixed before any worker starts, so lookups take no lock.
#[derive(Debug)]
pub struct FileStatistic {
    total_segments: u64,
    available: Mutex<HashMap<String, u64>>,
}

impl FileStatistic {
    fn new(total_segments: u64) -> Self {
        Self {
            total_segments,
            available: Mutex::new(HashMap::new()),
        }
    }

    /// Number of segments the NZB declares for this file
    pub fn total_segments(&self) -> u64 {
        self.total_segments
    }

    /// Segments counted available on `provider_name`
    pub fn available_on(&self, provider_name: &str) -> u64 {
        self.available
            .lock()
            .expect("file statistic mutex poisoned")
            .get(provider_name)
            .copied()
            .unwrap_or(0)
    }
}

/// Statistics for the whole run, one entry per NZB file
#[derive(Debug, Default)]
pub struct RunStatistics {
    files: HashMap<String, FileStatistic>,
    /// NZB document order, for deterministic reporting
    order: Vec<String>,
}

impl RunStatistics {
    /// Register every file of the NZB before workers start
    pub fn from_nzb(nzb: &Nzb) -> Self {
        let mut stats = Self::default();
        for file in &nzb.files {
            match stats.files.get_mut(&file.filename) {
                // Duplicate filename in the NZB: fold the counts together
                Some(existing) => existing.total_segments += file.total_segments(),
                None => {
                    stats
                        .files
                        .insert(file.filename.clone(), FileStatistic::new(file.total_segments()));
                    stats.order.push(file.filename.clone());
                }
            }
        }
        stats
    }

    /// Record one positive probe for (file, provider)
    ///
    /// Unknown file names are ignored; the reconciler only sees names the
    /// driver registered.
    pub fn record_available(&self, file_name: &str, provider_name: &str) {
        if let Some(file) = self.files.get(file_name) {
            let mut tally = file
                .available
                .lock()
                .expect("file statistic mutex poisoned");
            *tally.entry(provider_name.to_string()).or_insert(0) += 1;
        }
    }

    /// Look up one file's statistics
    pub fn file(&self, file_name: &str) -> Option<&FileStatistic> {
        self.files.get(file_name)
    }

    /// Number of registered files
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Render the availability report as CSV
    ///
    /// Header is `Filename, Total segments` followed by the provider names
    /// sorted lexicographically; one row per file in NZB order; providers
    /// with no positive probes for a file show 0. An empty run renders just
    /// the header.
    pub fn to_csv(&self, provider_names: &[String]) -> String {
        let mut providers: Vec<&String> = provider_names.iter().collect();
        providers.sort();

        let mut out = String::new();

        let mut header = vec![
            "Filename".to_string(),
            "Total segments".to_string(),
        ];
        header.extend(providers.iter().map(|p| p.to_string()));
        out.push_str(&csv_row(&header));

        for file_name in &self.order {
            let file = &self.files[file_name];
            let mut row = vec![file_name.clone(), file.total_segments.to_string()];
            row.extend(
                providers
                    .iter()
                    .map(|p| file.available_on(p.as_str()).to_string()),
            );
            out.push_str(&csv_row(&row));
        }

        out
    }

    /// Write the CSV report to a file
    pub fn write_csv(&self, path: &Path, provider_names: &[String]) -> Result<()> {
        std::fs::write(path, self.to_csv(provider_names)).map_err(|e| {
            RefreshError::Other(format!(
                "unable to write csv file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

/// Render one CSV record with RFC 4180 quoting
fn csv_row(fields: &[String]) -> String {
    let mut row = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            row.push(',');
        }
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            row.push('"');
            row.push_str(&field.replace('"', "\"\""));
            row.push('"');
        } else {
            row.push_str(field);
        }
    }
    row.push_str("\r\n");
    row
}
