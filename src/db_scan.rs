use globset::GlobBuilder;
use walkdir::WalkDir;

use crate::support_db;

#[derive(Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct ScanSample {
    pub path: String,
    pub line_no: usize,
    pub message: String,
    pub line: String,
}

#[derive(Clone, Debug, Default)]
#[derive(serde::Serialize)]
pub struct ScanReport {
    pub files_checked: usize,
    pub by_file: Vec<(String, usize)>,
    pub samples: Vec<ScanSample>,
}

/// Walks `root` for support-list files (default glob `*.list`, matched
/// case-insensitively against file names) and runs the strict validator over
/// each. Unreadable files are logged and skipped.
pub fn scan(root: &str, db_glob: Option<&str>, sample_cap: usize) -> ScanReport {
    let pattern = db_glob.unwrap_or("*.list");
    let glob = match GlobBuilder::new(pattern).case_insensitive(true).build() {
        Ok(g) => g.compile_matcher(),
        Err(e) => {
            log::error!("Bad database glob {}: {}", pattern, e);
            return ScanReport::default();
        }
    };
    let mut report = ScanReport::default();
    for de in WalkDir::new(root).follow_links(false).into_iter().filter_map(std::result::Result::ok) {
        let p = de.path();
        if !p.is_file() {
            continue;
        }
        let Some(name) = p.file_name() else { continue };
        if !glob.is_match(name) {
            continue;
        }
        let path_str = p.to_string_lossy().to_string();
        let content = match std::fs::read_to_string(p) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Failed to read {}: {}", path_str, e);
                continue;
            }
        };
        report.files_checked += 1;
        let violations = support_db::validate(&content);
        if violations.is_empty() {
            continue;
        }
        report.by_file.push((path_str.clone(), violations.len()));
        for v in &violations {
            if report.samples.len() >= sample_cap {
                break;
            }
            report.samples.push(ScanSample {
                path: path_str.clone(),
                line_no: v.line_no,
                message: v.message(),
                line: v.line.clone(),
            });
        }
    }
    report.by_file.sort_by(|a, b| b.1.cmp(&a.1));
    report
}
