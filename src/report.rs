use crate::backup::BackupOutcome;
use crate::batch::BatchSummary;
use crate::diff::{ChangeType, DiffResult};
use crate::duplicates::{DirectoryScan, Match};
use crate::manifest::MANIFEST_FILENAME;
use crate::workflow::{DirectoryOutcome, Mode, OperationReport, WorkflowError};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{error, warn};

pub fn change_code(change: ChangeType) -> &'static str {
    match change {
        ChangeType::Added => "A",
        ChangeType::Changed => "M",
        ChangeType::Lost => "L",
    }
}

pub fn print_outcome(outcome: &DirectoryOutcome) {
    for line in outcome_lines(outcome) {
        println!("{}", line);
    }
}

pub fn print_failure(dir: &Path, mode: Mode, err: &WorkflowError) {
    if err.is_internal() {
        error!("{}: INTERNAL ERROR during {}: {}", dir.display(), mode, err);
        error!("This is a bug in hashcheck; no manifest in {} was changed", dir.display());
    } else {
        error!("{}: {} failed: {}", dir.display(), mode, err);
    }
}

pub fn print_summary(summary: &BatchSummary) {
    for line in summary_lines(summary) {
        println!("{}", line);
    }
}

/// Prints a status line per directory followed by its matches.
pub fn print_scans(scans: &[DirectoryScan]) {
    for scan in scans {
        if let DirectoryScan::Unreadable { dir, error } = scan {
            warn!("{}: skipping unreadable manifest: {}", dir.display(), error);
        }
        for line in scan_lines(scan) {
            println!("{}", line);
        }
    }
}

fn entry_line(code: &str, path: &str) -> String {
    format!("{:<2} {}", code, path)
}

fn diff_lines(diff: &DiffResult) -> impl Iterator<Item = String> + '_ {
    diff.entries()
        .into_iter()
        .map(|(path, change)| entry_line(change_code(change), path))
}

fn outcome_lines(outcome: &DirectoryOutcome) -> Vec<String> {
    let dir = outcome.dir.display();
    let mut lines = Vec::new();

    match &outcome.report {
        OperationReport::Created { files, bytes } => {
            lines.push(format!(
                "{}: created manifest of {} files ({})",
                dir,
                files,
                format_size(*bytes)
            ));
        }
        OperationReport::Expanded { added } => {
            lines.extend(added.iter().map(|p| entry_line("A", p)));
            lines.push(format!("{}: {} files added to manifest", dir, added.len()));
        }
        OperationReport::Updated { added, lost } => {
            lines.extend(added.iter().map(|p| entry_line("A", p)));
            lines.extend(lost.iter().map(|p| entry_line("L", p)));
            if lost.is_empty() {
                lines.push(format!("{}: {} files added to manifest", dir, added.len()));
            } else {
                lines.push(format!(
                    "{}: {} files added, {} lost; run 'hashcheck accept' to drop the lost files",
                    dir,
                    added.len(),
                    lost.len()
                ));
            }
        }
        OperationReport::Verified { checked, diff } => {
            lines.extend(diff_lines(diff));
            if diff.is_empty() {
                lines.push(format!(
                    "{}: {} OK, {} files checked",
                    dir, outcome.mode, checked
                ));
            } else {
                lines.push(format!(
                    "{}: {} found {} added, {} changed, {} lost; run 'hashcheck accept' to record them",
                    dir,
                    outcome.mode,
                    diff.added.len(),
                    diff.changed.len(),
                    diff.lost.len()
                ));
            }
        }
        OperationReport::Sampled {
            total,
            selected,
            failed,
        } => {
            lines.extend(failed.iter().map(|p| entry_line("F", p)));
            lines.push(format!(
                "{}: sampled {} of {} files, {} passed, {} failed",
                dir,
                selected,
                total,
                selected - failed.len(),
                failed.len()
            ));
        }
        OperationReport::Accepted => {
            lines.push(format!("{}: accepted candidate manifest", dir));
        }
        OperationReport::Reviewed {
            manifest_mtime,
            newer,
        } => match newer {
            Some(path) => lines.push(format!(
                "{}: needs verify, {} is newer than the manifest of {}",
                dir,
                path,
                format_time(*manifest_mtime)
            )),
            None => lines.push(format!(
                "{}: nothing newer than the manifest of {}",
                dir,
                format_time(*manifest_mtime)
            )),
        },
        OperationReport::Backup(backup) => match backup {
            BackupOutcome::InSync { peer } => {
                lines.push(format!("{}: backup {} is in sync", dir, peer.display()));
            }
            BackupOutcome::Declined { peer, diff } => {
                lines.push(format!(
                    "{}: backup to {} declined, {} changes not applied",
                    dir,
                    peer.display(),
                    diff.entries().len()
                ));
            }
            BackupOutcome::Synced { peer, diff } => {
                lines.extend(diff_lines(diff));
                lines.push(format!(
                    "{}: backup {} synchronized, {} copied, {} deleted",
                    dir,
                    peer.display(),
                    diff.added.len() + diff.changed.len(),
                    diff.lost.len()
                ));
            }
        },
    }

    lines
}

fn directory_list(title: &str, dirs: &[PathBuf], lines: &mut Vec<String>) {
    if dirs.is_empty() {
        return;
    }
    lines.push(format!("{}:", title));
    lines.extend(dirs.iter().map(|d| format!("  {}", d.display())));
}

/// Empty for a single uninterrupted directory, whose outcome lines already
/// say everything.
fn summary_lines(summary: &BatchSummary) -> Vec<String> {
    let mut lines = Vec::new();
    if summary.processed <= 1 && !summary.interrupted {
        return lines;
    }

    lines.push(format!(
        "Summary: {} directories, {} with problems, {} pending accept, {} pending review",
        summary.processed,
        summary.problems.len(),
        summary.pending_accept.len(),
        summary.pending_review.len()
    ));
    directory_list("Problems", &summary.problems, &mut lines);
    directory_list("Internal errors", &summary.internal, &mut lines);
    directory_list("Pending accept", &summary.pending_accept, &mut lines);
    directory_list("Pending review", &summary.pending_review, &mut lines);
    if summary.interrupted {
        lines.push("Interrupted before all directories were processed".to_string());
    }
    lines
}

fn scan_lines(scan: &DirectoryScan) -> Vec<String> {
    match scan {
        DirectoryScan::Scanned { dir, matches } => {
            std::iter::once(format!("{}: processing {}", dir.display(), MANIFEST_FILENAME))
                .chain(matches.iter().map(match_line))
                .collect()
        }
        DirectoryScan::NoManifest { dir } => {
            vec![format!("{}: no {} found", dir.display(), MANIFEST_FILENAME)]
        }
        DirectoryScan::Unreadable { .. } => Vec::new(),
    }
}

fn match_line(m: &Match) -> String {
    let dirname = |p: &Path| {
        p.parent()
            .map(|d| d.display().to_string())
            .unwrap_or_default()
    };
    let basename = |p: &Path| {
        p.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };

    [
        m.fingerprint.clone(),
        m.size.to_string(),
        m.size.to_string(),
        dirname(m.path.as_path()),
        dirname(m.earlier.as_path()),
        basename(m.path.as_path()),
        basename(m.earlier.as_path()),
        m.path.display().to_string(),
        m.earlier.display().to_string(),
    ]
    .join("\t")
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

fn format_time(time: SystemTime) -> String {
    let datetime: chrono::DateTime<chrono::Local> = time.into();
    datetime.format("%Y-%m-%d %H:%M:%S").to_string()
}
