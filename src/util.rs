use std::io::{BufRead, Write};
use std::sync::Arc;

use cli_table::{Cell, CellStruct, Style, Table, format::Justify, print_stdout};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use owo_colors::OwoColorize;

use crate::remote::Album;
use crate::sync::{Confirm, DirectoryReport};

/// Try to enable ANSI escape sequence support on Windows consoles.
/// Returns true if enabling succeeded (or platform likely already supports ANSI), false otherwise.
#[cfg(windows)]
pub fn try_enable_ansi_on_windows() -> bool {
    enable_ansi_support::enable_ansi_support().is_ok()
}

#[cfg(not(windows))]
pub fn try_enable_ansi_on_windows() -> bool {
    true
}

/// Convert a byte count into a human readable string using IEC units (KiB/MiB/GiB).
pub fn human_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    let b = bytes as f64;
    if b >= GB {
        format!("{:.2} GiB", b / GB)
    } else if b >= MB {
        format!("{:.2} MiB", b / MB)
    } else if b >= KB {
        format!("{:.2} KiB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// Contiguous batches of at most `size` items; the last one may be shorter.
pub fn chunked<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items.chunks(size.max(1)).map(|c| c.to_vec()).collect()
}

/// MultiProgress shared by the per-directory header and per-file bars.
/// `hidden` draws nothing (tests, non-interactive runs).
pub fn init_progress(hidden: bool) -> Arc<MultiProgress> {
    let mp = if hidden {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        // attempt to enable ANSI on Windows (best-effort)
        let _ = try_enable_ansi_on_windows();
        MultiProgress::new()
    };
    Arc::new(mp)
}

pub fn file_progress_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg:30!} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {elapsed}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

/// Single-line header above the file bars of one directory.
/// Fields are: Album, Files, Worker, Size, each padded and separated by 4 spaces.
pub fn dir_header(mp: &MultiProgress, title: &str, files: usize, workers: usize, bytes: u64) -> ProgressBar {
    let header = mp.add(ProgressBar::new_spinner());
    header.set_style(ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()));
    let album_field = format!("{:<24}", format!("Album:{}", title));
    let files_field = format!("{:<10}", format!("Files:{}", files));
    let worker_field = format!("{:<10}", format!("Worker:{}", workers));
    let size_field = format!("{:<14}", format!("Size:{}", human_bytes(bytes)));
    let msg = if try_enable_ansi_on_windows() {
        format!(
            "{}    {}    {}    {}",
            album_field.green(),
            files_field.cyan(),
            worker_field.yellow(),
            size_field.magenta()
        )
    } else {
        format!("{}    {}    {}    {}", album_field, files_field, worker_field, size_field)
    };
    header.set_message(msg);
    header
}

/// Table with one row per processed directory.
pub fn print_summary(reports: &[DirectoryReport], dry_run: bool) -> std::io::Result<()> {
    if reports.is_empty() {
        println!("No album directories found.");
        return Ok(());
    }
    let title = vec![
        "Directory".cell().bold(true),
        "Album".cell().bold(true),
        "Year".cell().bold(true),
        "Result".cell().bold(true),
        "Uploaded".cell().bold(true),
        "Carried".cell().bold(true),
        "Attached".cell().bold(true),
        "Failed".cell().bold(true),
    ];
    let mut rows: Vec<Vec<CellStruct>> = Vec::with_capacity(reports.len());
    for r in reports {
        let year = r.year.map(|y| y.to_string()).unwrap_or_else(|| "-".to_string());
        rows.push(vec![
            r.path.display().to_string().cell(),
            r.title.clone().cell(),
            year.cell().justify(Justify::Right),
            r.outcome.to_string().cell(),
            format!("{} ({})", r.uploaded, human_bytes(r.uploaded_bytes)).cell().justify(Justify::Right),
            r.carried_over.cell().justify(Justify::Right),
            r.attached.cell().justify(Justify::Right),
            r.failed_items.cell().justify(Justify::Right),
        ]);
    }
    print_stdout(rows.table().title(title))?;

    let uploaded: usize = reports.iter().map(|r| r.uploaded).sum();
    let attached: usize = reports.iter().map(|r| r.attached).sum();
    if dry_run {
        println!("Dry run: {} file(s) would be uploaded, nothing was changed.", uploaded);
    } else {
        println!("{} file(s) uploaded, {} item(s) added to albums.", uploaded, attached);
    }
    Ok(())
}

pub fn print_albums(albums: &[Album]) -> std::io::Result<()> {
    if albums.is_empty() {
        println!("No albums yet.");
        return Ok(());
    }
    let title = vec!["Title".cell().bold(true), "Id".cell().bold(true)];
    let rows: Vec<Vec<CellStruct>> = albums
        .iter()
        .map(|a| vec![a.title.clone().cell(), a.id.clone().cell().justify(Justify::Right)])
        .collect();
    print_stdout(rows.table().title(title))
}

/// `[Y/n]` prompt on stdin; an empty answer means yes.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{}\nContinue? [Y/n] ", prompt);
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line).is_err() {
            return false;
        }
        is_yes(&line)
    }
}

pub(crate) fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "" | "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_bytes_units() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.00 KiB");
        assert_eq!(human_bytes(5 * 1024 * 1024), "5.00 MiB");
    }

    #[test]
    fn chunked_keeps_order_and_short_tail() {
        let t: Vec<String> = (0..5).map(|i| format!("t{}", i)).collect();
        let c = chunked(&t, 2);
        assert_eq!(c, vec![vec!["t0", "t1"], vec!["t2", "t3"], vec!["t4"]]);
        assert_eq!(chunked(&t, 4).len(), 2);
        assert!(chunked::<String>(&[], 3).is_empty());
    }

    #[test]
    fn prompt_answers() {
        assert!(is_yes("\n"));
        assert!(is_yes("Y\n"));
        assert!(is_yes("yes"));
        assert!(!is_yes("n\n"));
        assert!(!is_yes("nope"));
    }
}
