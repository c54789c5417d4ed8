//! Statistics logging: writing and re-reading the history, weights and
//! entropy estimates as a small text grammar (`spec.md` §4.8).
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};

use log::warn;

use crate::array::{BArray, CArray, DArray};
use crate::binner::Binner;
use crate::error::{MuninnError, MuninnResult};
use crate::estimate::Estimate;
use crate::histogram::Histogram;
use crate::history::MultiHistogramHistory;

/// Logging mode for [`StatisticsLogger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Nothing is logged.
    None,
    /// Append a new, counter-indexed block after every estimation round.
    All,
    /// Rewrite the file from scratch every round with the full current
    /// history plus a single copy of the current entropy estimate.
    Current,
}

/// Each entry is written as `<name><index> = [v1 v2 ...]`, one array per
/// line; a blank line separates rounds. This is a simplified rendering of
/// the donor's `TArray` text grammar (no `TArray(...)` wrapper or embedded
/// type tag, since Rust has no `typeid` string to carry over) that still
/// round-trips through [`LogReader`].
pub struct StatisticsLogger {
    filename: String,
    mode: Mode,
    precision: usize,
    counter: u64,
}

impl StatisticsLogger {
    /// A logger writing to `filename` in `mode`, formatting floats with
    /// `precision` digits after the decimal point.
    pub fn new(filename: impl Into<String>, mode: Mode, precision: usize) -> Self {
        let filename = filename.into();
        if mode == Mode::All {
            let _ = fs::File::create(&filename);
        }
        StatisticsLogger {
            filename,
            mode,
            precision,
            counter: 0,
        }
    }

    /// Write the newest histogram, the history it was folded into, and the
    /// resulting estimate. In [`Mode::All`] this appends; in
    /// [`Mode::Current`] it rewrites the whole file.
    pub fn log(
        &mut self,
        new_histogram: &Histogram,
        history: &MultiHistogramHistory,
        estimate: &Estimate,
        binner: Option<&dyn Binner>,
    ) -> MuninnResult<()> {
        match self.mode {
            Mode::None => Ok(()),
            Mode::All => self.log_all(new_histogram, estimate, binner),
            Mode::Current => self.log_current(history, estimate, binner),
        }
    }

    fn log_all(&mut self, new_histogram: &Histogram, estimate: &Estimate, binner: Option<&dyn Binner>) -> MuninnResult<()> {
        let idx = self.counter;
        let mut block = String::new();
        push_counts(&mut block, &format!("N{idx}"), new_histogram.counts());
        push_floats(&mut block, &format!("lnw{idx}"), new_histogram.lnw(), self.precision);
        push_floats(&mut block, &format!("lnG{idx}"), estimate.ln_g(), self.precision);
        push_bools(&mut block, &format!("lnG_support{idx}"), estimate.ln_g_support());
        if let Some(binner) = binner {
            push_floats(&mut block, &format!("binning{idx}"), &binner.get_binning(), self.precision);
            push_floats(&mut block, &format!("bin_widths{idx}"), &binner.get_bin_widths(), self.precision);
        }
        block.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.filename)
            .map_err(|e| MuninnError::ConfigError { message: format!("could not open statistics log {}: {e}", self.filename) })?;
        file.write_all(block.as_bytes())
            .map_err(|e| MuninnError::ConfigError { message: format!("could not write statistics log {}: {e}", self.filename) })?;

        self.counter += 1;
        Ok(())
    }

    fn log_current(&mut self, history: &MultiHistogramHistory, estimate: &Estimate, binner: Option<&dyn Binner>) -> MuninnResult<()> {
        let mut contents = String::new();
        let mut idx = 0u64;
        // Oldest first, matching the reference's rbegin()..rend() traversal
        // over a newest-first deque.
        for entry in history.iter().collect::<Vec<_>>().into_iter().rev() {
            push_counts(&mut contents, &format!("N{idx}"), entry.histogram.counts());
            push_floats(&mut contents, &format!("lnw{idx}"), entry.histogram.lnw(), self.precision);
            contents.push('\n');
            idx += 1;
        }

        let last = idx.saturating_sub(1);
        push_floats(&mut contents, &format!("lnG{last}"), estimate.ln_g(), self.precision);
        push_bools(&mut contents, &format!("lnG_support{last}"), estimate.ln_g_support());
        if let Some(binner) = binner {
            push_floats(&mut contents, &format!("binning{last}"), &binner.get_binning(), self.precision);
            push_floats(&mut contents, &format!("bin_widths{last}"), &binner.get_bin_widths(), self.precision);
        }

        fs::write(&self.filename, contents)
            .map_err(|e| MuninnError::ConfigError { message: format!("could not write statistics log {}: {e}", self.filename) })
    }
}

fn push_floats(out: &mut String, name: &str, values: &DArray, precision: usize) {
    let body = values.0.iter().map(|v| format!("{v:.precision$}")).collect::<Vec<_>>().join(" ");
    out.push_str(&format!("{name} = [{body}]\n"));
}

fn push_counts(out: &mut String, name: &str, values: &CArray) {
    let body = values.0.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ");
    out.push_str(&format!("{name} = [{body}]\n"));
}

fn push_bools(out: &mut String, name: &str, values: &BArray) {
    let body = values.0.iter().map(|&v| if v { "1" } else { "0" }).collect::<Vec<_>>().join(" ");
    out.push_str(&format!("{name} = [{body}]\n"));
}

/// A parsed entry: the raw line key (e.g. `"lnG3"`) plus its array contents.
#[derive(Debug, Clone)]
struct RawEntry {
    key: String,
    values: Vec<f64>,
}

/// Reads back a file written by [`StatisticsLogger`], capping how many
/// entries of each kind are kept (oldest dropped first), and auto-detecting
/// whether the file was written in [`Mode::All`] or [`Mode::Current`].
#[derive(Debug, Default)]
pub struct LogReader {
    ns: Vec<RawEntry>,
    lnws: Vec<RawEntry>,
    ln_gs: Vec<RawEntry>,
    ln_g_supports: Vec<RawEntry>,
    binnings: Vec<RawEntry>,
    bin_widths: Vec<RawEntry>,
}

impl LogReader {
    /// Read `filename`, keeping at most `max_hist` entries of each array
    /// kind (`0` means unbounded).
    pub fn read(filename: &str, max_hist: usize) -> MuninnResult<Self> {
        let file = fs::File::open(filename)
            .map_err(|e| MuninnError::ReadError { message: format!("could not open statistics logfile {filename}: {e}") })?;
        let mut reader = LogReader::default();

        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| MuninnError::ReadError { message: format!("I/O error reading line {}: {e}", line_no + 1) })?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some(eq) = line.find('=') else {
                warn!("When reading statistics log, line {} did not contain an equal sign (=).", line_no + 1);
                continue;
            };
            let key = line[..eq].trim().to_string();
            let body = &line[eq + 1..];
            let values = parse_bracketed(body);
            let entry = RawEntry { key: key.clone(), values };

            let bucket = if key.starts_with("lnG_support") {
                &mut reader.ln_g_supports
            } else if key.starts_with("lnG") {
                &mut reader.ln_gs
            } else if key.starts_with("lnw") {
                &mut reader.lnws
            } else if key.starts_with("bin_widths") {
                &mut reader.bin_widths
            } else if key.starts_with("binning") {
                &mut reader.binnings
            } else if key.starts_with('N') {
                &mut reader.ns
            } else {
                warn!("When reading statistics log, found unknown identifier \"{key}\" at line {}.", line_no + 1);
                continue;
            };

            bucket.push(entry);
            if max_hist > 0 && bucket.len() > max_hist {
                bucket.remove(0);
            }
        }

        Ok(reader)
    }

    /// Counts of N (and, symmetrically, lnw) entries read.
    pub fn n_histograms(&self) -> usize {
        self.ns.len()
    }

    /// The read `N` arrays, as `(key, CArray)` pairs in file order.
    pub fn ns(&self) -> Vec<(String, CArray)> {
        self.ns.iter().map(|e| (e.key.clone(), CArray(e.values.iter().map(|&v| v.round() as u64).collect()))).collect()
    }

    /// The read `lnw` arrays.
    pub fn lnws(&self) -> Vec<(String, DArray)> {
        self.lnws.iter().map(|e| (e.key.clone(), DArray(e.values.clone()))).collect()
    }

    /// The read `lnG` arrays.
    pub fn ln_gs(&self) -> Vec<(String, DArray)> {
        self.ln_gs.iter().map(|e| (e.key.clone(), DArray(e.values.clone()))).collect()
    }

    /// The read `lnG_support` arrays.
    pub fn ln_g_supports(&self) -> Vec<(String, BArray)> {
        self.ln_g_supports.iter().map(|e| (e.key.clone(), BArray(e.values.iter().map(|&v| v != 0.0).collect()))).collect()
    }

    /// The read `binning` arrays.
    pub fn binnings(&self) -> Vec<(String, DArray)> {
        self.binnings.iter().map(|e| (e.key.clone(), DArray(e.values.clone()))).collect()
    }

    /// The read `bin_widths` arrays.
    pub fn bin_widths(&self) -> Vec<(String, DArray)> {
        self.bin_widths.iter().map(|e| (e.key.clone(), DArray(e.values.clone()))).collect()
    }

    /// `true` if the counts of `(lnG, binning, ...)` differ from the counts
    /// of `(N, lnw)` — the signature of a [`Mode::Current`] file, which
    /// carries many histograms but only the newest entropy estimate.
    pub fn looks_like_current_mode(&self) -> bool {
        !self.ns.is_empty() && self.ln_gs.len() != self.ns.len()
    }

    /// `true` if any of the expected array kinds are entirely missing,
    /// signalling the host should treat this as a partial read.
    pub fn is_partial(&self) -> bool {
        self.ns.is_empty() || self.lnws.is_empty() || self.ln_gs.is_empty() || self.ln_g_supports.is_empty()
    }
}

fn parse_bracketed(body: &str) -> Vec<f64> {
    let open = body.find('[');
    let close = body.rfind(']');
    let inner = match (open, close) {
        (Some(o), Some(c)) if c > o => &body[o + 1..c],
        _ => return Vec::new(),
    };
    inner.split_whitespace().filter_map(|tok| tok.parse::<f64>().ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::DeletionPolicy;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_FILE_COUNTER: AtomicU64 = AtomicU64::new(0);

    /// A unique path under the system temp dir, cleaned up on drop.
    struct ScratchFile(std::path::PathBuf);

    impl ScratchFile {
        fn new(label: &str) -> Self {
            let n = TEST_FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!("muninn_logger_test_{label}_{}_{n}.log", std::process::id()));
            ScratchFile(path)
        }

        fn path(&self) -> String {
            self.0.to_str().unwrap().to_string()
        }
    }

    impl Drop for ScratchFile {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.0);
        }
    }

    fn sample_history() -> (MultiHistogramHistory, Estimate) {
        let mut history = MultiHistogramHistory::new(3, 10, 1, DeletionPolicy::DropNone);
        let mut h = Histogram::new_empty(3);
        h.add_observation(0);
        h.add_observation(1);
        history.add_histogram(h);

        let mut estimate = Estimate::new_empty(3);
        estimate.set_ln_g(DArray(vec![0.0, -1.0, -2.0]));
        estimate.set_ln_g_support(BArray(vec![true, true, false]));
        (history, estimate)
    }

    #[test]
    fn all_mode_round_trips_through_the_reader() {
        let scratch = ScratchFile::new("all");
        let filename = scratch.path();
        let (history, estimate) = sample_history();
        let newest = history.iter().next().unwrap().histogram.clone();

        let mut logger = StatisticsLogger::new(filename.clone(), Mode::All, 6);
        logger.log(&newest, &history, &estimate, None).unwrap();
        logger.log(&newest, &history, &estimate, None).unwrap();

        let reader = LogReader::read(&filename, 0).unwrap();
        assert_eq!(reader.n_histograms(), 2);
        assert!(!reader.looks_like_current_mode());
        assert_eq!(reader.ln_gs()[0].1 .0, vec![0.0, -1.0, -2.0]);
    }

    #[test]
    fn current_mode_keeps_only_the_newest_estimate() {
        let scratch = ScratchFile::new("current");
        let filename = scratch.path();
        let (history, estimate) = sample_history();
        let newest = history.iter().next().unwrap().histogram.clone();

        let mut logger = StatisticsLogger::new(filename.clone(), Mode::Current, 6);
        logger.log(&newest, &history, &estimate, None).unwrap();

        let reader = LogReader::read(&filename, 0).unwrap();
        assert_eq!(reader.n_histograms(), 1);
        assert_eq!(reader.ln_gs().len(), 1);
    }

    #[test]
    fn none_mode_writes_nothing() {
        let scratch = ScratchFile::new("none");
        let filename = scratch.path();
        let (history, estimate) = sample_history();
        let newest = history.iter().next().unwrap().histogram.clone();

        let mut logger = StatisticsLogger::new(filename.clone(), Mode::None, 6);
        logger.log(&newest, &history, &estimate, None).unwrap();

        assert!(fs::metadata(&filename).is_err(), "Mode::None must never touch the filesystem");
    }
}
