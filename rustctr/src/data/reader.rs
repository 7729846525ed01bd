use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Event identifiers are opaque strings: the first column of the sample
/// file carried through verbatim. They are only ever compared for equality
/// across channels, never parsed, which keeps combined files (ids with a
/// `-<n>` source suffix) working unchanged.
pub type EventId = String;

/// One channel's samples: per-event identifiers paired with amplitudes.
#[derive(Clone, Debug, Default)]
pub struct SampleSeries {
    pub ids: Vec<EventId>,
    pub values: Vec<f64>,
}

impl SampleSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Multiply every amplitude, e.g. seconds to picoseconds.
    pub fn scaled(mut self, factor: f64) -> SampleSeries {
        for v in &mut self.values {
            *v *= factor;
        }
        self
    }

    /// The sub-series with `lo < value < hi`.
    pub fn restricted(&self, lo: f64, hi: f64) -> SampleSeries {
        let mut out = SampleSeries::default();
        for (id, &v) in self.ids.iter().zip(self.values.iter()) {
            if v > lo && v < hi {
                out.ids.push(id.clone());
                out.values.push(v);
            }
        }
        out
    }

    /// Ids of the events with `lo < value < hi`.
    pub fn ids_in(&self, lo: f64, hi: f64) -> HashSet<EventId> {
        self.ids
            .iter()
            .zip(self.values.iter())
            .filter(|(_, &v)| v > lo && v < hi)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Values of the events whose id is in `keep`.
    pub fn select(&self, keep: &HashSet<EventId>) -> Vec<f64> {
        self.ids
            .iter()
            .zip(self.values.iter())
            .filter(|(id, _)| keep.contains(*id))
            .map(|(_, &v)| v)
            .collect()
    }
}

/// Read a semicolon-separated oscilloscope export: `skip_rows` preamble
/// lines, then `<id>;<amplitude>` per event. Lines whose second column is
/// not numeric (stray headers) are skipped.
pub fn read_samples(path: &Path, skip_rows: usize) -> std::io::Result<SampleSeries> {
    let file = File::open(path)?;
    let mut series = SampleSeries::default();

    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if i < skip_rows {
            continue;
        }
        let mut columns = line.split(';');
        let id = match columns.next() {
            Some(c) => c.trim(),
            None => continue,
        };
        let value = match columns.next().map(|c| c.trim().parse::<f64>()) {
            Some(Ok(v)) => v,
            _ => continue,
        };
        if id.is_empty() {
            continue;
        }
        series.ids.push(id.to_string());
        series.values.push(value);
    }

    Ok(series)
}

/// Modification and creation times as epoch seconds, 0 when the filesystem
/// does not report them (creation time is not available everywhere).
pub fn file_times(path: &Path) -> (f64, f64) {
    let epoch = |t: std::time::SystemTime| {
        t.duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    };
    match std::fs::metadata(path) {
        Ok(meta) => {
            let mtime = meta.modified().map(epoch).unwrap_or(0.0);
            let ctime = meta.created().map(epoch).unwrap_or(mtime);
            (mtime, ctime)
        }
        Err(_) => (0.0, 0.0),
    }
}
