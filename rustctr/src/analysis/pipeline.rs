use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use ctrcore::fitting::error::estimate_errors;
use ctrcore::fitting::gaussian::{fit_gaussian, FitOptions, DELAY_FIT_ATTEMPTS};
use ctrcore::statistics::bootstrap::counter_seed;
use ctrcore::statistics::histogram::Histogram;

use crate::analysis::coincidence::select_coincident;
use crate::analysis::photopeak::{locate_photopeaks, photopeak_events, LocatedPeaks};
use crate::analysis::record::DelayRecord;
use crate::analysis::settings::{
    AnalysisSettings, LocatorMode, MultiPeakSettings, SinglePeakSettings,
};
use crate::data::reader::{file_times, read_samples, EventId, SampleSeries};
use crate::data::run::{crystal_length, discover_runs, sample_names, RunGroup};
use crate::error::GroupFailure;

/// In-memory view of one file-group: the channels the pipeline consumes.
/// The width channels (F4, F5) are grouped but not analyzed.
#[derive(Clone, Debug)]
pub struct GroupSeries {
    pub left_energy: SampleSeries,
    pub right_energy: SampleSeries,
    /// Delay between the two NINO signals, in seconds as recorded.
    pub delay: SampleSeries,
    pub left_edges: SampleSeries,
    pub right_edges: SampleSeries,
}

/// Metadata carried into the record unchanged.
#[derive(Clone, Debug)]
pub struct GroupMeta {
    pub unique_name: String,
    pub sample_a: String,
    pub sample_b: String,
    pub crystal_length: i64,
    pub mtime: f64,
    pub ctime: f64,
}

/// Events with an edge count of 2: exactly one rising and one falling NINO
/// edge, i.e. a clean single-trigger event.
fn single_edge_ids(series: &SampleSeries) -> HashSet<EventId> {
    series.ids_in(1.5, 2.5)
}

fn group_seed(base: u64, name: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    counter_seed(base, hasher.finish())
}

fn locate_channel(
    series: &SampleSeries,
    energy_range: (f64, f64),
    fit_range: (f64, f64),
    settings: &AnalysisSettings,
    rng: &mut StdRng,
) -> Option<LocatedPeaks> {
    match settings.locator {
        LocatorMode::MultiPeak => locate_photopeaks(
            series,
            &MultiPeakSettings::over(energy_range),
            settings.error_method,
            &settings.bootstrap,
            rng,
        ),
        LocatorMode::SinglePeak => {
            let cfg = SinglePeakSettings {
                bin_range: settings.energy_bin_range,
                ..SinglePeakSettings::over(fit_range)
            };
            photopeak_events(series, &cfg, settings.error_method, &settings.bootstrap, rng)
                .map(|primary| LocatedPeaks {
                    primary,
                    secondary: None,
                })
        }
    }
}

/// Process one file-group already loaded into memory.
///
/// The steps are strictly ordered; each consumes the previous one's
/// output. Retries live inside the fitter only -- a failed step maps
/// straight to a [`GroupFailure`].
pub fn run_group(
    series: &GroupSeries,
    meta: &GroupMeta,
    settings: &AnalysisSettings,
) -> Result<DelayRecord, GroupFailure> {
    let mut rng = StdRng::seed_from_u64(group_seed(settings.seed, &meta.unique_name));

    let left = locate_channel(
        &series.left_energy,
        settings.left_energy_range,
        settings.left_fit_range,
        settings,
        &mut rng,
    )
    .ok_or(GroupFailure::LeftPeak)?;
    // any secondary peak in the reference detector is ignored

    let right = locate_channel(
        &series.right_energy,
        settings.right_energy_range,
        settings.right_fit_range,
        settings,
        &mut rng,
    )
    .ok_or(GroupFailure::RightPeak)?;

    let left_edges = single_edge_ids(&series.left_edges);
    let right_edges = single_edge_ids(&series.right_edges);

    let coincident = select_coincident(
        &[
            &right.primary.indices,
            &left.primary.indices,
            &left_edges,
            &right_edges,
        ],
        right.secondary.as_ref().map(|s| &s.indices),
        settings.policy,
    );

    let delay_ps = series.delay.clone().scaled(1e12);
    let selected = delay_ps.select(&coincident);
    if selected.len() < settings.min_samples {
        return Err(GroupFailure::InsufficientData(selected.len()));
    }

    let (tmin, tmax) = settings.time_range;
    let bins = ((tmax - tmin) / settings.dt).floor() as usize;
    let hist = Histogram::from_range(&selected, settings.time_range, bins.max(1));
    if hist.is_empty() {
        return Err(GroupFailure::DelayFit);
    }

    let fit = fit_gaussian(
        &hist.centers,
        &hist.counts_f64(),
        None,
        FitOptions {
            scale_guess: 100.0,
            peak_guess: Some(100.0),
            max_attempts: DELAY_FIT_ATTEMPTS,
        },
    )
    .ok_or(GroupFailure::DelayFit)?;

    let errors = estimate_errors(
        settings.error_method,
        &selected,
        &fit,
        &settings.bootstrap,
        &mut rng,
    );

    let (rsp_loc, rsp_scale, rsp_loc_err, rsp_scale_err) = match &right.secondary {
        Some(peak) => (
            peak.fit.location,
            peak.fit.scale,
            peak.errors.location,
            peak.errors.scale,
        ),
        None => (0.0, 0.0, 0.0, 0.0),
    };

    Ok(DelayRecord {
        uniquename: meta.unique_name.clone(),
        sample_a: meta.sample_a.clone(),
        sample_b: meta.sample_b.clone(),
        length: meta.crystal_length,
        mtime: meta.mtime,
        ctime: meta.ctime,
        location: fit.location,
        locationerr: errors.location,
        scale: fit.scale,
        scaleerr: errors.scale,
        amplitude: fit.amplitude,
        amplitudeerr: errors.amplitude,
        chisquared: fit.reduced_chi_square,
        numofsamples: selected.len(),
        lp_loc: left.primary.fit.location,
        lp_scale: left.primary.fit.scale,
        lp_loc_err: left.primary.errors.location,
        lp_scale_err: left.primary.errors.scale,
        rp_loc: right.primary.fit.location,
        rp_scale: right.primary.fit.scale,
        rp_loc_err: right.primary.errors.location,
        rp_scale_err: right.primary.errors.scale,
        rsp_loc,
        rsp_scale,
        rsp_loc_err,
        rsp_scale_err,
    })
}

/// Read one discovered run into memory and derive its metadata.
pub fn load_group(
    group: &RunGroup,
    settings: &AnalysisSettings,
) -> Result<(GroupSeries, GroupMeta), GroupFailure> {
    let channel = |n: u8| group.channel(n).ok_or(GroupFailure::MissingChannel(n));

    let delay_path = channel(3)?;
    let series = GroupSeries {
        left_energy: read_samples(channel(1)?, settings.skip_rows)?,
        right_energy: read_samples(channel(2)?, settings.skip_rows)?,
        delay: read_samples(delay_path, settings.skip_rows)?,
        left_edges: read_samples(channel(7)?, settings.skip_rows)?,
        right_edges: read_samples(channel(8)?, settings.skip_rows)?,
    };

    let (mtime, ctime) = file_times(delay_path);
    let (sample_a, sample_b) = match sample_names(&group.unique_name) {
        Some(names) => names,
        None => {
            log::warn!("run name {} has no `vs` separator", group.unique_name);
            (group.unique_name.clone(), group.unique_name.clone())
        }
    };
    let length = match crystal_length(&sample_b, &settings.working_on) {
        Some(length) => length,
        None => {
            log::warn!("no crystal length in sample name {}", sample_b);
            0
        }
    };

    Ok((
        series,
        GroupMeta {
            unique_name: group.unique_name.clone(),
            sample_a,
            sample_b,
            crystal_length: length,
            mtime,
            ctime,
        },
    ))
}

/// Process every run under `root`. File-groups are independent, so they
/// fan out over the rayon pool; failed groups are logged and dropped, and
/// the batch always completes with whatever succeeded.
pub fn process_directory(
    root: &Path,
    settings: &AnalysisSettings,
) -> io::Result<Vec<DelayRecord>> {
    let groups = discover_runs(root, &settings.keyword, 2, settings.skip_first)?;
    log::info!("processing {} run groups under {}", groups.len(), root.display());

    let records: Vec<DelayRecord> = groups
        .par_iter()
        .filter_map(|group| {
            let outcome = load_group(group, settings)
                .and_then(|(series, meta)| run_group(&series, &meta, settings));
            match outcome {
                Ok(record) => Some(record),
                Err(failure) => {
                    log::warn!("skipping {}: {}", group.unique_name, failure);
                    None
                }
            }
        })
        .collect();

    Ok(records)
}

/// Conventional name of the output table for these settings.
pub fn table_name(settings: &AnalysisSettings) -> String {
    format!("{}-{}.csv", settings.working_on, settings.error_method.key())
}

/// Serialize records to a CSV table with the historical column headers.
pub fn write_table(records: &[DelayRecord], path: &Path) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Serialize records as JSON lines, one record per line.
pub fn write_json(records: &[DelayRecord], path: &Path) -> io::Result<()> {
    use std::io::Write;

    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}
