use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// What the oscilloscope recorded on each file channel.
pub fn channel_description(channel: u8) -> Option<&'static str> {
    match channel {
        1 => Some("Maximum Left SiPM Signal"),
        2 => Some("Maximum Right SiPM Signal"),
        3 => Some("Delay between Left and right NINO"),
        4 => Some("Width of Left NINO Signal"),
        5 => Some("Width of Right NINO Signal"),
        7 => Some("Edges of Left NINO Signal"),
        8 => Some("Edges of Right NINO Signal"),
        _ => None,
    }
}

/// Channels a complete run carries (6 was never wired up).
pub const CHANNELS: [u8; 7] = [1, 2, 3, 4, 5, 7, 8];

/// One measurement run: the files for every recorded channel, keyed by
/// channel number.
#[derive(Clone, Debug)]
pub struct RunGroup {
    pub unique_name: String,
    pub files: HashMap<u8, PathBuf>,
}

impl RunGroup {
    pub fn channel(&self, channel: u8) -> Option<&Path> {
        self.files.get(&channel).map(|p| p.as_path())
    }
}

fn walk_txt_files(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if path.is_dir() {
            if name == ".git" {
                continue;
            }
            walk_txt_files(&path, out)?;
            continue;
        }
        // skips over guff
        if name.starts_with("input") || name.starts_with("output") {
            continue;
        }
        if name.ends_with(".txt") {
            out.push(path);
        }
    }
    Ok(())
}

/// Discover runs under `root` and group their channel files.
///
/// A file `F3Run_<name>.txt` belongs to run `<name>` on channel 3: the
/// channel digit sits at position 1 and the run name is the filename with
/// `crop` leading characters and the extension removed. `skip_first` drops
/// the `00000` warm-up runs recorded while the setup temperature settles,
/// and only runs whose name contains `keyword` are returned.
pub fn discover_runs(
    root: &Path,
    keyword: &str,
    crop: usize,
    skip_first: bool,
) -> io::Result<Vec<RunGroup>> {
    let mut files = Vec::new();
    walk_txt_files(root, &mut files)?;

    let mut groups: HashMap<String, HashMap<u8, PathBuf>> = HashMap::new();
    for path in files {
        let stem = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => continue,
        };
        let chars: Vec<char> = stem.chars().collect();
        if chars.len() <= crop + 4 {
            continue;
        }
        let channel = match chars.get(1).and_then(|c| c.to_digit(10)) {
            Some(d) => d as u8,
            None => continue,
        };
        if !CHANNELS.contains(&channel) {
            continue;
        }
        let run_name: String = chars[crop..chars.len() - 4].iter().collect();

        if skip_first && run_name.contains("00000") {
            log::info!("skipping warm-up run {}", run_name);
            continue;
        }
        if !keyword.is_empty() && !run_name.contains(keyword) {
            continue;
        }
        groups.entry(run_name).or_default().insert(channel, path);
    }

    let mut runs: Vec<RunGroup> = groups
        .into_iter()
        .map(|(unique_name, files)| RunGroup { unique_name, files })
        .collect();
    runs.sort_by(|a, b| a.unique_name.cmp(&b.unique_name));
    Ok(runs)
}

/// Split a `<...>_AvsB_<...>` run name into the left (reference) and right
/// (under-test) sample names.
pub fn sample_names(unique_name: &str) -> Option<(String, String)> {
    let (left, right) = unique_name.split_once("vs")?;
    let a = left.rsplit('_').next().unwrap_or(left).to_string();
    let b = right.split('_').next().unwrap_or(right).to_string();
    Some((a, b))
}

/// Crystal length in mm encoded in the sample-B name.
///
/// The usual convention is `<length><suffix>` (e.g. `20a`). Two historical
/// sample ids predate it and remap to the 20 mm crystal; existing result
/// tables were produced with that remap, so it must never change.
pub fn crystal_length(sample_b: &str, working_on: &str) -> Option<i64> {
    if working_on == "2396" {
        // one-off comparison run against the 2396 sample
        return Some(20);
    }

    if sample_b.len() > 1 {
        if let Some(prefix) = sample_b.get(..sample_b.len() - 1) {
            if let Ok(length) = prefix.parse::<i64>() {
                return Some(length);
            }
        }
    }

    let prefix = sample_b.split(working_on).next()?;
    match prefix.parse::<i64>() {
        Ok(24044) | Ok(2396) => Some(20),
        Ok(length) => Some(length),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_descriptions() {
        assert_eq!(channel_description(3), Some("Delay between Left and right NINO"));
        assert_eq!(channel_description(6), None);
    }

    #[test]
    fn test_sample_names() {
        let (a, b) = sample_names("Run_12bvs20a_5mm").unwrap();
        assert_eq!(a, "12b");
        assert_eq!(b, "20a");
        assert!(sample_names("norunseparator").is_none());
    }

    #[test]
    fn test_crystal_length_convention() {
        assert_eq!(crystal_length("20a", "DOI"), Some(20));
        assert_eq!(crystal_length("15b", "DOI"), Some(15));
    }

    #[test]
    fn test_crystal_length_historical_remap() {
        assert_eq!(crystal_length("anything", "2396"), Some(20));
        assert_eq!(crystal_length("24044DOI5", "DOI"), Some(20));
        assert_eq!(crystal_length("2396DOI5", "DOI"), Some(20));
        assert_eq!(crystal_length("nonsense", "DOI"), None);
    }

    #[test]
    fn test_discover_runs_groups_channels() {
        let root = std::env::temp_dir().join("rustctr_discover_test");
        std::fs::create_dir_all(&root).unwrap();
        for (ch, run) in [(1, "Run_AvsB_00001"), (2, "Run_AvsB_00001"), (3, "Run_AvsB_00001"), (1, "Run_AvsB_00000")] {
            let name = format!("F{}{}.txt", ch, run);
            std::fs::write(root.join(name), "x;y\n").unwrap();
        }
        std::fs::write(root.join("outputlog.txt"), "guff\n").unwrap();

        let runs = discover_runs(&root, "", 2, true).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].unique_name, "Run_AvsB_00001");
        assert_eq!(runs[0].files.len(), 3);
        assert!(runs[0].channel(2).is_some());

        // warm-up run kept when skip_first is off
        let all = discover_runs(&root, "", 2, false).unwrap();
        assert_eq!(all.len(), 2);

        std::fs::remove_dir_all(&root).ok();
    }
}
