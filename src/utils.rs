use std::{fs, io};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::{Duration, Instant};

/// Non-empty lines of a text file, trimmed.
pub(crate) fn file_to_vec(filename: &Path) -> io::Result<Vec<String>> {
    let file_in = fs::File::open(filename)?;
    let file_reader = BufReader::new(file_in);
    Ok(file_reader
        .lines()
        .map_while(io::Result::ok)
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect())
}

/// Logs the time spent since `stage_start` (and since `tick_start` overall), returns the step duration.
pub(crate) fn trace(profile: bool, l_type: &str, l_step: &str, tick_start: Instant, stage_start: Instant) -> Duration {
    let step = stage_start.elapsed();
    if profile {
        log::debug!("{} | Total={:.2?} | {}={:.2?}", l_type, tick_start.elapsed(), l_step, step);
    }
    else {
        log::trace!("{} | Total={:.2?} | {}={:.2?}", l_type, tick_start.elapsed(), l_step, step);
    }
    step
}
