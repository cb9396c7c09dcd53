//! Infer a collection's naming convention from the files already in it.
//!
//! Every content file is matched against every catalog template. A template
//! scores `match_ratio * 100 + priority`; the strictly highest score wins and
//! catalog order settles exact ties. A broad template that fits most files
//! therefore beats a richer one that fits a few, while priority still decides
//! between templates that fit equally well.

use domain::pattern::{PathMatch, PatternTemplate, Sample};
use domain::DetectionResult;
use std::path::Path;
use tracing::{debug, warn};

use crate::discover::content_files;

const MAX_SAMPLES: usize = 3;

/// Scan `collection_path` and pick its naming pattern. Never fails: a missing
/// or unreadable directory counts as empty.
#[tracing::instrument(skip_all)]
pub fn detect(collection_path: &Path) -> DetectionResult {
    let files = match content_files(collection_path) {
        Ok(files) => files,
        Err(e) => {
            warn!("detect: cannot list {}: {e}", collection_path.display());
            Vec::new()
        }
    };
    detect_files(&files)
}

struct Tally {
    template: PatternTemplate,
    count: usize,
    samples: Vec<Sample>,
    /// Observed extensions with counts, in first-seen order.
    exts: Vec<(String, usize)>,
}

impl Tally {
    fn new(template: PatternTemplate) -> Self {
        Self {
            template,
            count: 0,
            samples: Vec::new(),
            exts: Vec::new(),
        }
    }

    fn record(&mut self, path: &str, m: PathMatch) {
        self.count += 1;
        match self.exts.iter_mut().find(|(e, _)| *e == m.ext) {
            Some((_, n)) => *n += 1,
            None => self.exts.push((m.ext, 1)),
        }
        if self.samples.len() < MAX_SAMPLES {
            self.samples.push(Sample {
                path: path.to_string(),
                tokens: m.tokens,
            });
        }
    }

    fn score(&self, total: usize) -> f64 {
        (self.count as f64 / total as f64) * 100.0 + f64::from(self.template.priority())
    }

    fn dominant_ext(&self) -> &str {
        self.exts
            .iter()
            .fold(None::<&(String, usize)>, |best, e| match best {
                Some(b) if b.1 >= e.1 => Some(b),
                _ => Some(e),
            })
            .map(|(e, _)| e.as_str())
            .unwrap_or("md")
    }
}

/// Score an explicit list of collection-relative, `/`-separated paths.
pub fn detect_files<S: AsRef<str>>(files: &[S]) -> DetectionResult {
    let total = files.len();
    if total == 0 {
        return DetectionResult::empty();
    }

    let mut tallies: Vec<Tally> = PatternTemplate::CATALOG
        .into_iter()
        .map(Tally::new)
        .collect();

    for path in files {
        let path = path.as_ref();
        for tally in tallies.iter_mut() {
            if let Some(m) = tally.template.matches(path) {
                tally.record(path, m);
            }
        }
    }

    let best = tallies
        .iter()
        .filter(|t| t.count > 0)
        .fold(None::<(&Tally, f64)>, |best, t| {
            let score = t.score(total);
            match best {
                Some((_, top)) if top >= score => best,
                _ => Some((t, score)),
            }
        });

    let Some((winner, score)) = best else {
        debug!("no catalog template matched any of {total} files");
        return DetectionResult {
            total_files: total,
            ..DetectionResult::empty()
        };
    };

    debug!(
        "detected {} ({}/{} files, score {score:.2})",
        winner.template.name(),
        winner.count,
        total
    );

    DetectionResult {
        pattern: winner.template.with_extension(winner.dominant_ext()),
        name: winner.template.name().to_string(),
        confidence: winner.count as f64 / total as f64,
        match_count: winner.count,
        total_files: total,
        samples: winner.samples.clone(),
    }
}
