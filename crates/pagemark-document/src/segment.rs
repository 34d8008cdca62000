// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document segmentation — scans every page for the marker, computes the split
// boundaries and writes one output document per segment.

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pagemark_core::error::{PagemarkError, Result};
use pagemark_core::{AppConfig, Pattern};
use tracing::{info, instrument, warn};

use crate::detect::MarkerDetector;
use crate::library::{DocumentLibrary, PageDocument};
use crate::pdf::PdfLibrary;

/// Page-index boundaries of one document.
///
/// Ascending, deduplicated, and always terminated by the page count. A plan
/// holding only that final boundary splits nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPlan {
    boundaries: Vec<usize>,
}

impl SplitPlan {
    /// Build a plan from the 0-based indices of the marked pages.
    pub fn from_markers(markers: impl IntoIterator<Item = usize>, page_count: usize) -> Self {
        let mut boundaries: Vec<usize> = markers
            .into_iter()
            .filter(|&index| index < page_count)
            .collect();
        boundaries.sort_unstable();
        boundaries.dedup();
        boundaries.push(page_count);
        Self { boundaries }
    }

    pub fn boundaries(&self) -> &[usize] {
        &self.boundaries
    }

    pub fn has_splits(&self) -> bool {
        self.boundaries.len() > 1
    }

    /// Non-empty half-open page ranges, starting from page 0.
    pub fn segments(&self) -> Vec<Range<usize>> {
        let mut start = 0;
        let mut segments = Vec::with_capacity(self.boundaries.len());
        for &end in &self.boundaries {
            if start < end {
                segments.push(start..end);
                start = end;
            }
        }
        segments
    }
}

/// What [`Segmenter::split`] did to one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitOutcome {
    /// No marker found: nothing written, nothing deleted.
    Untouched,
    Split {
        outputs: Vec<PathBuf>,
        source_deleted: bool,
    },
}

impl SplitOutcome {
    pub fn outputs(&self) -> &[PathBuf] {
        match self {
            SplitOutcome::Untouched => &[],
            SplitOutcome::Split { outputs, .. } => outputs,
        }
    }
}

/// One document to segment.
#[derive(Debug, Clone)]
pub struct SegmentJob {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub pattern: Pattern,
    pub delete_source: bool,
}

/// Per-file results of [`Segmenter::process_directory`].
#[derive(Debug, Clone, Default)]
pub struct DirectoryReport {
    pub split: Vec<PathBuf>,
    pub untouched: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    /// Output documents written across all inputs.
    pub outputs: usize,
}

impl DirectoryReport {
    pub fn processed(&self) -> usize {
        self.split.len() + self.untouched.len()
    }
}

/// Splits documents at their marked pages.
#[derive(Clone)]
pub struct Segmenter {
    library: Arc<dyn DocumentLibrary>,
    config: AppConfig,
}

impl Segmenter {
    pub fn new(library: Arc<dyn DocumentLibrary>, config: &AppConfig) -> Self {
        Self {
            library,
            config: config.clone(),
        }
    }

    /// A segmenter backed by [`PdfLibrary`].
    pub fn pdf(config: &AppConfig) -> Self {
        Self::new(Arc::new(PdfLibrary::new()), config)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// `<output_dir>/<stem>_split_<n>.pdf`, `n` counting from 1.
    pub fn output_path(output_dir: &Path, stem: &str, n: usize) -> PathBuf {
        output_dir.join(format!("{stem}_split_{n}.pdf"))
    }

    /// Query the detector for every page in order.
    pub fn plan(&self, document: &dyn PageDocument, detector: &MarkerDetector) -> SplitPlan {
        let page_count = document.page_count();
        let markers = (0..page_count).filter(|&index| detector.page_has_marker(document, index));
        SplitPlan::from_markers(markers, page_count)
    }

    /// Segment one document.
    ///
    /// Output failures abort the job without removing segments already
    /// written. A source that cannot be deleted is only logged.
    #[instrument(skip(self, job), fields(input = %job.input.display()))]
    pub fn split(&self, job: &SegmentJob) -> Result<SplitOutcome> {
        let document = self.library.open(&job.input)?;
        let detector = MarkerDetector::new(job.pattern.clone(), &self.config.detector);
        let plan = self.plan(document.as_ref(), &detector);

        if !plan.has_splits() {
            info!(pages = document.page_count(), "no marker found; document left untouched");
            return Ok(SplitOutcome::Untouched);
        }

        fs::create_dir_all(&job.output_dir)?;
        let stem = job
            .input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".into());

        let mut outputs = Vec::new();
        for (n, range) in plan.segments().into_iter().enumerate() {
            let path = Self::output_path(&job.output_dir, &stem, n + 1);
            document.save_range(range.clone(), &path)?;
            info!(
                segment = n + 1,
                start = range.start,
                end = range.end,
                output = %path.display(),
                "segment written"
            );
            outputs.push(path);
        }
        // Release the source before deleting it.
        drop(document);

        let source_deleted = job.delete_source && delete_source(&job.input);
        Ok(SplitOutcome::Split {
            outputs,
            source_deleted,
        })
    }

    /// Documents in `dir`, sorted by name.
    pub fn list_documents(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(dir).map_err(|source| PagemarkError::InputDirUnavailable {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut documents: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter(|entry| self.config.is_document_name(&entry.file_name().to_string_lossy()))
            .map(|entry| entry.path())
            .collect();
        documents.sort();
        Ok(documents)
    }

    /// Segment every document of `input_dir`.
    ///
    /// `make_job` turns each input path into a job; failures of one file
    /// (job construction included) are recorded and the pass continues.
    #[instrument(skip(self, make_job), fields(dir = %input_dir.display()))]
    pub fn process_directory<F>(&self, input_dir: &Path, mut make_job: F) -> Result<DirectoryReport>
    where
        F: FnMut(PathBuf) -> Result<SegmentJob>,
    {
        let mut report = DirectoryReport::default();

        for input in self.list_documents(input_dir)? {
            let outcome = make_job(input.clone()).and_then(|job| self.split(&job));
            match outcome {
                Ok(SplitOutcome::Untouched) => report.untouched.push(input),
                Ok(SplitOutcome::Split { outputs, .. }) => {
                    report.outputs += outputs.len();
                    report.split.push(input);
                }
                Err(e) => {
                    warn!(input = %input.display(), error = %e, "segmentation failed");
                    report.failed.push((input, e.to_string()));
                }
            }
        }

        info!(
            split = report.split.len(),
            untouched = report.untouched.len(),
            failed = report.failed.len(),
            "directory pass complete"
        );
        Ok(report)
    }
}

fn delete_source(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "source deleted");
            true
        }
        Err(source) => {
            let err = PagemarkError::SourceDelete {
                path: path.to_path_buf(),
                source,
            };
            warn!(error = %err, "keeping source");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};

    use super::*;
    use crate::image::contour::tests::ring_raster;
    use crate::library::PageRect;
    use crate::raster::Raster;

    /// Corner points of a square, matching the ring fixture.
    fn square_pattern() -> Pattern {
        Pattern::from(vec![[0, 0], [40, 0], [40, 40], [0, 40]])
    }

    /// In-memory documents keyed by file name; marked pages render a ring.
    #[derive(Default)]
    struct FakeLibrary {
        documents: HashMap<String, (usize, BTreeSet<usize>)>,
    }

    impl FakeLibrary {
        fn with(mut self, name: &str, pages: usize, markers: &[usize]) -> Self {
            self.documents
                .insert(name.into(), (pages, markers.iter().copied().collect()));
            self
        }
    }

    struct FakeDoc {
        pages: usize,
        markers: BTreeSet<usize>,
    }

    impl DocumentLibrary for FakeLibrary {
        fn open(&self, path: &Path) -> Result<Box<dyn PageDocument>> {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let (pages, markers) =
                self.documents
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| PagemarkError::DocumentOpen {
                        path: path.to_path_buf(),
                        reason: "unknown fake document".into(),
                    })?;
            Ok(Box::new(FakeDoc { pages, markers }))
        }
    }

    impl PageDocument for FakeDoc {
        fn page_count(&self) -> usize {
            self.pages
        }
        fn page_bounds(&self, _index: usize) -> Result<PageRect> {
            Ok(PageRect::sized(595.0, 842.0))
        }
        fn render_region(&self, index: usize, _clip: PageRect, _zoom: f32) -> Result<Raster> {
            if self.markers.contains(&index) {
                Ok(ring_raster(200))
            } else {
                Ok(Raster::blank(200, 200))
            }
        }
        fn save_range(&self, pages: Range<usize>, path: &Path) -> Result<()> {
            fs::write(path, format!("{}..{}", pages.start, pages.end))?;
            Ok(())
        }
    }

    fn segmenter(library: FakeLibrary) -> Segmenter {
        Segmenter::new(Arc::new(library), &AppConfig::default())
    }

    fn job(input: PathBuf, output_dir: &Path, delete_source: bool) -> SegmentJob {
        SegmentJob {
            input,
            output_dir: output_dir.to_path_buf(),
            pattern: square_pattern(),
            delete_source,
        }
    }

    #[test]
    fn plan_from_markers() {
        let plan = SplitPlan::from_markers([5, 2, 5], 7);
        assert_eq!(plan.boundaries(), &[2, 5, 7]);
        assert_eq!(plan.segments(), vec![0..2, 2..5, 5..7]);

        let none = SplitPlan::from_markers([], 7);
        assert!(!none.has_splits());

        // A marker on the first page still yields the whole document once.
        let first = SplitPlan::from_markers([0], 3);
        assert_eq!(first.segments(), vec![0..3]);
    }

    #[test]
    fn markers_two_and_five_of_seven_pages() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("scan.pdf");
        fs::write(&input, b"fake").unwrap();
        let out = dir.path().join("out");

        let seg = segmenter(FakeLibrary::default().with("scan.pdf", 7, &[2, 5]));
        let outcome = seg.split(&job(input.clone(), &out, true)).unwrap();

        let expected: Vec<PathBuf> = (1..=3)
            .map(|n| out.join(format!("scan_split_{n}.pdf")))
            .collect();
        assert_eq!(
            outcome,
            SplitOutcome::Split {
                outputs: expected.clone(),
                source_deleted: true
            }
        );
        let ranges: Vec<String> = expected
            .iter()
            .map(|p| fs::read_to_string(p).unwrap())
            .collect();
        assert_eq!(ranges, vec!["0..2", "2..5", "5..7"]);
        assert!(!input.exists());
    }

    #[test]
    fn no_marker_keeps_source_even_with_delete() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("plain.pdf");
        fs::write(&input, b"fake").unwrap();
        let out = dir.path().join("out");

        let seg = segmenter(FakeLibrary::default().with("plain.pdf", 4, &[]));
        for _ in 0..2 {
            let outcome = seg.split(&job(input.clone(), &out, true)).unwrap();
            assert_eq!(outcome, SplitOutcome::Untouched);
        }
        assert!(input.exists());
        assert!(!out.exists());
    }

    #[test]
    fn detector_settings_come_from_the_app_config() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("scan.pdf");
        fs::write(&input, b"fake").unwrap();

        // Nothing is closer than distance zero.
        let mut config = AppConfig::default();
        config.detector.match_threshold = 0.0;
        let library = FakeLibrary::default().with("scan.pdf", 3, &[1]);
        let seg = Segmenter::new(Arc::new(library), &config);

        assert_eq!(seg.config().detector.match_threshold, 0.0);
        assert_eq!(
            seg.split(&job(input, dir.path(), false)).unwrap(),
            SplitOutcome::Untouched
        );
    }

    #[test]
    fn empty_pattern_never_splits() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("scan.pdf");
        fs::write(&input, b"fake").unwrap();

        let seg = segmenter(FakeLibrary::default().with("scan.pdf", 3, &[1]));
        let mut job = job(input, dir.path(), false);
        job.pattern = Pattern::empty();
        assert_eq!(seg.split(&job).unwrap(), SplitOutcome::Untouched);
    }

    #[test]
    fn delete_failure_does_not_fail_the_split() {
        let dir = tempfile::tempdir().unwrap();
        // The fake opens by name, so the file never has to exist on disk.
        let input = dir.path().join("ghost.pdf");
        let seg = segmenter(FakeLibrary::default().with("ghost.pdf", 2, &[1]));
        let outcome = seg.split(&job(input, dir.path(), true)).unwrap();
        assert!(matches!(
            outcome,
            SplitOutcome::Split {
                source_deleted: false,
                ..
            }
        ));
        assert_eq!(outcome.outputs().len(), 2);
    }

    #[test]
    fn directory_pass_contains_failures() {
        let dir = tempfile::tempdir().unwrap();
        let input_dir = dir.path().join("in");
        let out = dir.path().join("out");
        fs::create_dir_all(&input_dir).unwrap();
        for name in ["a.pdf", "b.PDF", "broken.pdf", "notes.txt"] {
            fs::write(input_dir.join(name), b"fake").unwrap();
        }

        let library = FakeLibrary::default()
            .with("a.pdf", 3, &[1])
            .with("b.PDF", 2, &[]);
        let seg = segmenter(library);
        let report = seg
            .process_directory(&input_dir, |input| Ok(job(input, &out, false)))
            .unwrap();

        assert_eq!(report.split, vec![input_dir.join("a.pdf")]);
        assert_eq!(report.untouched, vec![input_dir.join("b.PDF")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, input_dir.join("broken.pdf"));
        assert_eq!(report.outputs, 2);
        assert_eq!(report.processed(), 2);
    }

    #[test]
    fn missing_directory_is_reported() {
        let seg = segmenter(FakeLibrary::default());
        let err = seg
            .process_directory(Path::new("/no/such/dir"), |_| unreachable!("no documents to process"))
            .unwrap_err();
        assert!(matches!(err, PagemarkError::InputDirUnavailable { .. }));
    }
}
