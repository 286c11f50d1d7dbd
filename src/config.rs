use crate::chart::ChartKind;
use std::path::{Path, PathBuf};

/// A reactive library whose operator usage is analyzed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    /// Display name, also used to build output file names (e.g. `RxJava`)
    pub name: String,
    /// File under `operators/` holding the JSON array of the library's operators
    pub manifest: String,
    /// File under `operators-search/` holding the per-repository operator counts
    pub result: String,
}

impl Library {
    pub fn new(name: impl Into<String>, manifest: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            manifest: manifest.into(),
            result: result.into(),
        }
    }
}

/// Where the mined data lives and which libraries to process.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub assets_dir: PathBuf,
    pub libraries: Vec<Library>,
}

impl Default for Corpus {
    fn default() -> Self {
        Self::new("assets")
    }
}

impl Corpus {
    /// The RxJava, RxJS and RxSwift corpus rooted at `assets_dir`.
    pub fn new(assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            libraries: vec![
                Library::new("RxJava", "rxjava 3.1.1.json", "rxjava_Java.json"),
                Library::new("RxJS", "rxjs 7.3.0.json", "rxjs_JSX-JavaScript-TypeScript.json"),
                Library::new("RxSwift", "RxSwift.json", "rxswift_Swift.json"),
            ],
        }
    }

    pub fn operators_dir(&self) -> PathBuf {
        self.assets_dir.join("operators")
    }

    pub fn operators_search_dir(&self) -> PathBuf {
        self.assets_dir.join("operators-search")
    }

    pub fn posts_topic_dir(&self) -> PathBuf {
        self.assets_dir.join("so-data").join("posts-topic")
    }

    pub fn posts_operator_search_dir(&self) -> PathBuf {
        self.assets_dir.join("so-data").join("operators-search")
    }

    pub fn manifest_path(&self, library: &Library) -> PathBuf {
        self.operators_dir().join(&library.manifest)
    }

    pub fn result_path(&self, library: &Library) -> PathBuf {
        self.operators_search_dir().join(&library.result)
    }
}

/// Root of the generated artifacts. Each task owns one category directory below it.
#[derive(Debug, Clone)]
pub struct Output {
    pub results_dir: PathBuf,
}

impl Default for Output {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
        }
    }
}

impl Output {
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
        }
    }

    pub fn category(&self, name: &str) -> PathBuf {
        self.results_dir.join(name)
    }

    pub fn frequency_dir(&self) -> PathBuf {
        self.category("frequency")
    }

    pub fn similarity_dir(&self) -> PathBuf {
        self.category("similarity")
    }

    pub fn utilization_dir(&self) -> PathBuf {
        self.category("utilization")
    }

    pub fn utilization_distribution_dir(&self) -> PathBuf {
        self.category("utilization_perDistribution")
    }
}

#[derive(Debug, Clone)]
pub struct FrequencyConfig {
    /// How many operators the most/least used charts show
    pub samples: usize,
    /// Append manifest operators that never occur in the corpus with a count of 0
    pub include_manifest: bool,
    /// `Bar` or `HorizontalBar`
    pub chart_kind: ChartKind,
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            samples: 10,
            include_manifest: false,
            chart_kind: ChartKind::Bar,
        }
    }
}

/// A cluster of Stack Overflow posts sharing a discussion theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub id: u64,
    pub label: String,
}

impl Topic {
    pub fn new(id: u64, label: impl Into<String>) -> Self {
        Self { id, label: label.into() }
    }
}

/// Upper bound and tick step of a percentage y axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub max: f64,
    pub step: f64,
}

impl AxisRange {
    pub const fn new(max: f64, step: f64) -> Self {
        Self { max, step }
    }
}

#[derive(Debug, Clone)]
pub struct SimilarityConfig {
    /// Directory holding `frequencies_<lib>.json` written by the frequency task
    pub frequencies_dir: PathBuf,
    pub topics: Vec<Topic>,
    /// Size of the most/least used subsets compared by sequence matching
    pub samples: usize,
    pub chart_width: u32,
    pub overall_axis: AxisRange,
    pub most_used_axis: AxisRange,
    pub least_used_axis: AxisRange,
}

impl SimilarityConfig {
    pub fn new(frequencies_dir: impl AsRef<Path>) -> Self {
        Self {
            frequencies_dir: frequencies_dir.as_ref().to_path_buf(),
            topics: vec![
                Topic::new(5, "Introductory Questions"),
                Topic::new(19, "iOS or Mobile"),
                Topic::new(22, "Dependency Management"),
            ],
            samples: 15,
            chart_width: 600,
            overall_axis: AxisRange::new(20.0, 10.0),
            most_used_axis: AxisRange::new(100.0, 20.0),
            least_used_axis: AxisRange::new(60.0, 20.0),
        }
    }
}
