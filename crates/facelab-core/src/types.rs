use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;

/// One step of the lab wizard, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LabStep {
    Intro,
    Recognize,
    Remember,
    Unlock,
    Report,
}

impl LabStep {
    pub const ALL: [LabStep; 5] = [
        LabStep::Intro,
        LabStep::Recognize,
        LabStep::Remember,
        LabStep::Unlock,
        LabStep::Report,
    ];

    /// 0-based ordinal.
    pub fn index(self) -> usize {
        self as usize
    }

    /// 1-based ordinal, as shown on the progress indicator.
    pub fn number(self) -> usize {
        self.index() + 1
    }

    pub fn from_number(n: usize) -> Option<Self> {
        n.checked_sub(1).and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn prev(self) -> Option<Self> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }

    pub fn title(self) -> &'static str {
        match self {
            LabStep::Intro => "实验介绍",
            LabStep::Recognize => "人脸识别",
            LabStep::Remember => "人脸注册",
            LabStep::Unlock => "身份验证",
            LabStep::Report => "实验报告",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            LabStep::Intro => "了解人脸识别原理",
            LabStep::Recognize => "观察AI如何识别面部",
            LabStep::Remember => "注册面部信息",
            LabStep::Unlock => "验证身份安全性",
            LabStep::Report => "总结学习成果",
        }
    }

    /// Heading used for this step's entry in the summary report.
    pub fn record_title(self) -> &'static str {
        match self {
            LabStep::Recognize => "人脸特征感知",
            LabStep::Remember => "特征库注册",
            LabStep::Unlock => "生物特征验证",
            LabStep::Intro => "INTRO",
            LabStep::Report => "REPORT",
        }
    }

    fn name(self) -> &'static str {
        match self {
            LabStep::Intro => "INTRO",
            LabStep::Recognize => "RECOGNIZE",
            LabStep::Remember => "REMEMBER",
            LabStep::Unlock => "UNLOCK",
            LabStep::Report => "REPORT",
        }
    }
}

impl fmt::Display for LabStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown lab step: {0}")]
pub struct ParseStepError(pub String);

impl FromStr for LabStep {
    type Err = ParseStepError;

    /// Accepts a step name (case-insensitive) or its 1-based number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(n) = s.parse::<usize>() {
            return Self::from_number(n).ok_or_else(|| ParseStepError(s.to_string()));
        }
        Self::ALL
            .into_iter()
            .find(|step| step.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseStepError(s.to_string()))
    }
}

/// The single enrolled reference face for this session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentData {
    pub name: String,
    /// Reference image as a data-URI.
    pub face_image: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

/// An (observation, result) pair logged by one wizard step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabRecord {
    pub step: LabStep,
    pub observation: String,
    pub result: String,
}

/// Ordered lab log holding at most one record per step.
///
/// Records are kept in step order. Writing a record for a step that is
/// already present replaces it in place.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LabLog {
    records: Vec<LabRecord>,
}

impl LabLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, record: LabRecord) {
        if let Some(existing) = self.records.iter_mut().find(|r| r.step == record.step) {
            *existing = record;
            return;
        }
        let pos = self
            .records
            .iter()
            .position(|r| r.step > record.step)
            .unwrap_or(self.records.len());
        self.records.insert(pos, record);
    }

    pub fn get(&self, step: LabStep) -> Option<&LabRecord> {
        self.records.iter().find(|r| r.step == step)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// Outcome of a 1:1 face comparison as reported by the inference service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    #[serde(rename = "match")]
    pub matched: bool,
    /// Similarity score in [0, 100].
    pub similarity: f64,
    pub explanation: String,
}

impl ComparisonResult {
    /// Lit state of an `n`-bar similarity spectrum.
    ///
    /// Bar `i` is lit when the score reaches `i * 100 / n`.
    pub fn spectrum(&self, bars: usize) -> Vec<bool> {
        if bars == 0 {
            return Vec::new();
        }
        let step = 100.0 / bars as f64;
        (0..bars).map(|i| self.similarity >= i as f64 * step).collect()
    }
}

/// Remote multimodal service that performs all image analysis.
///
/// Both operations always produce a usable value: implementations degrade
/// transport and parse failures into fixed fallback values instead of
/// returning errors.
pub trait InferenceBackend {
    /// Describe the facial features of one image (a data-URI).
    fn describe(&self, image: &str) -> impl Future<Output = String> + Send;

    /// Decide whether two images (data-URIs) show the same person.
    fn compare(
        &self,
        reference: &str,
        candidate: &str,
    ) -> impl Future<Output = ComparisonResult> + Send;
}
