//! Analysis report classifier.
//!
//! Splits the free-text reply of the describe operation into lines and tags
//! each line with a presentation category using keyword heuristics. The
//! upstream model's wording is not stable, so the result is only ever used
//! for display.

use serde::Serialize;

const FEATURE_KEYWORDS: &[&str] = &[
    "特征点", "瞳孔", "鼻尖", "嘴角", "landmark", "pupil", "nose tip", "mouth corner",
];
const FINGERPRINT_KEYWORDS: &[&str] = &[
    "嵌入向量", "面部指纹", "数值化", "embedding", "fingerprint", "vector",
];
const QUALITY_KEYWORDS: &[&str] = &[
    "光照", "质量", "拍摄", "评价", "lighting", "quality", "exposure",
];

/// Presentation category of one report line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SectionKind {
    Numbered { number: u32 },
    Features,
    Fingerprint,
    Quality,
    General,
}

impl SectionKind {
    /// Icon shown beside the section. Numbered items use their number instead.
    pub fn icon(&self) -> String {
        match self {
            SectionKind::Numbered { number } => format!("({number})"),
            SectionKind::Features => "🔍".into(),
            SectionKind::Fingerprint => "🧬".into(),
            SectionKind::Quality => "⚡".into(),
            SectionKind::General => "📋".into(),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            SectionKind::Features => "面部特征检测",
            SectionKind::Fingerprint => "生物特征编码",
            SectionKind::Quality => "图像质量评估",
            SectionKind::Numbered { .. } | SectionKind::General => "分析结果",
        }
    }

    /// Whether a heading is rendered above the content.
    pub fn has_heading(&self) -> bool {
        !matches!(self, SectionKind::Numbered { .. } | SectionKind::General)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Position among the non-empty lines.
    pub index: usize,
    pub kind: SectionKind,
    pub content: String,
}

/// Classify every non-empty line of `text`.
pub fn classify(text: &str) -> Vec<Section> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| classify_line(index, line))
        .collect()
}

fn classify_line(index: usize, line: &str) -> Section {
    if let Some((number, content)) = split_numbered(line) {
        return Section {
            index,
            kind: SectionKind::Numbered { number },
            content: content.to_string(),
        };
    }

    let lower = line.to_lowercase();
    let has_any = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    let kind = if has_any(FEATURE_KEYWORDS) {
        SectionKind::Features
    } else if has_any(FINGERPRINT_KEYWORDS) {
        SectionKind::Fingerprint
    } else if has_any(QUALITY_KEYWORDS) {
        SectionKind::Quality
    } else {
        SectionKind::General
    };

    Section {
        index,
        kind,
        content: line.to_string(),
    }
}

/// Split `"3. text"` (or `"3、text"`) into `(3, "text")`.
///
/// The marker must be followed by non-empty content.
fn split_numbered(line: &str) -> Option<(u32, &str)> {
    let digits_end = line
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)?;
    if digits_end == 0 {
        return None;
    }
    let number = line[..digits_end].parse().ok()?;
    let rest = &line[digits_end..];
    let rest = rest
        .strip_prefix('.')
        .or_else(|| rest.strip_prefix('、'))?
        .trim_start();
    if rest.is_empty() {
        return None;
    }
    Some((number, rest))
}
