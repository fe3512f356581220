//! Lab wizard controller.
//!
//! Owns all session state and is the only place it is mutated. Steps move
//! only on explicit calls; work operations run one inference call each and
//! log a [`LabRecord`] for their step.

use crate::types::{ComparisonResult, EnrollmentData, InferenceBackend, LabLog, LabRecord, LabStep};
use thiserror::Error;
use uuid::Uuid;

const DEMO_USER_NAME: &str = "演示用户_01";

const RECOGNIZE_OBSERVATION: &str = "通过上传人脸图像观察机器的感知过程。";
const REMEMBER_OBSERVATION: &str = "上传基准图像并将面部特征向量存入模拟数据库。";
const REMEMBER_RESULT: &str = "成功：已在系统注册面部指纹。";
const UNLOCK_OBSERVATION: &str = "上传新图像与注册图像进行生物特征比对。";
const UNLOCK_GRANTED: &str = "验证通过：门锁已开启";
const UNLOCK_DENIED: &str = "验证失败：禁止通行";

/// Prerequisite that must exist before leaving a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Analysis,
    Enrollment,
}

impl std::fmt::Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Requirement::Analysis => f.write_str("a face analysis"),
            Requirement::Enrollment => f.write_str("an enrolled face"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WizardError {
    #[error("cannot leave {from} without {requires}")]
    Gated { from: LabStep, requires: Requirement },
    #[error("an image is already being processed")]
    Busy,
    #[error("no face enrolled; complete the REMEMBER step first")]
    NotEnrolled,
    #[error("already at the first step")]
    AtStart,
    #[error("already at the last step; restart to begin again")]
    AtEnd,
    #[error("{action} is only available from {expected} (current: {current})")]
    WrongStep {
        action: &'static str,
        expected: LabStep,
        current: LabStep,
    },
}

/// Progress indicator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub number: usize,
    pub total: usize,
    pub percent: u8,
}

pub struct Wizard<B> {
    backend: B,
    session_id: Uuid,
    step: LabStep,
    enrollment: Option<EnrollmentData>,
    records: LabLog,
    analysis: Option<String>,
    comparison: Option<ComparisonResult>,
    processing: bool,
}

impl<B: InferenceBackend> Wizard<B> {
    pub fn new(backend: B) -> Self {
        let session_id = Uuid::new_v4();
        tracing::info!(%session_id, "lab session created");
        Self {
            backend,
            session_id,
            step: LabStep::Intro,
            enrollment: None,
            records: LabLog::new(),
            analysis: None,
            comparison: None,
            processing: false,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn step(&self) -> LabStep {
        self.step
    }

    pub fn enrollment(&self) -> Option<&EnrollmentData> {
        self.enrollment.as_ref()
    }

    pub fn records(&self) -> &LabLog {
        &self.records
    }

    pub fn analysis(&self) -> Option<&str> {
        self.analysis.as_deref()
    }

    pub fn comparison(&self) -> Option<&ComparisonResult> {
        self.comparison.as_ref()
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn progress(&self) -> Progress {
        let total = LabStep::ALL.len();
        let number = self.step.number();
        Progress {
            number,
            total,
            percent: ((number * 100) as f64 / total as f64).round() as u8,
        }
    }

    // --- navigation ---

    /// INTRO → RECOGNIZE.
    pub fn start(&mut self) -> Result<LabStep, WizardError> {
        if self.step != LabStep::Intro {
            return Err(WizardError::WrongStep {
                action: "start",
                expected: LabStep::Intro,
                current: self.step,
            });
        }
        Ok(self.move_to(LabStep::Recognize))
    }

    /// The requirement still blocking the "next" control, if any.
    pub fn blocked_by(&self) -> Option<Requirement> {
        match self.step {
            LabStep::Recognize if self.analysis.is_none() => Some(Requirement::Analysis),
            LabStep::Remember if self.enrollment.is_none() => Some(Requirement::Enrollment),
            _ => None,
        }
    }

    pub fn can_advance(&self) -> bool {
        self.step.next().is_some() && self.blocked_by().is_none()
    }

    /// Move to the next step, honouring the gate on the current one.
    pub fn advance(&mut self) -> Result<LabStep, WizardError> {
        let next = self.step.next().ok_or(WizardError::AtEnd)?;
        if let Some(requires) = self.blocked_by() {
            tracing::debug!(from = %self.step, %requires, "advance rejected");
            return Err(WizardError::Gated {
                from: self.step,
                requires,
            });
        }
        Ok(self.move_to(next))
    }

    pub fn back(&mut self) -> Result<LabStep, WizardError> {
        let prev = self.step.prev().ok_or(WizardError::AtStart)?;
        Ok(self.move_to(prev))
    }

    /// Free jump from the progress indicator. Bypasses every gate.
    pub fn jump(&mut self, step: LabStep) -> LabStep {
        self.move_to(step)
    }

    /// Clear the session and return to INTRO.
    pub fn restart(&mut self) -> LabStep {
        self.enrollment = None;
        self.records.clear();
        self.comparison = None;
        self.analysis = None;
        tracing::info!(session_id = %self.session_id, "lab session restarted");
        self.move_to(LabStep::Intro)
    }

    fn move_to(&mut self, step: LabStep) -> LabStep {
        tracing::debug!(from = %self.step, to = %step, "step change");
        self.step = step;
        step
    }

    // --- work steps ---

    /// Describe `image` and record the analysis for RECOGNIZE.
    pub async fn recognize(&mut self, image: &str) -> Result<&str, WizardError> {
        let busy = BusyGuard::acquire(&mut self.processing)?;
        self.analysis = None;

        let text = self.backend.describe(image).await;
        drop(busy);

        tracing::info!(
            session_id = %self.session_id,
            image_len = image.len(),
            reply_len = text.len(),
            "recognize completed"
        );
        self.records.upsert(LabRecord {
            step: LabStep::Recognize,
            observation: RECOGNIZE_OBSERVATION.into(),
            result: text.clone(),
        });
        Ok(self.analysis.insert(text).as_str())
    }

    /// Register `image` as the reference face. No inference call is made.
    pub async fn enroll(&mut self, image: &str) -> Result<&EnrollmentData, WizardError> {
        let busy = BusyGuard::acquire(&mut self.processing)?;

        let enrollment = EnrollmentData {
            name: DEMO_USER_NAME.into(),
            face_image: image.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        drop(busy);

        tracing::info!(
            session_id = %self.session_id,
            image_len = image.len(),
            replaced = self.enrollment.is_some(),
            "face enrolled"
        );
        self.records.upsert(LabRecord {
            step: LabStep::Remember,
            observation: REMEMBER_OBSERVATION.into(),
            result: REMEMBER_RESULT.into(),
        });
        Ok(self.enrollment.insert(enrollment))
    }

    /// Compare `image` against the enrolled face and record the outcome.
    pub async fn unlock(&mut self, image: &str) -> Result<&ComparisonResult, WizardError> {
        if self.processing {
            return Err(WizardError::Busy);
        }
        let reference = self
            .enrollment
            .as_ref()
            .map(|e| e.face_image.clone())
            .ok_or(WizardError::NotEnrolled)?;
        let busy = BusyGuard::acquire(&mut self.processing)?;
        self.comparison = None;

        let result = self.backend.compare(&reference, image).await;
        drop(busy);

        tracing::info!(
            session_id = %self.session_id,
            matched = result.matched,
            similarity = result.similarity,
            "unlock attempt completed"
        );
        self.records.upsert(LabRecord {
            step: LabStep::Unlock,
            observation: UNLOCK_OBSERVATION.into(),
            result: (if result.matched { UNLOCK_GRANTED } else { UNLOCK_DENIED }).into(),
        });
        Ok(self.comparison.insert(result))
    }

}

/// Holds the processing flag for one work operation and clears it on drop,
/// including when the operation's future is dropped before completion.
struct BusyGuard<'a>(&'a mut bool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a mut bool) -> Result<Self, WizardError> {
        if *flag {
            return Err(WizardError::Busy);
        }
        *flag = true;
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Backend that replies with canned values and records every call.
    #[derive(Default)]
    struct RecordingBackend {
        describe_reply: String,
        compare_reply: Option<ComparisonResult>,
        describe_calls: Mutex<Vec<String>>,
        compare_calls: Mutex<Vec<(String, String)>>,
    }

    impl InferenceBackend for RecordingBackend {
        async fn describe(&self, image: &str) -> String {
            self.describe_calls.lock().unwrap().push(image.to_string());
            self.describe_reply.clone()
        }

        async fn compare(&self, reference: &str, candidate: &str) -> ComparisonResult {
            self.compare_calls
                .lock()
                .unwrap()
                .push((reference.to_string(), candidate.to_string()));
            self.compare_reply.clone().unwrap_or(ComparisonResult {
                matched: false,
                similarity: 0.0,
                explanation: "none".into(),
            })
        }
    }

    fn backend(describe: &str, matched: bool) -> RecordingBackend {
        RecordingBackend {
            describe_reply: describe.into(),
            compare_reply: Some(ComparisonResult {
                matched,
                similarity: if matched { 92.0 } else { 12.0 },
                explanation: "explanation".into(),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_start_only_from_intro() {
        let mut w = Wizard::new(backend("t", true));
        assert_eq!(w.start(), Ok(LabStep::Recognize));
        assert!(matches!(w.start(), Err(WizardError::WrongStep { .. })));
    }

    #[tokio::test]
    async fn test_recognize_gates_advance() {
        let mut w = Wizard::new(backend("T", true));
        w.start().unwrap();

        assert!(!w.can_advance());
        assert_eq!(
            w.advance(),
            Err(WizardError::Gated {
                from: LabStep::Recognize,
                requires: Requirement::Analysis
            })
        );
        assert_eq!(w.step(), LabStep::Recognize);

        w.recognize("data:image/png;base64,A").await.unwrap();
        assert!(w.can_advance());
        assert_eq!(w.advance(), Ok(LabStep::Remember));
    }

    #[tokio::test]
    async fn test_remember_gates_advance() {
        let mut w = Wizard::new(backend("T", true));
        w.jump(LabStep::Remember);

        assert_eq!(w.blocked_by(), Some(Requirement::Enrollment));
        assert!(w.advance().is_err());
        assert_eq!(w.step(), LabStep::Remember);

        w.enroll("B").await.unwrap();
        assert_eq!(w.advance(), Ok(LabStep::Unlock));
    }

    #[test]
    fn test_unlock_to_report_is_unconditional() {
        let mut w = Wizard::new(backend("T", true));
        w.jump(LabStep::Unlock);
        assert!(w.comparison().is_none());
        assert_eq!(w.advance(), Ok(LabStep::Report));
        assert_eq!(w.advance(), Err(WizardError::AtEnd));
    }

    #[test]
    fn test_jump_bypasses_gates_and_back() {
        let mut w = Wizard::new(backend("T", true));
        assert_eq!(w.jump(LabStep::Report), LabStep::Report);
        assert_eq!(w.back(), Ok(LabStep::Unlock));
        w.jump(LabStep::Intro);
        assert_eq!(w.back(), Err(WizardError::AtStart));
    }

    #[tokio::test]
    async fn test_unlock_requires_enrollment() {
        let mut w = Wizard::new(backend("T", true));
        w.jump(LabStep::Unlock);
        assert_eq!(w.unlock("C").await.unwrap_err(), WizardError::NotEnrolled);
        assert!(w.backend().compare_calls.lock().unwrap().is_empty());
        assert!(w.records().is_empty());
        assert!(!w.is_processing());
    }

    #[tokio::test]
    async fn test_busy_rejects_second_capture() {
        let mut w = Wizard::new(backend("T", true));
        w.processing = true;
        assert_eq!(w.recognize("A").await.unwrap_err(), WizardError::Busy);
        assert_eq!(w.enroll("B").await.unwrap_err(), WizardError::Busy);
        assert_eq!(w.unlock("C").await.unwrap_err(), WizardError::Busy);
        assert!(w.backend().describe_calls.lock().unwrap().is_empty());
    }

    /// Backend whose describe call never completes.
    struct StalledBackend;

    impl InferenceBackend for StalledBackend {
        async fn describe(&self, _image: &str) -> String {
            std::future::pending().await
        }

        async fn compare(&self, _reference: &str, _candidate: &str) -> ComparisonResult {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_abandoned_call_releases_busy_flag() {
        let mut w = Wizard::new(StalledBackend);
        let abandoned =
            tokio::time::timeout(std::time::Duration::from_millis(20), w.recognize("A")).await;
        assert!(abandoned.is_err());
        assert!(!w.is_processing());
        assert!(w.analysis().is_none());
        assert!(w.records().is_empty());

        w.enroll("B").await.unwrap();
        let abandoned =
            tokio::time::timeout(std::time::Duration::from_millis(20), w.unlock("C")).await;
        assert!(abandoned.is_err());
        assert!(!w.is_processing());
        assert!(w.comparison().is_none());
    }

    #[tokio::test]
    async fn test_re_enroll_overwrites() {
        let mut w = Wizard::new(backend("T", true));
        w.enroll("first").await.unwrap();
        w.enroll("second").await.unwrap();
        assert_eq!(w.enrollment().unwrap().face_image, "second");
        assert_eq!(w.enrollment().unwrap().name, DEMO_USER_NAME);
        assert_eq!(w.records().len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_recognize_replaces_record_in_place() {
        let mut w = Wizard::new(backend("T", false));
        w.recognize("A").await.unwrap();
        w.enroll("B").await.unwrap();
        w.recognize("A2").await.unwrap();

        let steps: Vec<_> = w.records().iter().map(|r| r.step).collect();
        assert_eq!(steps, vec![LabStep::Recognize, LabStep::Remember]);
        assert_eq!(w.backend().describe_calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_unlock_recorded_as_denied() {
        let mut w = Wizard::new(backend("T", false));
        w.enroll("B").await.unwrap();
        let result = w.unlock("C").await.unwrap();
        assert!(!result.matched);
        assert_eq!(w.records().get(LabStep::Unlock).unwrap().result, UNLOCK_DENIED);
    }

    #[tokio::test]
    async fn test_restart_clears_session() {
        let mut w = Wizard::new(backend("T", true));
        w.start().unwrap();
        w.recognize("A").await.unwrap();
        w.enroll("B").await.unwrap();
        w.unlock("C").await.unwrap();
        w.jump(LabStep::Report);

        assert_eq!(w.restart(), LabStep::Intro);
        assert_eq!(w.step(), LabStep::Intro);
        assert!(w.enrollment().is_none());
        assert!(w.records().is_empty());
        assert!(w.comparison().is_none());
        assert!(w.analysis().is_none());
    }

    #[test]
    fn test_progress() {
        let mut w = Wizard::new(backend("T", true));
        assert_eq!(w.progress(), Progress { number: 1, total: 5, percent: 20 });
        w.jump(LabStep::Remember);
        assert_eq!(w.progress(), Progress { number: 3, total: 5, percent: 60 });
    }

    #[tokio::test]
    async fn test_full_lab_flow() {
        let mut w = Wizard::new(backend("面部分析文本", true));
        assert_eq!(w.step(), LabStep::Intro);
        w.start().unwrap();

        let text = w.recognize("image-A").await.unwrap().to_string();
        assert_eq!(text, "面部分析文本");
        let rec = w.records().get(LabStep::Recognize).unwrap();
        assert_eq!(rec.result, "面部分析文本");
        assert_eq!(rec.observation, RECOGNIZE_OBSERVATION);
        assert!(w.can_advance());
        w.advance().unwrap();

        w.enroll("image-B").await.unwrap();
        assert_eq!(w.enrollment().unwrap().face_image, "image-B");
        assert_eq!(w.records().get(LabStep::Remember).unwrap().result, REMEMBER_RESULT);
        w.advance().unwrap();

        let result = w.unlock("image-C").await.unwrap();
        assert!(result.matched);
        assert_eq!(
            *w.backend().compare_calls.lock().unwrap(),
            vec![("image-B".to_string(), "image-C".to_string())]
        );
        assert_eq!(w.records().get(LabStep::Unlock).unwrap().result, UNLOCK_GRANTED);

        assert_eq!(w.advance(), Ok(LabStep::Report));
        let steps: Vec<_> = w.records().iter().map(|r| r.step).collect();
        assert_eq!(steps, vec![LabStep::Recognize, LabStep::Remember, LabStep::Unlock]);
        assert!(!w.is_processing());
    }
}
