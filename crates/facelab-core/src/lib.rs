//! facelab-core — Face recognition lab session model.
//!
//! Holds the wizard state machine, the lab log, image capture and the
//! analysis report classifier. All face analysis itself is delegated to an
//! [`InferenceBackend`].

pub mod capture;
pub mod report;
pub mod types;
pub mod wizard;

pub use capture::{capture_file, CaptureError, CapturedImage};
pub use types::{ComparisonResult, EnrollmentData, InferenceBackend, LabLog, LabRecord, LabStep};
pub use wizard::{Progress, Requirement, Wizard, WizardError};
