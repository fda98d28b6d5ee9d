mod report;

pub use report::{
    Category, Coordinates, LocationAccuracy, QueuedReport, ReportDraft, ReportKey, ReportPayload,
    Severity, LOW_ACCURACY_NOTE, REFRESHED_NOTE,
};
