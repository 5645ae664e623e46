//! In-memory credential-health sink

use std::sync::Mutex;

use switchboard_core::{CredentialHealth, ErrorKind, ProviderErrorInfo};

/// Keeps every report for later assertions
#[derive(Debug, Default)]
pub struct RecordingHealth {
    reports: Mutex<Vec<ProviderErrorInfo>>,
}

impl RecordingHealth {
    pub fn reports(&self) -> Vec<ProviderErrorInfo> {
        self.reports.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.reports().iter().map(|r| r.error_kind).collect()
    }
}

impl CredentialHealth for RecordingHealth {
    fn report_error(&self, info: ProviderErrorInfo) {
        self.reports.lock().unwrap().push(info);
    }
}
