//! Exit code logic for the downloader process.

use std::process::ExitCode;

use series_downloader::AcquisitionStatus;

/// Process exit outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    Success,
    Partial,
    Failure,
}

impl ProcessExit {
    pub(crate) fn code(self) -> ExitCode {
        match self {
            Self::Success => ExitCode::SUCCESS,
            Self::Failure => ExitCode::from(1),
            Self::Partial => ExitCode::from(2),
        }
    }
}

impl From<AcquisitionStatus> for ProcessExit {
    fn from(status: AcquisitionStatus) -> Self {
        match status {
            AcquisitionStatus::Success => Self::Success,
            AcquisitionStatus::Partial => Self::Partial,
            AcquisitionStatus::Failed => Self::Failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_outcome_follows_status() {
        assert_eq!(ProcessExit::from(AcquisitionStatus::Success), ProcessExit::Success);
        assert_eq!(ProcessExit::from(AcquisitionStatus::Partial), ProcessExit::Partial);
        assert_eq!(ProcessExit::from(AcquisitionStatus::Failed), ProcessExit::Failure);
    }
}
