pub mod attendance;
pub mod domain;
pub mod error;
pub mod hafalan;
pub mod halaqoh;
pub mod ports;
pub mod rbac;

#[cfg(test)]
mod testing;

pub use attendance::{AttendanceResult, NewWindow, ScanPolicy};
pub use domain::{
    Actor, AttendanceEvent, AttendanceStatus, AttendanceWindow, AuthSession, Halaqoh,
    HalaqohMember, MemorizationSubmission, Review, ReviewDecision, SubmissionFilter,
    SubmissionStatus, User, UserCredentials, WeeklyProgress,
};
pub use error::{DomainError, DomainResult};
pub use hafalan::NewSubmission;
pub use ports::{
    AttendanceStore, Clock, DatabaseService, HafalanStore, HalaqohStore, PortError, PortResult,
    SystemClock, UserStore,
};
pub use rbac::{Permission, Role};
