//! crates/santri_core/src/rbac.rs
//!
//! Role-based access control. Roles form a closed set and every permission
//! check is a total, stateless function over that set, so it is re-evaluated
//! on every request.

use std::fmt;
use std::str::FromStr;

use crate::domain::Actor;
use crate::error::{DomainError, DomainResult};

//=========================================================================================
// Roles
//=========================================================================================

/// The community roles a user account can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Santri,
    WaliSantri,
    Asatidz,
    WaliKelas,
    Pengurus,
    Pengasuh,
    AdminTech,
    Admin,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Santri,
        Role::WaliSantri,
        Role::Asatidz,
        Role::WaliKelas,
        Role::Pengurus,
        Role::Pengasuh,
        Role::AdminTech,
        Role::Admin,
    ];

    /// The stable wire/storage name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Santri => "santri",
            Role::WaliSantri => "wali_santri",
            Role::Asatidz => "asatidz",
            Role::WaliKelas => "wali_kelas",
            Role::Pengurus => "pengurus",
            Role::Pengasuh => "pengasuh",
            Role::AdminTech => "admin_tech",
            Role::Admin => "admin",
        }
    }

    /// Whether this role holds `permission`.
    pub fn allows(&self, permission: Permission) -> bool {
        use Role::*;
        match permission {
            Permission::ManageHalaqoh => matches!(self, Pengurus | Pengasuh | AdminTech | Admin),
            Permission::RecordSetoran => matches!(self, Asatidz | WaliKelas | Pengasuh | Admin),
            Permission::ViewSantriProgress => !matches!(self, Santri),
            Permission::SubmitOwnHafalan => matches!(self, Santri),
            Permission::ManageAttendance => matches!(self, Pengurus | Pengasuh | AdminTech | Admin),
            Permission::ViewAttendanceLog => {
                matches!(self, WaliKelas | Pengurus | Pengasuh | AdminTech | Admin)
            }
            Permission::ScanAttendance => true,
            Permission::ManageUsers => matches!(self, AdminTech | Admin),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| DomainError::Validation(format!("unknown role '{}'", s)))
    }
}

//=========================================================================================
// Permissions
//=========================================================================================

/// Capabilities that guard domain operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ManageHalaqoh,
    RecordSetoran,
    ViewSantriProgress,
    SubmitOwnHafalan,
    ManageAttendance,
    ViewAttendanceLog,
    ScanAttendance,
    ManageUsers,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageHalaqoh => "manage_halaqoh",
            Permission::RecordSetoran => "record_setoran",
            Permission::ViewSantriProgress => "view_santri_progress",
            Permission::SubmitOwnHafalan => "submit_own_hafalan",
            Permission::ManageAttendance => "manage_attendance",
            Permission::ViewAttendanceLog => "view_attendance_log",
            Permission::ScanAttendance => "scan_attendance",
            Permission::ManageUsers => "manage_users",
        }
    }
}

pub fn can_manage_halaqoh(role: Role) -> bool {
    role.allows(Permission::ManageHalaqoh)
}

/// Instructors who may record and review setoran (hafalan submissions).
pub fn can_record_setoran(role: Role) -> bool {
    role.allows(Permission::RecordSetoran)
}

pub fn can_view_santri_progress(role: Role) -> bool {
    role.allows(Permission::ViewSantriProgress)
}

pub fn can_submit_own_hafalan(role: Role) -> bool {
    role.allows(Permission::SubmitOwnHafalan)
}

pub fn can_manage_attendance(role: Role) -> bool {
    role.allows(Permission::ManageAttendance)
}

pub fn can_view_attendance_log(role: Role) -> bool {
    role.allows(Permission::ViewAttendanceLog)
}

pub fn can_manage_users(role: Role) -> bool {
    role.allows(Permission::ManageUsers)
}

/// Fails with `DomainError::Authorization` unless the actor's role holds `permission`.
pub fn authorize(actor: &Actor, permission: Permission) -> DomainResult<()> {
    if actor.role.allows(permission) {
        return Ok(());
    }
    tracing::warn!(
        actor = %actor.id,
        role = %actor.role,
        permission = permission.as_str(),
        "permission denied"
    );
    Err(DomainError::Authorization(format!(
        "role '{}' may not {}",
        actor.role,
        permission.as_str().replace('_', " ")
    )))
}
