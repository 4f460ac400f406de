//! Ownership and existence guards.
//!
//! Small predicate helpers applied before every mutating or reading
//! operation. Each guard answers exactly one question; callers compose
//! them and evaluate the results in the deterministic precedence order
//! missing-fields > invalid-id-format > not-found > not-owner >
//! business-rule, so that when several checks fail simultaneously the
//! reported error never depends on scheduling.
//!
//! Independent checks (for example "template exists" and "doctor is
//! active") are read-only and side-effect-free, so services issue them
//! concurrently with `tokio::join!` and only then evaluate the results:
//! a latency optimisation, not a correctness dependency.

use crate::doctors::{Doctor, DoctorDirectory};
use crate::error::{RecordError, RecordResult};
use expediente_types::EntityId;

/// Structural validity of an identifier string (not existence).
pub fn parse_identifier(raw: &str) -> RecordResult<EntityId> {
    EntityId::parse(raw).map_err(|_| RecordError::InvalidIdentifier)
}

/// Unwraps an entity looked up from the store, mapping absence to the
/// caller's not-found error.
pub fn require_found<T>(found: Option<T>, missing: RecordError) -> RecordResult<T> {
    found.ok_or(missing)
}

/// Checks that the requesting doctor owns the entity.
pub fn ensure_owner(owner: EntityId, requester: EntityId) -> RecordResult<()> {
    if owner == requester {
        Ok(())
    } else {
        Err(RecordError::NotOwner)
    }
}

/// Resolves a doctor role id and checks the doctor is active.
pub async fn active_doctor(
    directory: &dyn DoctorDirectory,
    role_id: EntityId,
) -> RecordResult<Doctor> {
    match directory.find_by_role_id(role_id).await? {
        Some(doctor) if doctor.is_active => Ok(doctor),
        _ => Err(RecordError::DoctorNotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doctors::StoreDoctorDirectory;
    use expediente_store::memory::MemoryStore;
    use std::sync::Arc;

    #[test]
    fn test_parse_identifier_maps_to_invalid_identifier() {
        let err = parse_identifier("1234").expect_err("short string should fail");
        assert!(matches!(err, RecordError::InvalidIdentifier));

        let id = EntityId::new();
        assert_eq!(parse_identifier(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn test_ensure_owner() {
        let owner = EntityId::new();
        ensure_owner(owner, owner).expect("owner should pass");

        let err = ensure_owner(owner, EntityId::new()).expect_err("stranger should fail");
        assert!(matches!(err, RecordError::NotOwner));
    }

    #[test]
    fn test_require_found() {
        assert_eq!(
            require_found(Some(3), RecordError::TemplateNotFound).unwrap(),
            3
        );
        let err = require_found::<i32>(None, RecordError::TemplateNotFound)
            .expect_err("absent should fail");
        assert!(matches!(err, RecordError::TemplateNotFound));
    }

    #[tokio::test]
    async fn test_active_doctor_rejects_inactive() {
        let directory = StoreDoctorDirectory::new(Arc::new(MemoryStore::new()));
        let id = EntityId::new();
        let mut doctor = crate::doctors::test_doctor(id);
        doctor.is_active = false;
        directory.register(doctor).await.unwrap();

        let err = active_doctor(&directory, id)
            .await
            .expect_err("inactive doctor should fail");
        assert!(matches!(err, RecordError::DoctorNotFound));
    }

    #[tokio::test]
    async fn test_active_doctor_rejects_unknown() {
        let directory = StoreDoctorDirectory::new(Arc::new(MemoryStore::new()));
        let err = active_doctor(&directory, EntityId::new())
            .await
            .expect_err("unknown doctor should fail");
        assert!(matches!(err, RecordError::DoctorNotFound));
    }
}
