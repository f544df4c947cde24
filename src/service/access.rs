// service/access.rs
use uuid::Uuid;

use crate::{
    models::usermodel::{Actor, UserRole},
    service::error::ServiceError,
};

pub fn require_role(actor: &Actor, roles: &[UserRole], action: &'static str) -> Result<(), ServiceError> {
    if actor.has_any_role(roles) {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied(actor.role, action))
    }
}

/// Technicians may only look at their own money; admins may look at anyone's.
pub fn require_self_or_admin(actor: &Actor, technician_id: Uuid, action: &'static str) -> Result<(), ServiceError> {
    if actor.is_admin() {
        return Ok(());
    }
    if actor.role != UserRole::Technician {
        return Err(ServiceError::PermissionDenied(actor.role, action));
    }
    if actor.user_id != technician_id {
        return Err(ServiceError::Ownership(actor.user_id, technician_id));
    }
    Ok(())
}
