// models/technicianmodel.rs
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::commissionmodel::CommissionKind;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "technician_kind", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TechnicianKind {
    Freelancer,
    Internal,
}

/// How a technician is compensated. Resolved once per technician and passed
/// explicitly into the commission engine.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateProfile {
    Freelancer {
        commission_rate: BigDecimal,
    },
    Internal {
        bonus_rate: BigDecimal,
        base_salary: i64,
    },
}

impl RateProfile {
    pub fn kind(&self) -> TechnicianKind {
        match self {
            RateProfile::Freelancer { .. } => TechnicianKind::Freelancer,
            RateProfile::Internal { .. } => TechnicianKind::Internal,
        }
    }

    pub fn commission_kind(&self) -> CommissionKind {
        match self {
            RateProfile::Freelancer { .. } => CommissionKind::Commission,
            RateProfile::Internal { .. } => CommissionKind::Bonus,
        }
    }

    pub fn rate(&self) -> &BigDecimal {
        match self {
            RateProfile::Freelancer { commission_rate } => commission_rate,
            RateProfile::Internal { bonus_rate, .. } => bonus_rate,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Technician {
    pub id: Uuid,
    pub profile: RateProfile,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Flat row shape of the `technicians` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TechnicianRow {
    pub id: Uuid,
    pub kind: TechnicianKind,
    pub commission_rate: Option<BigDecimal>,
    pub bonus_rate: Option<BigDecimal>,
    pub base_salary: Option<i64>,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TechnicianRow> for Technician {
    type Error = String;

    fn try_from(row: TechnicianRow) -> Result<Self, Self::Error> {
        let profile = match row.kind {
            TechnicianKind::Freelancer => RateProfile::Freelancer {
                commission_rate: row
                    .commission_rate
                    .ok_or_else(|| format!("freelancer {} has no commission rate", row.id))?,
            },
            TechnicianKind::Internal => RateProfile::Internal {
                bonus_rate: row
                    .bonus_rate
                    .ok_or_else(|| format!("internal technician {} has no bonus rate", row.id))?,
                base_salary: row.base_salary.unwrap_or(0),
            },
        };

        Ok(Technician {
            id: row.id,
            profile,
            is_blocked: row.is_blocked,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&Technician> for TechnicianRow {
    fn from(technician: &Technician) -> Self {
        let (commission_rate, bonus_rate, base_salary) = match &technician.profile {
            RateProfile::Freelancer { commission_rate } => (Some(commission_rate.clone()), None, None),
            RateProfile::Internal { bonus_rate, base_salary } => {
                (None, Some(bonus_rate.clone()), Some(*base_salary))
            }
        };

        TechnicianRow {
            id: technician.id,
            kind: technician.profile.kind(),
            commission_rate,
            bonus_rate,
            base_salary,
            is_blocked: technician.is_blocked,
            created_at: technician.created_at,
            updated_at: technician.updated_at,
        }
    }
}
