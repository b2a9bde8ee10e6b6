//! Medication registry and appointment calendar.
//!
//! `CarePlan` validates and stamps new medications and appointments, and
//! answers the two date-relative questions about them: which medications are
//! current today, and which appointments fall in the coming days.

use crate::{AppointmentStore, MedicationStore};
use chrono::{Duration, NaiveDate, NaiveTime};
use medsage_core::{
    new_entity_id, Appointment, AppointmentStatus, Clock, EntityId, Medication, MedsageResult,
    UserId, ValidationError,
};
use std::sync::Arc;
use tracing::debug;

/// Days ahead covered by [`CarePlan::upcoming_appointments`] by default.
pub const UPCOMING_APPOINTMENT_DAYS: u32 = 30;

/// A medication to register.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMedication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub notes: String,
}

/// A visit to book.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAppointment {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub doctor: String,
    pub purpose: String,
    pub location: String,
    pub notes: String,
}

pub struct CarePlan {
    medications: Arc<dyn MedicationStore>,
    appointments: Arc<dyn AppointmentStore>,
    clock: Arc<dyn Clock>,
}

impl CarePlan {
    pub fn new(
        medications: Arc<dyn MedicationStore>,
        appointments: Arc<dyn AppointmentStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            medications,
            appointments,
            clock,
        }
    }

    /// Register a medication as active.
    ///
    /// # Errors
    /// Name, dosage and frequency are required. The end date, when given,
    /// may not precede the start date.
    pub async fn add_medication(
        &self,
        user_id: &UserId,
        new: NewMedication,
    ) -> MedsageResult<EntityId> {
        let name = required("name", &new.name)?;
        let dosage = required("dosage", &new.dosage)?;
        let frequency = required("frequency", &new.frequency)?;
        if let Some(end) = new.end_date.filter(|end| *end < new.start_date) {
            return Err(ValidationError::InvalidValue {
                field: "end_date".to_string(),
                reason: format!("{} is before start date {}", end, new.start_date),
            }
            .into());
        }

        let medication = Medication {
            medication_id: new_entity_id(),
            user_id: user_id.clone(),
            name,
            dosage,
            frequency,
            start_date: new.start_date,
            end_date: new.end_date,
            notes: new.notes,
            active: true,
            added_at: self.clock.now(),
        };
        let id = self.medications.add(medication).await?;
        debug!(user_id = %user_id, medication_id = %id, "Medication added");
        Ok(id)
    }

    pub async fn discontinue_medication(&self, medication_id: EntityId) -> MedsageResult<()> {
        self.medications.set_active(medication_id, false).await
    }

    /// Medications still active whose course has not ended before today.
    pub async fn active_medications(&self, user_id: &UserId) -> MedsageResult<Vec<Medication>> {
        let today = self.clock.today();
        let mut medications = self.medications.list(user_id).await?;
        medications.retain(|m| m.is_current(today));
        Ok(medications)
    }

    /// Book an appointment in the `scheduled` state.
    ///
    /// # Errors
    /// Doctor and purpose are required.
    pub async fn schedule_appointment(
        &self,
        user_id: &UserId,
        new: NewAppointment,
    ) -> MedsageResult<EntityId> {
        let doctor = required("doctor", &new.doctor)?;
        let purpose = required("purpose", &new.purpose)?;

        let appointment = Appointment {
            appointment_id: new_entity_id(),
            user_id: user_id.clone(),
            date: new.date,
            time: new.time,
            doctor,
            purpose,
            location: new.location,
            notes: new.notes,
            status: AppointmentStatus::Scheduled,
            created_at: self.clock.now(),
        };
        let id = self.appointments.add(appointment).await?;
        debug!(user_id = %user_id, appointment_id = %id, date = %new.date, "Appointment scheduled");
        Ok(id)
    }

    pub async fn cancel_appointment(&self, appointment_id: EntityId) -> MedsageResult<()> {
        self.appointments
            .set_status(appointment_id, AppointmentStatus::Cancelled)
            .await
    }

    /// Scheduled appointments from today through `days` days ahead, soonest
    /// first; `None` looks [`UPCOMING_APPOINTMENT_DAYS`] ahead.
    pub async fn upcoming_appointments(
        &self,
        user_id: &UserId,
        days: Option<u32>,
    ) -> MedsageResult<Vec<Appointment>> {
        let today = self.clock.today();
        let days = days.unwrap_or(UPCOMING_APPOINTMENT_DAYS);
        let until = today
            .checked_add_signed(Duration::days(i64::from(days)))
            .unwrap_or(NaiveDate::MAX);

        let mut appointments = self.appointments.list_between(user_id, today, until).await?;
        appointments.retain(|a| a.status == AppointmentStatus::Scheduled);
        Ok(appointments)
    }
}

fn required(field: &str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        })
    } else {
        Ok(value.to_string())
    }
}
