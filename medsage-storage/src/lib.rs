//! MedSage Storage
//!
//! Collaborator traits for the profile, event, report, conversation,
//! medication and appointment stores, an in-memory implementation of all of
//! them, the validating [`HealthJournal`] write layer over the event log and
//! the [`CarePlan`] over medications and appointments.

mod care;
mod journal;
mod memory;
mod stores;

pub use care::{CarePlan, NewAppointment, NewMedication, UPCOMING_APPOINTMENT_DAYS};
pub use journal::HealthJournal;
pub use memory::InMemoryStore;
pub use stores::{
    AppointmentStore, ConversationStore, EventStore, MedicationStore, ProfileStore, ReportStore,
};
