//! Repository layer for data access.
//!
//! Each store trait has a PostgreSQL implementation and the shared
//! [`InMemoryStore`].

mod communication_repository;
pub mod entities;
mod lead_repository;
mod memory;
mod staff_repository;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

pub use communication_repository::{
    CommunicationStore, EmailRepository, FileRepository, MessageRepository, NoteRepository,
};
pub use lead_repository::{LeadRepository, LeadStore, LeadUpdate, PaymentRecord, UpsertOutcome};
pub use memory::InMemoryStore;
pub use staff_repository::{StaffRepository, StaffStore};

#[cfg(any(test, feature = "test-utils"))]
pub use communication_repository::{
    MockEmailRepository, MockFileRepository, MockMessageRepository, MockNoteRepository,
};
#[cfg(any(test, feature = "test-utils"))]
pub use lead_repository::MockLeadRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use staff_repository::MockStaffRepository;

/// Every store the services need, behind their traits.
#[derive(Clone)]
pub struct Stores {
    pub leads: Arc<dyn LeadRepository>,
    pub staff: Arc<dyn StaffRepository>,
    pub notes: Arc<dyn NoteRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub emails: Arc<dyn EmailRepository>,
    pub files: Arc<dyn FileRepository>,
}

impl Stores {
    pub fn postgres(db: DatabaseConnection) -> Self {
        let channels = Arc::new(CommunicationStore::new(db.clone()));
        Self {
            leads: Arc::new(LeadStore::new(db.clone())),
            staff: Arc::new(StaffStore::new(db)),
            notes: channels.clone(),
            messages: channels.clone(),
            emails: channels.clone(),
            files: channels,
        }
    }

    pub fn in_memory(store: InMemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            leads: store.clone(),
            staff: store.clone(),
            notes: store.clone(),
            messages: store.clone(),
            emails: store.clone(),
            files: store,
        }
    }
}
