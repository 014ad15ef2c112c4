pub mod memory;
pub mod repository;

pub use memory::MemoryStore;
pub use repository::{
    AccountsRepository, ActivityRepository, CoursesRepository, DocumentsRepository, EnrollError,
    InsertSubmissionError, LinkTagError, StoreError, SubmissionsRepository, ThreadSafeStore,
};
