//! Infrastructure layer: storage, event log, region lookup and the
//! transactional company service that composes them.

pub mod company_service;
pub mod event_log;
pub mod region;
pub mod store;


pub use company_service::{CompanyService, MutationState, ServiceError, Stage};
pub use store::{CompanyStore, CompanyTx, InMemoryCompanyStore, PostgresCompanyStore, StoreError};
