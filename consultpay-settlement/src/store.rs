use consultpay_ledger::{CatalogRepository, LedgerRepository};

/// Everything the services need from persistence.
pub trait Store: LedgerRepository + CatalogRepository {}

impl<T> Store for T where T: LedgerRepository + CatalogRepository {}
