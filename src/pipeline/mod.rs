pub mod extraction;
pub mod processor;
pub mod reconcile;
pub mod storage;
pub mod upload;
