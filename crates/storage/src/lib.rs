pub mod backend;
pub mod cloudinary;
pub mod credentials;
pub mod dropbox;
pub mod error;
pub mod factory;
pub mod mega;
pub mod service;
pub mod testing;

pub use backend::{DynStorageBackend, RemoteObject, StorageBackend, UploadObject};
pub use cloudinary::{CloudinaryBackend, CloudinaryConfig};
pub use credentials::{Account, AccountStore, BackendCredential, MemoryAccountStore};
pub use dropbox::{DropboxBackend, DropboxConfig};
pub use error::StorageError;
pub use factory::{BackendFactory, DefaultBackendFactory};
pub use mega::{MegaBackend, MegaConnector, MegaNode, MegaSession, MegaUpload};
pub use service::{StagedFile, UploadOutcome, UploadService};
