pub mod attributes;
pub mod clock;
pub mod context;
pub mod effects;
pub mod engine;
pub mod host;
pub mod storage;

// Re-exports for convenience
pub use attributes::{Attribute, AttributeMeta, resolve as resolve_attribute};
pub use clock::{Clock, ManualClock, Millis, SystemClock};
pub use context::{ConfigError, EngineConfig, EngineConfigExt, StoreBackend, StoreConfig};
pub use effects::{
    EffectError, EffectId, EffectRecord, EffectStack, EffectStackManager, ExpirationScanner,
    OwnerId,
};
pub use engine::{EffectEngine, EngineError, EngineParts};
pub use host::{AttributeHost, InMemoryHost, MailboxExecutor, OwnerExecutor, OwnerJob};
pub use storage::{
    EffectStore, JsonFileStore, MemoryStore, PersistenceHandle, PersistenceWriter, StorageError,
};
