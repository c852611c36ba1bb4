//! Pure trading logic: symbol mapping, lot sizing, signal translation and
//! webhook payload validation. Nothing in here touches the filesystem or
//! the database.

pub mod copy_engine;
pub mod symbol_mapper;
pub mod volume_calculator;
pub mod webhook_validator;

pub use copy_engine::{CopyEngine, SignalError};
pub use symbol_mapper::{MappingError, MatchKind, SymbolMapper, SymbolMatch};
pub use volume_calculator::{calculate_volume, BalanceSnapshot, VolumeError};
pub use webhook_validator::{validate_webhook, WebhookValidationError};
