//! Concrete implementations of the outbound ports

pub mod account_info;
pub mod command_writer;
pub mod market_watch;
pub mod process;

pub use account_info::AccountInfoBalanceSource;
pub use command_writer::{CommandSinkError, FileCommandSink};
pub use market_watch::MarketWatchSymbolSource;
pub use process::OsProcessControl;

use std::path::{Component, Path, PathBuf};

/// Instance folder of `account`, or `None` if the id could escape `instances_dir`
pub(crate) fn instance_dir(instances_dir: &Path, account: &str) -> Option<PathBuf> {
    let mut components = Path::new(account).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if is_valid_account_id(account) => {
            Some(instances_dir.join(account))
        }
        _ => None,
    }
}

/// Account ids are folder names: letters, digits, `-` and `_`
pub fn is_valid_account_id(account: &str) -> bool {
    !account.is_empty()
        && account.len() <= 64
        && account
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
