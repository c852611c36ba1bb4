use thiserror::Error;

use crate::models::VolumeMode;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum VolumeError {
    #[error("Balance of account {0} is unavailable")]
    BalanceUnavailable(String),
    #[error("Balance of account {account} is not usable: {value}")]
    InvalidBalance { account: String, value: f64 },
    #[error("Master volume must be a positive number, got {0}")]
    InvalidMasterVolume(f64),
    #[error("Calculated volume {0} is not a positive finite number")]
    InvalidResult(f64),
}

/// Balances needed by `percent` mode
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceSnapshot<'a> {
    pub master_account: &'a str,
    pub master_balance: Option<f64>,
    pub slave_account: &'a str,
    pub slave_balance: Option<f64>,
}

/// Compute the slave lot size.
///
/// `fixed` returns `multiplier` as-is, `multiply` scales the master volume and
/// `percent` additionally scales by `slave_balance / master_balance`. Only
/// `percent` looks at `balances`; it fails closed when a balance is missing.
pub fn calculate_volume(
    master_volume: f64,
    mode: VolumeMode,
    multiplier: f64,
    balances: Option<&BalanceSnapshot<'_>>,
) -> Result<f64, VolumeError> {
    let volume = match mode {
        VolumeMode::Fixed => multiplier,
        VolumeMode::Multiply => {
            check_master_volume(master_volume)?;
            master_volume * multiplier
        }
        VolumeMode::Percent => {
            check_master_volume(master_volume)?;
            let balances =
                balances.ok_or_else(|| VolumeError::BalanceUnavailable("master".to_string()))?;
            let master = usable_balance(balances.master_account, balances.master_balance)?;
            let slave = usable_balance(balances.slave_account, balances.slave_balance)?;
            (slave / master) * master_volume * multiplier
        }
    };

    if !volume.is_finite() || volume <= 0.0 {
        return Err(VolumeError::InvalidResult(volume));
    }

    tracing::debug!(master_volume, ?mode, multiplier, volume, "Calculated slave volume");
    Ok(volume)
}

fn check_master_volume(volume: f64) -> Result<(), VolumeError> {
    if !volume.is_finite() || volume <= 0.0 {
        return Err(VolumeError::InvalidMasterVolume(volume));
    }
    Ok(())
}

fn usable_balance(account: &str, balance: Option<f64>) -> Result<f64, VolumeError> {
    match balance {
        None => Err(VolumeError::BalanceUnavailable(account.to_string())),
        Some(value) if !value.is_finite() || value <= 0.0 => Err(VolumeError::InvalidBalance {
            account: account.to_string(),
            value,
        }),
        Some(value) => Ok(value),
    }
}
