use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the slave lot size is derived from the master order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VolumeMode {
    /// Always send `multiplier` lots
    Fixed,
    /// `master_volume * multiplier`
    #[default]
    Multiply,
    /// Scale by the slave/master balance ratio, then by `multiplier`
    Percent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PairStatus {
    #[default]
    Active,
    Inactive,
}

impl PairStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PairStatus::Active => "active",
            PairStatus::Inactive => "inactive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(PairStatus::Active),
            "inactive" => Some(PairStatus::Inactive),
            _ => None,
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            PairStatus::Active => PairStatus::Inactive,
            PairStatus::Inactive => PairStatus::Active,
        }
    }
}

/// Per-pair copy behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopySettings {
    pub auto_map_symbol: bool,
    pub auto_map_volume: bool,
    #[serde(alias = "copy_psl")]
    pub copy_tp_sl: bool,
    pub volume_mode: VolumeMode,
    pub multiplier: f64,
}

impl Default for CopySettings {
    fn default() -> Self {
        Self {
            auto_map_symbol: true,
            auto_map_volume: true,
            copy_tp_sl: true,
            volume_mode: VolumeMode::Multiply,
            multiplier: 2.0,
        }
    }
}

/// Partial settings update; absent fields keep their current value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CopySettingsPatch {
    pub auto_map_symbol: Option<bool>,
    pub auto_map_volume: Option<bool>,
    #[serde(alias = "copy_psl")]
    pub copy_tp_sl: Option<bool>,
    pub volume_mode: Option<VolumeMode>,
    pub multiplier: Option<f64>,
}

impl CopySettings {
    pub fn apply(&mut self, patch: CopySettingsPatch) {
        if let Some(v) = patch.auto_map_symbol {
            self.auto_map_symbol = v;
        }
        if let Some(v) = patch.auto_map_volume {
            self.auto_map_volume = v;
        }
        if let Some(v) = patch.copy_tp_sl {
            self.copy_tp_sl = v;
        }
        if let Some(v) = patch.volume_mode {
            self.volume_mode = v;
        }
        if let Some(v) = patch.multiplier {
            self.multiplier = v;
        }
    }

    /// The multiplier doubles as the fixed lot size, so it must be a positive number
    pub fn validate(&self) -> Result<(), String> {
        if !self.multiplier.is_finite() || self.multiplier <= 0.0 {
            return Err(format!(
                "multiplier must be a positive number, got {}",
                self.multiplier
            ));
        }
        Ok(())
    }
}

/// Association between a master account and one slave account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyPair {
    pub id: String,
    pub master_account: String,
    pub slave_account: String,
    #[serde(default)]
    pub master_nickname: String,
    #[serde(default)]
    pub slave_nickname: String,
    pub api_key: String,
    pub settings: CopySettings,
    pub status: PairStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CopyPair {
    pub fn is_active(&self) -> bool {
        self.status == PairStatus::Active
    }

    /// `pair_<unix-ms>` with a short random tail so two pairs created in the same
    /// millisecond stay distinct
    pub fn generate_id() -> String {
        let tail = uuid::Uuid::new_v4().simple().to_string();
        format!("pair_{}_{}", Utc::now().timestamp_millis(), &tail[..6])
    }

    pub fn generate_api_key() -> String {
        format!("ctk_{}", uuid::Uuid::new_v4().simple())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCopyPairRequest {
    #[serde(deserialize_with = "super::string_or_number")]
    pub master_account: String,
    #[serde(deserialize_with = "super::string_or_number")]
    pub slave_account: String,
    /// Reuse the key of an existing pair of the same master (fan-out)
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub settings: CopySettingsPatch,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCopyPairRequest {
    #[serde(default)]
    pub settings: CopySettingsPatch,
    #[serde(default)]
    pub status: Option<PairStatus>,
}
