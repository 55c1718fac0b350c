use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordinal damage rating, 1 (healthiest) to 5 (heavily damaged).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DamageLevel(u8);

impl DamageLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn value(self) -> u8 {
        self.0
    }

    /// Hair "stamina" band the treatment manual uses: damage 5 → 0–2, damage 1 → 8–10.
    pub fn stamina_range(self) -> (u8, u8) {
        let high = 10 - (self.0 - 1) * 2;
        (high.saturating_sub(2), high)
    }
}

impl TryFrom<u8> for DamageLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(format!(
                "damage level must be between {} and {}, got {value}",
                Self::MIN,
                Self::MAX
            ))
        }
    }
}

impl From<DamageLevel> for u8 {
    fn from(level: DamageLevel) -> Self {
        level.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurlIntensity {
    #[serde(alias = "none")]
    Straight,
    #[serde(alias = "weak")]
    Light,
    Medium,
    Strong,
}

impl CurlIntensity {
    pub fn label(self) -> &'static str {
        match self {
            CurlIntensity::Straight => "直毛",
            CurlIntensity::Light => "弱いくせ",
            CurlIntensity::Medium => "中程度のくせ",
            CurlIntensity::Strong => "強いくせ",
        }
    }
}

/// One of the three hair-length segments tracked independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Root,
    Middle,
    Ends,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::Root, Zone::Middle, Zone::Ends];

    pub fn label(self) -> &'static str {
        match self {
            Zone::Root => "根元",
            Zone::Middle => "中間",
            Zone::Ends => "毛先",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneCondition {
    pub damage: DamageLevel,
    pub curl: CurlIntensity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HairCondition {
    pub root: ZoneCondition,
    pub middle: ZoneCondition,
    pub ends: ZoneCondition,
}

impl HairCondition {
    pub fn zone(&self, zone: Zone) -> &ZoneCondition {
        match zone {
            Zone::Root => &self.root,
            Zone::Middle => &self.middle,
            Zone::Ends => &self.ends,
        }
    }

    pub fn worst_damage(&self) -> DamageLevel {
        Zone::ALL
            .iter()
            .map(|z| self.zone(*z).damage)
            .max()
            .unwrap_or(self.root.damage)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timing {
    #[default]
    Before,
    After,
}

impl Timing {
    pub fn as_str(self) -> &'static str {
        match self {
            Timing::Before => "before",
            Timing::After => "after",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorHistory {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "1month")]
    OneMonth,
    #[serde(rename = "3months")]
    ThreeMonths,
    #[serde(rename = "6months")]
    SixMonths,
    #[serde(rename = "1year_plus")]
    OverAYear,
}

impl ColorHistory {
    pub fn label(self) -> &'static str {
        match self {
            ColorHistory::None => "なし",
            ColorHistory::OneMonth => "1ヶ月以内",
            ColorHistory::ThreeMonths => "3ヶ月以内",
            ColorHistory::SixMonths => "6ヶ月以内",
            ColorHistory::OverAYear => "1年以上前",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BleachCount {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "1")]
    Once,
    #[serde(rename = "2-3")]
    TwoToThree,
    #[serde(rename = "4plus")]
    FourPlus,
}

impl BleachCount {
    pub fn label(self) -> &'static str {
        match self {
            BleachCount::None => "なし",
            BleachCount::Once => "1回",
            BleachCount::TwoToThree => "2〜3回",
            BleachCount::FourPlus => "4回以上",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LastTreatment {
    #[serde(rename = "1month")]
    OneMonth,
    #[serde(rename = "3months")]
    ThreeMonths,
    #[serde(rename = "6months_plus")]
    SixMonthsPlus,
}

impl LastTreatment {
    pub fn label(self) -> &'static str {
        match self {
            LastTreatment::OneMonth => "1ヶ月以内",
            LastTreatment::ThreeMonths => "3ヶ月以内",
            LastTreatment::SixMonthsPlus => "6ヶ月以上前",
        }
    }
}

/// Read-only prompting context; every field may be left blank on the form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TreatmentHistory {
    pub last_color: Option<ColorHistory>,
    pub bleach_count: Option<BleachCount>,
    pub bleach_last_date: Option<LastTreatment>,
    pub has_straightening: bool,
    pub straightening_last_date: Option<LastTreatment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Texture {
    Smooth,
    Rough,
    Soft,
    Sticky,
}

impl Texture {
    pub fn label(self) -> &'static str {
        match self {
            Texture::Smooth => "なめらか",
            Texture::Rough => "ざらつき",
            Texture::Soft => "やわらかい",
            Texture::Sticky => "べたつき",
        }
    }
}

/// Snapshot of a session's hair at one timing. Saving again replaces the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HairConditionRecord {
    pub session_id: String,
    pub timing: Timing,
    pub condition: HairCondition,
    #[serde(default)]
    pub history: TreatmentHistory,
    #[serde(default)]
    pub shine_level: Option<DamageLevel>,
    #[serde(default)]
    pub texture: Option<Texture>,
    #[serde(default)]
    pub manageability: Option<DamageLevel>,
    pub recorded_at: DateTime<Utc>,
}
