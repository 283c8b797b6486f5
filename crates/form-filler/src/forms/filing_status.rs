use serde::{Deserialize, Serialize};

const CHECKBOX_PREFIX: &str = "topmostSubform[0].Page1[0].c1_3";

/// Filing status boxes on page one; the template allows exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilingStatus {
    Single,
    MarriedJointly,
    MarriedSeparately,
    HeadOfHousehold,
    QualifyingWidow,
}

impl FilingStatus {
    pub const ALL: [FilingStatus; 5] = [
        FilingStatus::Single,
        FilingStatus::MarriedJointly,
        FilingStatus::MarriedSeparately,
        FilingStatus::HeadOfHousehold,
        FilingStatus::QualifyingWidow,
    ];

    /// Parse the submitted form value. Matching is exact, as posted by the intake page.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "single" => Some(Self::Single),
            "marriedJointly" => Some(Self::MarriedJointly),
            "marriedSeparately" => Some(Self::MarriedSeparately),
            "headOfHousehold" => Some(Self::HeadOfHousehold),
            "qualifyingWidow" => Some(Self::QualifyingWidow),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::MarriedJointly => "marriedJointly",
            Self::MarriedSeparately => "marriedSeparately",
            Self::HeadOfHousehold => "headOfHousehold",
            Self::QualifyingWidow => "qualifyingWidow",
        }
    }

    pub fn checkbox_index(self) -> usize {
        match self {
            Self::Single => 0,
            Self::MarriedJointly => 1,
            Self::MarriedSeparately => 2,
            Self::HeadOfHousehold => 3,
            Self::QualifyingWidow => 4,
        }
    }

    pub fn checkbox_field(self) -> String {
        checkbox_field_at(self.checkbox_index())
    }
}

pub(crate) fn checkbox_field_at(index: usize) -> String {
    format!("{CHECKBOX_PREFIX}[{index}]")
}

/// Checkbox to activate for a submitted filing status, or `None` when the
/// value is not one of the five recognized statuses.
pub fn encode(status: &str) -> Option<String> {
    FilingStatus::parse(status).map(FilingStatus::checkbox_field)
}
