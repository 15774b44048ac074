use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Gender {
    Male => "M",
    Female => "F",
    Other => "Other",
});

str_enum!(EncounterType {
    Inpatient => "Inpatient",
    Outpatient => "Outpatient",
    Emergency => "Emergency",
});

str_enum!(Modality {
    XRay => "X-Ray",
    Ct => "CT",
    Mri => "MRI",
    Ultrasound => "Ultrasound",
    Fluoroscopy => "Fluoroscopy",
    Mammography => "Mammography",
});

str_enum!(ReportStatus {
    Draft => "Draft",
    Preliminary => "Preliminary",
    Final => "Final",
    Amended => "Amended",
});

str_enum!(DiagnosisType {
    Primary => "Primary",
    Secondary => "Secondary",
});

str_enum!(AgeGroup {
    Pediatric => "Pediatric",
    YoungAdult => "Young Adult",
    MiddleAge => "Middle Age",
    Senior => "Senior",
    Elderly => "Elderly",
});

impl AgeGroup {
    /// Bucket an age-at-first-encounter. `None` (patient with no encounters)
    /// falls through to Elderly, matching the warehouse CASE semantics.
    pub fn from_age(age: Option<i64>) -> Self {
        match age {
            Some(a) if a < 18 => Self::Pediatric,
            Some(a) if a <= 35 => Self::YoungAdult,
            Some(a) if a <= 55 => Self::MiddleAge,
            Some(a) if a <= 75 => Self::Senior,
            _ => Self::Elderly,
        }
    }
}
