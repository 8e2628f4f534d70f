//! Typed catalog records
//!
//! One [`Record`] describes a single imaging study from the dataset catalog:
//! patient metadata plus a reference to the image file hosted next to it.
//! Records are built by [`parse_row`] and never mutated afterwards.

mod parser;

pub use parser::{
    Catalog, CatalogReader, CsvRow, HeaderIndex, RowValues, parse_catalog, parse_row, read_catalog,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use utoipa::ToSchema;

use crate::store::folder_name_for;
use crate::utils::is_safe_file_name;

/// Catalog column names
///
/// Header matching is exact and case-sensitive (`needed_supplemental_O2` and
/// `pO2_saturation` keep their capital O).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Column {
    /// `patientid`
    PatientId,
    /// `offset`
    Offset,
    /// `sex`
    Sex,
    /// `age`
    Age,
    /// `finding`
    Finding,
    /// `survival`
    Survival,
    /// `intubated`
    Intubated,
    /// `went_icu`
    WentIcu,
    /// `needed_supplemental_O2`
    NeededSupplementalO2,
    /// `extubated`
    Extubated,
    /// `temperature`
    Temperature,
    /// `pO2_saturation`
    Po2Saturation,
    /// `leukocyte_count`
    LeukocyteCount,
    /// `neutrophil_count`
    NeutrophilCount,
    /// `lymphocyte_count`
    LymphocyteCount,
    /// `view`
    View,
    /// `modality`
    Modality,
    /// `date`
    Date,
    /// `location`
    Location,
    /// `folder`
    Folder,
    /// `filename`
    Filename,
    /// `doi`
    Doi,
    /// `url`
    Url,
    /// `license`
    License,
    /// `clinical_notes`
    ClinicalNotes,
    /// `other_notes`
    OtherNotes,
}

impl Column {
    /// Every column, in catalog order
    pub const ALL: [Column; 26] = [
        Column::PatientId,
        Column::Offset,
        Column::Sex,
        Column::Age,
        Column::Finding,
        Column::Survival,
        Column::Intubated,
        Column::WentIcu,
        Column::NeededSupplementalO2,
        Column::Extubated,
        Column::Temperature,
        Column::Po2Saturation,
        Column::LeukocyteCount,
        Column::NeutrophilCount,
        Column::LymphocyteCount,
        Column::View,
        Column::Modality,
        Column::Date,
        Column::Location,
        Column::Folder,
        Column::Filename,
        Column::Doi,
        Column::Url,
        Column::License,
        Column::ClinicalNotes,
        Column::OtherNotes,
    ];

    /// Columns whose absence voids the whole row
    pub const GATING: [Column; 13] = [
        Column::Offset,
        Column::Sex,
        Column::Age,
        Column::Finding,
        Column::Survival,
        Column::Intubated,
        Column::Temperature,
        Column::Po2Saturation,
        Column::LeukocyteCount,
        Column::NeutrophilCount,
        Column::LymphocyteCount,
        Column::View,
        Column::Modality,
    ];

    /// Header name as it appears in the catalog
    pub fn header(self) -> &'static str {
        match self {
            Column::PatientId => "patientid",
            Column::Offset => "offset",
            Column::Sex => "sex",
            Column::Age => "age",
            Column::Finding => "finding",
            Column::Survival => "survival",
            Column::Intubated => "intubated",
            Column::WentIcu => "went_icu",
            Column::NeededSupplementalO2 => "needed_supplemental_O2",
            Column::Extubated => "extubated",
            Column::Temperature => "temperature",
            Column::Po2Saturation => "pO2_saturation",
            Column::LeukocyteCount => "leukocyte_count",
            Column::NeutrophilCount => "neutrophil_count",
            Column::LymphocyteCount => "lymphocyte_count",
            Column::View => "view",
            Column::Modality => "modality",
            Column::Date => "date",
            Column::Location => "location",
            Column::Folder => "folder",
            Column::Filename => "filename",
            Column::Doi => "doi",
            Column::Url => "url",
            Column::License => "license",
            Column::ClinicalNotes => "clinical_notes",
            Column::OtherNotes => "other_notes",
        }
    }

    /// Look up a column by its exact header name
    pub fn from_header(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.header() == name)
    }

    /// Whether a missing key drops the row
    pub fn is_gating(self) -> bool {
        Self::GATING.contains(&self)
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.header())
    }
}

/// Patient sex
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Sex {
    /// "M"
    #[serde(rename = "M")]
    Male,
    /// "F"
    #[serde(rename = "F")]
    Female,
}

impl Sex {
    /// Exact raw-value match ("M" or "F")
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw {
            "M" => Some(Sex::Male),
            "F" => Some(Sex::Female),
            _ => None,
        }
    }

    /// Catalog spelling
    pub fn as_raw(self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
        }
    }
}

/// Yes/no catalog flag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum YesNo {
    /// "Y"
    #[serde(rename = "Y")]
    Yes,
    /// "N"
    #[serde(rename = "N")]
    No,
}

impl YesNo {
    /// Exact raw-value match ("Y" or "N")
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw {
            "Y" => Some(YesNo::Yes),
            "N" => Some(YesNo::No),
            _ => None,
        }
    }

    /// Catalog spelling
    pub fn as_raw(self) -> &'static str {
        match self {
            YesNo::Yes => "Y",
            YesNo::No => "N",
        }
    }
}

/// Diagnostic label of a record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum Finding {
    /// Viral pneumonia caused by COVID-19
    #[serde(rename = "COVID-19")]
    Covid19,
    /// Healthy study
    #[serde(rename = "No Finding")]
    NoFinding,
    /// Any other diagnosis
    #[serde(rename = "Other")]
    Other,
}

impl Finding {
    /// Every label
    pub const ALL: [Finding; 3] = [Finding::Covid19, Finding::NoFinding, Finding::Other];

    /// Classify a raw catalog value
    ///
    /// Only the two exact strings `"Pneumonia/Viral/COVID-19"` and `"No Finding"` map to
    /// fixed labels; every other value, including the empty string, is [`Finding::Other`].
    pub fn classify(raw: &str) -> Self {
        match raw {
            "Pneumonia/Viral/COVID-19" => Finding::Covid19,
            "No Finding" => Finding::NoFinding,
            _ => Finding::Other,
        }
    }

    /// Human-readable label ("COVID-19", "No Finding", "Other")
    pub fn label(self) -> &'static str {
        match self {
            Finding::Covid19 => "COVID-19",
            Finding::NoFinding => "No Finding",
            Finding::Other => "Other",
        }
    }

    /// Parse a label as produced by [`Finding::label`]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.label() == label)
    }
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Radiographic projection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum View {
    /// "PA"
    #[serde(rename = "PA")]
    Posteroanterior,
    /// "AP"
    #[serde(rename = "AP")]
    Anteroposterior,
    /// "AP Supine"
    #[serde(rename = "AP Supine")]
    ApSupine,
    /// "L"
    #[serde(rename = "L")]
    Lateral,
    /// CT axial slice
    Axial,
    /// CT coronal slice
    Coronal,
}

impl View {
    /// Exact raw-value match
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw {
            "PA" => Some(View::Posteroanterior),
            "AP" => Some(View::Anteroposterior),
            "AP Supine" => Some(View::ApSupine),
            "L" => Some(View::Lateral),
            "Axial" => Some(View::Axial),
            "Coronal" => Some(View::Coronal),
            _ => None,
        }
    }

    /// Catalog spelling
    pub fn as_raw(self) -> &'static str {
        match self {
            View::Posteroanterior => "PA",
            View::Anteroposterior => "AP",
            View::ApSupine => "AP Supine",
            View::Lateral => "L",
            View::Axial => "Axial",
            View::Coronal => "Coronal",
        }
    }
}

/// Imaging modality
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Modality {
    /// Computed tomography
    #[serde(rename = "CT")]
    Ct,
    /// Plain radiograph
    #[serde(rename = "X-ray")]
    XRay,
}

impl Modality {
    /// Exact raw-value match ("CT" or "X-ray")
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw {
            "CT" => Some(Modality::Ct),
            "X-ray" => Some(Modality::XRay),
            _ => None,
        }
    }

    /// Catalog spelling
    pub fn as_raw(self) -> &'static str {
        match self {
            Modality::Ct => "CT",
            Modality::XRay => "X-ray",
        }
    }
}

/// One validated catalog row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Record {
    /// Patient identifier as written in the catalog
    pub patient_id: String,
    /// Days since symptom onset
    pub offset: Option<i64>,
    /// Patient sex
    pub sex: Option<Sex>,
    /// Age in years
    pub age: Option<i64>,
    /// Diagnostic label
    pub finding: Finding,
    /// Whether the patient survived
    pub survival: Option<YesNo>,
    /// Whether the patient was intubated
    pub intubated: Option<YesNo>,
    /// Whether the patient was admitted to intensive care
    pub went_icu: Option<YesNo>,
    /// `needed_supplemental_O2` column
    pub needed_supplemental_o2: Option<YesNo>,
    /// Whether the patient was extubated
    pub extubated: Option<YesNo>,
    /// Body temperature in degrees Celsius
    pub temperature: Option<f64>,
    /// `pO2_saturation` column
    pub po2_saturation: Option<f64>,
    /// White blood cell count
    pub leukocyte_count: Option<f64>,
    /// Neutrophil count
    pub neutrophil_count: Option<f64>,
    /// Lymphocyte count
    pub lymphocyte_count: Option<f64>,
    /// Radiographic projection
    pub view: View,
    /// Imaging modality
    pub modality: Modality,
    /// Free-text study date
    pub date: String,
    /// Where the study was taken
    pub location: String,
    /// Remote folder holding the image ("images" for downloadable rows)
    pub folder: String,
    /// Image file name, whitespace-trimmed
    pub filename: String,
    /// Source publication DOI, if any
    pub doi: String,
    /// Source publication URL, if any
    pub url: String,
    /// Image license
    pub license: String,
    /// Free-text clinical notes
    pub clinical_notes: String,
    /// Free-text remarks
    pub other_notes: String,
}

impl Record {
    /// Where this record's image lives under `dataset_root`
    ///
    /// `dataset_root/<label folder>/<filename>`, or `None` when the filename cannot
    /// name a single file inside the label folder.
    pub fn local_image_path(&self, dataset_root: &Path) -> Option<PathBuf> {
        if !is_safe_file_name(&self.filename) {
            return None;
        }
        Some(
            dataset_root
                .join(folder_name_for(self.finding))
                .join(&self.filename),
        )
    }

    /// Request path of the image relative to the source base URL
    pub fn remote_image_path(&self) -> String {
        format!("{}/{}", self.folder, self.filename)
    }
}
