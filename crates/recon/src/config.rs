use std::collections::HashSet;

use serde::Deserialize;

use stockrecon_io::SheetRef;

use crate::error::ReconError;
use crate::normalize::{DateOrder, DateWindow};

// ---------------------------------------------------------------------------
// Top-level profile
// ---------------------------------------------------------------------------

/// Declarative description of one unit: where its columns live, how headers are
/// found and which workshops it reconciles. Loaded once, never mutated.
#[derive(Debug, Clone, Deserialize)]
pub struct UnitProfile {
    pub name: String,
    pub movement: MovementConfig,
    pub stock: StockConfig,
    #[serde(default)]
    pub result: ResultConfig,
    pub workshops: Vec<WorkshopSpec>,
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct MovementConfig {
    pub columns: ColumnRoleDictionary,
    #[serde(default)]
    pub header: HeaderRule,
    #[serde(default)]
    pub dates: DatePolicy,
}

/// Acceptable header spellings per canonical role.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnRoleDictionary {
    #[serde(default)]
    pub date: ColumnRule,
    pub reference: ColumnRule,
    pub quantity: ColumnRule,
    /// Present only for units whose movement ledgers carry a localisation column.
    #[serde(default)]
    pub localisation: Option<ColumnRule>,
}

impl ColumnRoleDictionary {
    /// Reference and quantity labels, in that order.
    pub fn role_labels(&self) -> Vec<String> {
        self.reference
            .labels
            .iter()
            .chain(self.quantity.labels.iter())
            .cloned()
            .collect()
    }
}

/// Candidates for one column role.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColumnRule {
    /// Literal labels, tried exactly and then whitespace/case-insensitively.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Substring keywords for the permissive last pass.
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub keyword_mode: KeywordMode,
    /// Skip the exact pass; labels are matched only after normalisation.
    #[serde(default)]
    pub collapsed_only: bool,
}

impl ColumnRule {
    pub fn labels(labels: &[&str]) -> Self {
        Self {
            labels: labels.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.keywords.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordMode {
    /// The column label contains the keyword.
    #[default]
    Contains,
    /// Either string contains the other.
    EitherContains,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatePolicy {
    #[serde(default)]
    pub window: DateWindow,
    #[serde(default)]
    pub order: DateOrder,
    /// A movement sheet without a date column fails the workshop.
    #[serde(default)]
    pub required: bool,
    /// When no date label matches, take the first column whose label contains `date`.
    #[serde(default)]
    pub substring_fallback: bool,
}

// ---------------------------------------------------------------------------
// Header detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct HeaderRule {
    #[serde(default)]
    pub discriminator: Discriminator,
    /// Labels for [`Discriminator::Custom`].
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub label_match: LabelMatch,
    /// Distinct discriminator labels a row must contain.
    #[serde(default = "default_min_hits")]
    pub min_hits: usize,
    /// A row with any cell containing `date` also qualifies.
    #[serde(default)]
    pub date_substring: bool,
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
    #[serde(default)]
    pub fallback: HeaderFallback,
}

impl Default for HeaderRule {
    fn default() -> Self {
        Self {
            discriminator: Discriminator::default(),
            labels: Vec::new(),
            label_match: LabelMatch::default(),
            min_hits: default_min_hits(),
            date_substring: false,
            max_rows: default_max_rows(),
            fallback: HeaderFallback::default(),
        }
    }
}

fn default_min_hits() -> usize {
    1
}

fn default_max_rows() -> usize {
    50
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discriminator {
    /// The role dictionary's date labels.
    #[default]
    DateLabels,
    /// Reference and quantity labels.
    RoleLabels,
    /// The rule's own `labels`.
    Custom,
    /// Skip straight to the fallback.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelMatch {
    /// Trimmed cell text equals the label.
    #[default]
    Exact,
    /// Whitespace-collapsed, lowercased comparison.
    Collapsed,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HeaderFallback {
    #[default]
    RowZero,
    /// Row with the most non-empty cells (first on ties).
    MostPopulated,
    /// First row where at least `min_hits` keywords occur as upper-cased substrings.
    KeywordHits { keywords: Vec<String>, min_hits: usize },
    /// First row containing any reference or quantity label.
    RoleLabels,
}

// ---------------------------------------------------------------------------
// Stock
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct StockConfig {
    #[serde(default)]
    pub sheet: StockSheetChoice,
    #[serde(default)]
    pub header: HeaderRule,
    pub columns: StockColumns,
    /// Drop rows with an empty reference or an empty localisation.
    #[serde(default)]
    pub drop_incomplete: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockSheetChoice {
    /// First sheet name (case-insensitive) containing each pattern in turn,
    /// else the first sheet.
    Containing { patterns: Vec<String> },
    /// First of these sheets that exists.
    Named { names: Vec<SheetName> },
    /// A named sheet when present, else the first sheet.
    NamedOrFirst { name: String },
    /// Each workshop names its own stock sheets.
    #[default]
    PerWorkshop,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StockColumns {
    pub reference: ColumnRule,
    pub quantity: ColumnRule,
    #[serde(default)]
    pub localisation: Option<ColumnRule>,
    /// Second dimension for paired localisation filters.
    #[serde(default)]
    pub sub_localisation: Option<ColumnRule>,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ResultConfig {
    #[serde(default)]
    pub tolerance: f64,
    #[serde(default)]
    pub order: DiscrepancyOrder,
    /// Ordering for workshops with grouped sheet specs; `order` when absent.
    #[serde(default)]
    pub grouped_order: Option<DiscrepancyOrder>,
}

impl Default for ResultConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.0,
            order: DiscrepancyOrder::default(),
            grouped_order: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyOrder {
    /// Largest positive difference first.
    #[default]
    DifferenceDesc,
    /// Largest absolute difference first.
    MagnitudeDesc,
}

// ---------------------------------------------------------------------------
// Workshops
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct WorkshopSpec {
    pub key: String,
    /// File-name keyword for matching uploads; the key when absent.
    #[serde(default)]
    pub keyword: Option<String>,
    pub sheets: SheetSpec,
    #[serde(default)]
    pub localisation: LocalisationFilter,
    #[serde(default)]
    pub exclude_localisations: Vec<String>,
    #[serde(default)]
    pub columns: ColumnOverride,
    /// Header discriminator labels replacing the unit's.
    #[serde(default)]
    pub header_labels: Option<Vec<String>>,
    /// Movement localisation labels replacing the unit's.
    #[serde(default)]
    pub movement_localisation: Option<Vec<String>>,
    #[serde(default)]
    pub no_localisation_column: bool,
    /// Sheet-based units: stock sheets read for this workshop.
    #[serde(default)]
    pub stock_sheets: Vec<String>,
    /// Sheet-based units: stock quantity column for this workshop.
    #[serde(default)]
    pub stock_quantity: Option<String>,
}

impl WorkshopSpec {
    pub fn keyword(&self) -> &str {
        self.keyword.as_deref().unwrap_or(&self.key)
    }

    pub fn is_grouped(&self) -> bool {
        matches!(self.sheets, SheetSpec::Grouped(_))
    }
}

/// Which movement sheets a workshop reads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetSpec {
    Single(SheetName),
    /// First existing sheet wins.
    Candidates(Vec<SheetName>),
    /// One reconciliation job per group; results are concatenated.
    Grouped(Vec<SheetGroup>),
}

impl SheetSpec {
    /// Candidate list for non-grouped specs.
    pub fn candidates(&self) -> Vec<SheetRef> {
        match self {
            Self::Single(name) => vec![name.to_sheet_ref()],
            Self::Candidates(names) => names.iter().map(SheetName::to_sheet_ref).collect(),
            Self::Grouped(groups) => groups
                .iter()
                .flat_map(|g| g.sheets.iter().map(SheetName::to_sheet_ref))
                .collect(),
        }
    }
}

/// One segment of a grouped workshop. Its sheets are concatenated.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SheetGroup {
    pub sheets: Vec<SheetName>,
    #[serde(default)]
    pub localisation: LocalisationFilter,
    #[serde(default)]
    pub columns: ColumnOverride,
    #[serde(default)]
    pub stock_sheets: Vec<String>,
    #[serde(default)]
    pub stock_quantity: Option<String>,
}

/// A sheet by name or by position.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SheetName {
    Index(usize),
    Name(String),
}

impl SheetName {
    pub fn to_sheet_ref(&self) -> SheetRef {
        match self {
            Self::Index(idx) => SheetRef::Index(*idx),
            Self::Name(name) => SheetRef::Name(name.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalisationFilter {
    /// No filter: every stock row belongs to the workshop.
    #[default]
    None,
    /// Stock localisation is one of these values.
    Flat(Vec<String>),
    /// Stock (localisation, sub-localisation) is one of these pairs.
    Paired(Vec<(String, String)>),
}

/// Workshop-level column names. Fall back to the dictionary when absent from the sheet.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ColumnOverride {
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub quantity: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl UnitProfile {
    pub fn from_toml(unit: &str, input: &str) -> Result<Self, ReconError> {
        let profile: UnitProfile = toml::from_str(input).map_err(|e| ReconError::Profile {
            unit: unit.to_string(),
            message: e.to_string(),
        })?;
        profile.validate(unit)?;
        Ok(profile)
    }

    pub fn validate(&self, unit: &str) -> Result<(), ReconError> {
        let invalid = |message: String| ReconError::Profile {
            unit: unit.to_string(),
            message,
        };

        if self.workshops.is_empty() {
            return Err(invalid("at least one workshop is required".into()));
        }

        if self.result.tolerance.is_nan() || self.result.tolerance < 0.0 {
            return Err(invalid(format!(
                "tolerance must be non-negative, got {}",
                self.result.tolerance
            )));
        }

        if self.movement.columns.reference.is_empty() || self.movement.columns.quantity.is_empty() {
            return Err(invalid("movement reference and quantity columns need candidates".into()));
        }

        let mut seen = HashSet::new();
        for ws in &self.workshops {
            if !seen.insert(ws.key.as_str()) {
                return Err(invalid(format!("duplicate workshop key '{}'", ws.key)));
            }
            match &ws.sheets {
                SheetSpec::Candidates(names) if names.is_empty() => {
                    return Err(invalid(format!("workshop '{}': no candidate sheets", ws.key)));
                }
                SheetSpec::Grouped(groups) => {
                    if groups.is_empty() {
                        return Err(invalid(format!("workshop '{}': no sheet groups", ws.key)));
                    }
                    if let Some(idx) = groups.iter().position(|g| g.sheets.is_empty()) {
                        return Err(invalid(format!(
                            "workshop '{}': sheet group {idx} is empty",
                            ws.key
                        )));
                    }
                    let with_stock = groups.iter().filter(|g| !g.stock_sheets.is_empty()).count();
                    if with_stock != 0 && with_stock != groups.len() {
                        return Err(invalid(format!(
                            "workshop '{}': stock sheets must be given for every group or none",
                            ws.key
                        )));
                    }
                }
                _ => {}
            }
            if let LocalisationFilter::Paired(_) = ws.localisation {
                if self.stock.columns.sub_localisation.is_none() {
                    return Err(invalid(format!(
                        "workshop '{}': paired localisation needs a sub_localisation stock column",
                        ws.key
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn workshop(&self, key: &str) -> Option<&WorkshopSpec> {
        self.workshops.iter().find(|ws| ws.key == key)
    }

    pub fn workshop_keys(&self) -> Vec<&str> {
        self.workshops.iter().map(|ws| ws.key.as_str()).collect()
    }

    pub fn order_for(&self, ws: &WorkshopSpec) -> DiscrepancyOrder {
        if ws.is_grouped() {
            self.result.grouped_order.unwrap_or(self.result.order)
        } else {
            self.result.order
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
