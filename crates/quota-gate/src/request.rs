//! Operation requests sent through the confirmation workflow.
//!
//! An [`OperationRequest`] is immutable once built. Each protocol step that
//! needs an annotated copy (`confirmed`, `cache_choice`) derives a new
//! request with [`with_confirmed`](OperationRequest::with_confirmed) or
//! [`with_cache_choice`](OperationRequest::with_cache_choice).

use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// Default months-back window for search and refresh operations.
pub const DEFAULT_MONTHS: u32 = 6;

/// The three operation kinds the remote API can estimate and execute.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Search,
    #[serde(alias = "step1")]
    Step1Search,
    Refresh,
}

impl OperationKind {
    /// Wire tag used by the server (`"search"`, `"step1_search"`, `"refresh"`).
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Search => "search",
            OperationKind::Step1Search => "step1_search",
            OperationKind::Refresh => "refresh",
        }
    }

    /// Human-readable name for prompts and reports.
    pub fn display_name(self) -> &'static str {
        match self {
            OperationKind::Search => "Search",
            OperationKind::Step1Search => "Regional search",
            OperationKind::Refresh => "Refresh",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which transaction feed a search targets.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    Sale,
    Rent,
    All,
}

impl std::str::FromStr for SearchType {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sale" => Ok(SearchType::Sale),
            "rent" => Ok(SearchType::Rent),
            "all" => Ok(SearchType::All),
            other => Err(GateError::validation(
                "search_type",
                format!("unknown search type '{other}' (expected sale, rent, or all)"),
            )),
        }
    }
}

/// Caller's answer to a cache-available probe, echoed back to the server.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheChoice {
    UseCache,
    Refresh,
}

// ── Kind-specific parameters ──────────────────────────────────────

/// Parameters for a plain region search.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct SearchParams {
    pub city: String,
    pub district: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apt_name: Option<String>,
    pub months: u32,
    pub search_type: SearchType,
    pub force_refresh: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl SearchParams {
    pub fn new(city: impl Into<String>, district: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            district: district.into(),
            apt_name: None,
            months: DEFAULT_MONTHS,
            search_type: SearchType::default(),
            force_refresh: false,
            start_date: None,
            end_date: None,
        }
    }

    pub fn with_apt_name(mut self, name: impl Into<String>) -> Self {
        self.apt_name = Some(name.into());
        self
    }

    pub fn with_months(mut self, months: u32) -> Self {
        self.months = months;
        self
    }

    pub fn with_search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = search_type;
        self
    }

    pub fn with_force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    pub fn with_date_range(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_date = Some(start.into());
        self.end_date = Some(end.into());
        self
    }
}

/// Parameters for the regional (step 1) search over a city/district.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Step1Params {
    pub city: String,
    pub district: String,
    pub search_type: SearchType,
}

impl Step1Params {
    pub fn new(city: impl Into<String>, district: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            district: district.into(),
            search_type: SearchType::default(),
        }
    }

    pub fn with_search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = search_type;
        self
    }
}

/// Parameters for refreshing a single named entity in one region.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct RefreshParams {
    #[serde(rename = "apt_name")]
    pub target_name: String,
    pub region_code: String,
    pub months: u32,
}

impl RefreshParams {
    pub fn new(target_name: impl Into<String>, region_code: impl Into<String>) -> Self {
        Self {
            target_name: target_name.into(),
            region_code: region_code.into(),
            months: DEFAULT_MONTHS,
        }
    }

    pub fn with_months(mut self, months: u32) -> Self {
        self.months = months;
        self
    }
}

/// Kind-specific request parameters. Serializes as the bare parameter object.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum OperationParams {
    Search(SearchParams),
    Step1(Step1Params),
    Refresh(RefreshParams),
}

// ── OperationRequest ──────────────────────────────────────────────

/// A request flowing through the confirmation protocol.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct OperationRequest {
    #[serde(flatten)]
    params: OperationParams,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    confirmed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_choice: Option<CacheChoice>,
}

impl OperationRequest {
    fn from_params(params: OperationParams) -> Self {
        Self {
            params,
            confirmed: false,
            cache_choice: None,
        }
    }

    pub fn search(params: SearchParams) -> Self {
        Self::from_params(OperationParams::Search(params))
    }

    pub fn step1(params: Step1Params) -> Self {
        Self::from_params(OperationParams::Step1(params))
    }

    pub fn refresh(params: RefreshParams) -> Self {
        Self::from_params(OperationParams::Refresh(params))
    }

    pub fn kind(&self) -> OperationKind {
        match self.params {
            OperationParams::Search(_) => OperationKind::Search,
            OperationParams::Step1(_) => OperationKind::Step1Search,
            OperationParams::Refresh(_) => OperationKind::Refresh,
        }
    }

    pub fn params(&self) -> &OperationParams {
        &self.params
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn cache_choice(&self) -> Option<CacheChoice> {
        self.cache_choice
    }

    /// A copy of this request marked as confirmed for the costed call.
    pub fn with_confirmed(&self) -> Self {
        Self {
            confirmed: true,
            ..self.clone()
        }
    }

    /// A copy of this request carrying the caller's cache decision.
    pub fn with_cache_choice(&self, choice: CacheChoice) -> Self {
        Self {
            cache_choice: Some(choice),
            ..self.clone()
        }
    }

    /// Check kind-specific required fields. Runs before any network call.
    pub fn validate(&self) -> Result<(), GateError> {
        match &self.params {
            OperationParams::Search(p) => {
                require_non_empty("city", &p.city)?;
                require_non_empty("district", &p.district)?;
                require_months(p.months)?;
                if p.start_date.is_some() != p.end_date.is_some() {
                    return Err(GateError::validation(
                        "start_date",
                        "a date range needs both start_date and end_date",
                    ));
                }
                if let Some(name) = &p.apt_name {
                    require_non_empty("apt_name", name)?;
                }
                Ok(())
            }
            OperationParams::Step1(p) => {
                require_non_empty("city", &p.city)?;
                require_non_empty("district", &p.district)
            }
            OperationParams::Refresh(p) => {
                require_non_empty("apt_name", &p.target_name)?;
                require_non_empty("region_code", &p.region_code)?;
                if !p.region_code.chars().all(|c| c.is_ascii_digit()) {
                    return Err(GateError::validation(
                        "region_code",
                        format!("'{}' is not a numeric region code", p.region_code),
                    ));
                }
                require_months(p.months)
            }
        }
    }

    /// JSON body for POST endpoints.
    pub fn to_body(&self) -> Result<serde_json::Value, GateError> {
        Ok(serde_json::to_value(self)?)
    }
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), GateError> {
    if value.trim().is_empty() {
        return Err(GateError::validation(field, "must not be empty"));
    }
    Ok(())
}

fn require_months(months: u32) -> Result<(), GateError> {
    if months == 0 {
        return Err(GateError::validation("months", "must be at least 1"));
    }
    Ok(())
}
