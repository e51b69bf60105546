//! Engine options parsing and storage.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::str::FromStr;
use subledger_booking::AllocationMethod;
use subledger_core::FiscalYearEnd;
use subledger_events::EventRules;

/// Known option names.
const KNOWN_OPTIONS: &[&str] = &[
    "qualified_cutoff",
    "five_year_step_up",
    "seven_year_step_up",
    "allocation_method",
    "fiscal_year_end",
];

/// Option validation warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionWarning {
    /// Warning code (E7001, E7002, E7003).
    pub code: &'static str,
    /// Warning message.
    pub message: String,
    /// Option name.
    pub option: String,
    /// Option value.
    pub value: String,
}

impl OptionWarning {
    fn invalid(key: &str, value: &str, expected: &str) -> Self {
        Self {
            code: "E7002",
            message: format!("Invalid value \"{value}\" for option \"{key}\": expected {expected}"),
            option: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Engine options.
///
/// Every option has a default, so an engine built with [`Options::new`]
/// behaves as the platform does out of the box.
#[derive(Debug, Clone)]
pub struct Options {
    /// Date after which deferred gains on qualified investments are
    /// recognized.
    pub qualified_cutoff: NaiveDate,

    /// Five-year basis step-up rate.
    pub five_year_step_up: Decimal,

    /// Seven-year basis step-up rate.
    pub seven_year_step_up: Decimal,

    /// Allocation method for funds that do not configure one.
    pub allocation_method: AllocationMethod,

    /// Fiscal-year end for entities that do not configure one.
    pub fiscal_year_end: FiscalYearEnd,

    /// Options that have been set (for duplicate detection).
    #[doc(hidden)]
    pub set_options: HashSet<String>,

    /// Validation warnings collected while setting options.
    pub warnings: Vec<OptionWarning>,
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

impl Options {
    /// Create new options with defaults.
    #[must_use]
    pub fn new() -> Self {
        let rules = EventRules::default();
        Self {
            qualified_cutoff: rules.qualified_cutoff,
            five_year_step_up: rules.five_year_step_up,
            seven_year_step_up: rules.seven_year_step_up,
            allocation_method: AllocationMethod::default(),
            fiscal_year_end: FiscalYearEnd::default(),
            set_options: HashSet::new(),
            warnings: Vec::new(),
        }
    }

    /// Set an option by name.
    ///
    /// Validates the option and collects any warnings in `self.warnings`.
    /// Invalid values leave the previous value in place.
    pub fn set(&mut self, key: &str, value: &str) {
        // Check for unknown options (E7001)
        let is_known = KNOWN_OPTIONS.contains(&key);
        if !is_known {
            self.warnings.push(OptionWarning {
                code: "E7001",
                message: format!("Unknown option \"{key}\""),
                option: key.to_string(),
                value: value.to_string(),
            });
            return;
        }

        // Check for duplicates (E7003)
        if self.set_options.contains(key) {
            self.warnings.push(OptionWarning {
                code: "E7003",
                message: format!("Option \"{key}\" can only be specified once"),
                option: key.to_string(),
                value: value.to_string(),
            });
        }
        self.set_options.insert(key.to_string());

        let value = value.trim();
        match key {
            "qualified_cutoff" => match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
                Ok(date) => self.qualified_cutoff = date,
                Err(_) => self
                    .warnings
                    .push(OptionWarning::invalid(key, value, "date (YYYY-MM-DD)")),
            },
            "five_year_step_up" => match parse_rate(value) {
                Some(rate) => self.five_year_step_up = rate,
                None => self
                    .warnings
                    .push(OptionWarning::invalid(key, value, "rate between 0 and 1")),
            },
            "seven_year_step_up" => match parse_rate(value) {
                Some(rate) => self.seven_year_step_up = rate,
                None => self
                    .warnings
                    .push(OptionWarning::invalid(key, value, "rate between 0 and 1")),
            },
            "allocation_method" => match value.parse() {
                Ok(method) => self.allocation_method = method,
                Err(_) => self.warnings.push(OptionWarning::invalid(key, value, "FIFO")),
            },
            "fiscal_year_end" => match value.parse() {
                Ok(fy) => self.fiscal_year_end = fy,
                Err(_) => self
                    .warnings
                    .push(OptionWarning::invalid(key, value, "month and day (MMDD)")),
            },
            _ => {}
        }
    }

    /// The event rule set these options describe.
    #[must_use]
    pub fn event_rules(&self) -> EventRules {
        EventRules {
            qualified_cutoff: self.qualified_cutoff,
            five_year_step_up: self.five_year_step_up,
            seven_year_step_up: self.seven_year_step_up,
        }
    }
}

fn parse_rate(value: &str) -> Option<Decimal> {
    Decimal::from_str(value)
        .ok()
        .filter(|rate| (Decimal::ZERO..=Decimal::ONE).contains(rate))
}
