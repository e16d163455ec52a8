//! Dashboard filter selection.
//!
//! Each dimension is an `Option` of a set. `None` places no restriction on that
//! dimension; `Some(set)` keeps only records whose value is in the set, so a
//! present-but-empty set keeps nothing. Dimensions combine with AND.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::sales::SalesRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection {
    pub months: Option<BTreeSet<String>>,
    pub categories: Option<BTreeSet<String>>,
    pub regions: Option<BTreeSet<String>>,
}

fn restriction(choices: &[String]) -> Option<BTreeSet<String>> {
    let chosen = choices
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>();
    (!chosen.is_empty()).then_some(chosen)
}

fn allows(set: &Option<BTreeSet<String>>, value: Option<&str>) -> bool {
    match set {
        None => true,
        Some(allowed) => value.is_some_and(|v| allowed.contains(v)),
    }
}

impl FilterSelection {
    /// No restriction on any dimension.
    pub fn all() -> Self {
        Self::default()
    }

    /// Builds a selection from widget-style choices, where an empty list
    /// means nothing was chosen for that dimension.
    pub fn from_choices(months: &[String], categories: &[String], regions: &[String]) -> Self {
        Self {
            months: restriction(months),
            categories: restriction(categories),
            regions: restriction(regions),
        }
    }

    pub fn with_months<I, S>(mut self, months: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.months = Some(months.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = Some(categories.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions = Some(regions.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_unrestricted(&self) -> bool {
        self.months.is_none() && self.categories.is_none() && self.regions.is_none()
    }

    /// A record without a date has no month and fails any month restriction.
    pub fn matches(&self, record: &SalesRecord) -> bool {
        allows(&self.months, record.month.as_deref())
            && allows(&self.categories, Some(record.category.as_str()))
            && allows(&self.regions, Some(record.region.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(month: Option<(i32, u32)>, category: &str, region: &str) -> SalesRecord {
        let date = month.and_then(|(y, m)| NaiveDate::from_ymd_opt(y, m, 1));
        SalesRecord::new(date, None, category, "Shipped", region)
    }

    #[test]
    fn unrestricted_selection_matches_everything() {
        let selection = FilterSelection::all();
        assert!(selection.is_unrestricted());
        assert!(selection.matches(&record(None, "A", "X")));
    }

    #[test]
    fn empty_choices_mean_no_restriction() {
        let selection = FilterSelection::from_choices(&[], &[" ".to_string()], &[]);
        assert!(selection.is_unrestricted());
    }

    #[test]
    fn present_but_empty_set_matches_nothing() {
        let selection = FilterSelection::all().with_categories(Vec::<String>::new());
        assert!(!selection.is_unrestricted());
        assert!(!selection.matches(&record(Some((2024, 1)), "A", "X")));
    }

    #[test]
    fn dimensions_combine_with_and() {
        let selection = FilterSelection::all()
            .with_months(["2024-01"])
            .with_regions(["X", "Y"]);
        assert!(selection.matches(&record(Some((2024, 1)), "A", "Y")));
        assert!(!selection.matches(&record(Some((2024, 2)), "A", "Y")));
        assert!(!selection.matches(&record(Some((2024, 1)), "A", "Z")));
        assert!(!selection.matches(&record(None, "A", "X")));
    }
}
