//! Inclusion and exclusion rules.
//!
//! A section's rules are evaluated in document order and the last rule that
//! matches an entry decides its fate, so a later `<Include>` re-admits an
//! entry an earlier `<Exclude>` removed and vice versa.

use menutree_source::{Element, LauncherRecord};

use super::SectionError;

/// A predicate over launcher records
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Criterion {
    /// Desktop-file id equals
    Filename(String),
    /// `Categories` contains
    Category(String),
    All,
    And(Vec<Criterion>),
    Or(Vec<Criterion>),
    /// None of the children match
    Not(Vec<Criterion>),
}

impl Criterion {
    pub(crate) fn matches(&self, record: &LauncherRecord) -> bool {
        match self {
            Self::Filename(id) => record.desktop_file_id == *id,
            Self::Category(category) => record.has_category(category),
            Self::All => true,
            Self::And(children) => !children.is_empty() && children.iter().all(|c| c.matches(record)),
            Self::Or(children) => children.iter().any(|c| c.matches(record)),
            Self::Not(children) => !children.iter().any(|c| c.matches(record)),
        }
    }

    fn from_element(element: &Element) -> Result<Self, SectionError> {
        match element.name.as_str() {
            "Filename" => Ok(Self::Filename(required_text(element)?)),
            "Category" => Ok(Self::Category(required_text(element)?)),
            "All" => Ok(Self::All),
            "And" => Ok(Self::And(criteria(element)?)),
            "Or" => Ok(Self::Or(criteria(element)?)),
            "Not" => Ok(Self::Not(criteria(element)?)),
            other => Err(SectionError::UnknownElement {
                element: other.to_string(),
                context: "rule",
            }),
        }
    }
}

/// One `<Include>` or `<Exclude>`; its criteria are OR-ed
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Rule {
    Include(Vec<Criterion>),
    Exclude(Vec<Criterion>),
}

impl Rule {
    pub(crate) fn include(element: &Element) -> Result<Self, SectionError> {
        Ok(Self::Include(criteria(element)?))
    }

    pub(crate) fn exclude(element: &Element) -> Result<Self, SectionError> {
        Ok(Self::Exclude(criteria(element)?))
    }

    fn matches(&self, record: &LauncherRecord) -> bool {
        let criteria = match self {
            Self::Include(c) | Self::Exclude(c) => c,
        };
        criteria.iter().any(|c| c.matches(record))
    }
}

/// Outcome of a section's rules for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Included,
    Excluded,
    /// No rule mentioned the record
    Unmatched,
}

/// Verdict of the last rule matching `record`
pub(crate) fn evaluate(rules: &[Rule], record: &LauncherRecord) -> Verdict {
    rules
        .iter()
        .rev()
        .find(|rule| rule.matches(record))
        .map(|rule| match rule {
            Rule::Include(_) => Verdict::Included,
            Rule::Exclude(_) => Verdict::Excluded,
        })
        .unwrap_or(Verdict::Unmatched)
}

fn criteria(element: &Element) -> Result<Vec<Criterion>, SectionError> {
    element.children.iter().map(Criterion::from_element).collect()
}

fn required_text(element: &Element) -> Result<String, SectionError> {
    let text = element.text();
    if text.is_empty() {
        return Err(SectionError::EmptyElement(element.name.clone()));
    }
    Ok(text.to_string())
}
