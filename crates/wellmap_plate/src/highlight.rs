//! Ordered highlight rule resolution.

use regex::Regex;

use crate::conf::C_HIGHLIGHT_RULE_SEP;
use crate::spec::{PlateError, SpecCellStyle, SpecHighlightRule};

impl SpecHighlightRule {
    /// Parse a `pattern;background;text` triple. Empty colors become `None`.
    pub fn from_triple(rule: &str) -> Result<Self, PlateError> {
        let l_parts: Vec<&str> = rule.split(C_HIGHLIGHT_RULE_SEP).collect();
        let [pattern, bg_color, font_color] = l_parts.as_slice() else {
            return Err(PlateError::InvalidHighlightRule {
                rule: rule.to_string(),
            });
        };
        if pattern.is_empty() {
            return Err(PlateError::InvalidHighlightRule {
                rule: rule.to_string(),
            });
        }

        Ok(Self {
            pattern: pattern.to_string(),
            bg_color: derive_color_text(bg_color),
            font_color: derive_color_text(font_color),
        })
    }
}

fn derive_color_text(value: &str) -> Option<String> {
    let c_value = value.trim();
    if c_value.is_empty() {
        None
    } else {
        Some(c_value.to_string())
    }
}

/// Compiled highlight rules, kept in caller order.
///
/// Patterns are matched case-sensitively; prefix a pattern with `(?i)`
/// to ignore case.
#[derive(Debug, Clone, Default)]
pub struct SpecHighlightRules {
    l_rules: Vec<(Regex, SpecHighlightRule)>,
}

impl SpecHighlightRules {
    /// Compile rules in the given order.
    pub fn compile(rules: &[SpecHighlightRule]) -> Result<Self, PlateError> {
        let mut l_rules = Vec::with_capacity(rules.len());
        for rule in rules {
            let regex =
                Regex::new(&rule.pattern).map_err(|e| PlateError::InvalidHighlightPattern {
                    pattern: rule.pattern.clone(),
                    message: e.to_string(),
                })?;
            l_rules.push((regex, rule.clone()));
        }
        Ok(Self { l_rules })
    }

    /// Parse and compile `pattern;background;text` triples.
    pub fn from_triples<S: AsRef<str>>(rules: &[S]) -> Result<Self, PlateError> {
        let l_rules = rules
            .iter()
            .map(|rule| SpecHighlightRule::from_triple(rule.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::compile(&l_rules)
    }

    /// Rules in match order.
    pub fn rules(&self) -> impl Iterator<Item = &SpecHighlightRule> {
        self.l_rules.iter().map(|(_, rule)| rule)
    }

    pub fn len(&self) -> usize {
        self.l_rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.l_rules.is_empty()
    }

    /// Style of the first rule matching `value`.
    ///
    /// The first match wins even when it carries no colors, in which case
    /// the cell stays unstyled.
    pub fn resolve(&self, value: Option<&str>) -> Option<SpecCellStyle> {
        let value = value.filter(|v| !v.trim().is_empty())?;
        let (_, rule) = self.l_rules.iter().find(|(regex, _)| regex.is_match(value))?;
        if rule.bg_color.is_none() && rule.font_color.is_none() {
            return None;
        }
        Some(SpecCellStyle {
            bg_color: rule.bg_color.clone(),
            font_color: rule.font_color.clone(),
        })
    }
}

/// Resolve the style of one cell value against ordered rules.
pub fn resolve_style(value: Option<&str>, rules: &SpecHighlightRules) -> Option<SpecCellStyle> {
    rules.resolve(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, bg: &str, fg: &str) -> SpecHighlightRule {
        SpecHighlightRule {
            pattern: pattern.to_string(),
            bg_color: derive_color_text(bg),
            font_color: derive_color_text(fg),
        }
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let rules =
            SpecHighlightRules::compile(&[rule("Ctrl", "yellow", ""), rule("Pos", "", "red")])
                .expect("compile");
        let style = resolve_style(Some("Pos Ctrl"), &rules).expect("styled");
        assert_eq!(style.to_css(), "background-color:yellow");
        assert_eq!(style.font_color, None);
    }

    #[test]
    fn test_rule_order_changes_result() {
        let rules =
            SpecHighlightRules::compile(&[rule("Pos", "", "red"), rule("Ctrl", "yellow", "")])
                .expect("compile");
        let style = resolve_style(Some("Pos Ctrl"), &rules).expect("styled");
        assert_eq!(style.to_css(), "color:red");
    }

    #[test]
    fn test_blank_or_unmatched_values_are_unstyled() {
        let rules = SpecHighlightRules::compile(&[rule("UT", "#FFFF00", "")]).expect("compile");
        assert_eq!(resolve_style(None, &rules), None);
        assert_eq!(resolve_style(Some(""), &rules), None);
        assert_eq!(resolve_style(Some("   "), &rules), None);
        assert_eq!(resolve_style(Some("KE12"), &rules), None);
        assert!(resolve_style(Some("UT12"), &rules).is_some());
    }

    #[test]
    fn test_colorless_match_stops_resolution() {
        let rules = SpecHighlightRules::compile(&[rule("Ctrl", "", ""), rule("Pos", "green", "")])
            .expect("compile");
        assert_eq!(resolve_style(Some("Pos Ctrl"), &rules), None);
    }

    #[test]
    fn test_patterns_are_case_sensitive() {
        let rules = SpecHighlightRules::compile(&[rule("ctrl", "yellow", "")]).expect("compile");
        assert_eq!(resolve_style(Some("Pos Ctrl"), &rules), None);
        assert!(resolve_style(Some("pos ctrl"), &rules).is_some());
    }

    #[test]
    fn test_case_insensitive_opt_in() {
        let rules = SpecHighlightRules::compile(&[rule("(?i)ctrl", "yellow", "")])
            .expect("compile");
        let style = resolve_style(Some("Pos Ctrl"), &rules).expect("styled");
        assert_eq!(style.bg_color.as_deref(), Some("yellow"));
        assert!(resolve_style(Some("NEG CTRL"), &rules).is_some());
    }

    #[test]
    fn test_from_triples() {
        let rules = SpecHighlightRules::from_triples(&["Pos Ctrl;yellow;", "Neg Ctrl;;red"])
            .expect("parse");
        assert_eq!(rules.len(), 2);
        let l_rules: Vec<_> = rules.rules().cloned().collect();
        assert_eq!(l_rules[0], rule("Pos Ctrl", "yellow", ""));
        assert_eq!(l_rules[1], rule("Neg Ctrl", "", "red"));

        assert!(matches!(
            SpecHighlightRule::from_triple("Pos Ctrl;yellow"),
            Err(PlateError::InvalidHighlightRule { .. })
        ));
        assert!(matches!(
            SpecHighlightRules::from_triples(&["(;red;"]),
            Err(PlateError::InvalidHighlightPattern { .. })
        ));
    }
}
