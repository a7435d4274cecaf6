//! Placeholder substitution for email templates.
//!
//! Placeholders look like `{{ first_name }}`. Only the fields of
//! [`TemplateContext`] are substituted; anything else is left exactly as
//! written.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::lead::Lead;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern is valid")
});

/// Values available to a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateContext {
    pub first_name: String,
    pub last_name: String,
    pub city: String,
    pub project_type: String,
    pub reference: String,
    pub payment_link: String,
}

impl TemplateContext {
    pub fn for_lead(lead: &Lead, payment_link: impl Into<String>) -> Self {
        Self {
            first_name: lead.first_name.clone().unwrap_or_default(),
            last_name: lead.last_name.clone().unwrap_or_default(),
            city: lead.city.clone().unwrap_or_default(),
            project_type: lead.project_type.clone().unwrap_or_default(),
            reference: lead.reference(),
            payment_link: payment_link.into(),
        }
    }

    fn value(&self, name: &str) -> Option<&str> {
        match name {
            "first_name" => Some(&self.first_name),
            "last_name" => Some(&self.last_name),
            "city" => Some(&self.city),
            "project_type" => Some(&self.project_type),
            "reference" => Some(&self.reference),
            "payment_link" => Some(&self.payment_link),
            _ => None,
        }
    }
}

/// Substitute known placeholders; unknown ones stay literal.
pub fn render(template: &str, context: &TemplateContext) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match context.value(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> TemplateContext {
        TemplateContext {
            first_name: "Jean".to_string(),
            last_name: "Dupont".to_string(),
            city: "Paris".to_string(),
            project_type: "maison_individuelle".to_string(),
            reference: "RAC-3F2A9C10".to_string(),
            payment_link: "https://pay.example/p/abc".to_string(),
        }
    }

    #[test]
    fn substitutes_known_placeholders() {
        let out = render(
            "Bonjour {{first_name}} {{ last_name }}, dossier {{reference}} à {{city}}.",
            &context(),
        );
        assert_eq!(out, "Bonjour Jean Dupont, dossier RAC-3F2A9C10 à Paris.");
    }

    #[test]
    fn leaves_unknown_placeholders_untouched() {
        let out = render("{{ first_name }} {{ agent_name }} {{payment_link}}", &context());
        assert_eq!(out, "Jean {{ agent_name }} https://pay.example/p/abc");
    }

    #[test]
    fn ignores_malformed_syntax() {
        let template = "{first_name} {{ first name }} {{}}";
        assert_eq!(render(template, &context()), template);
    }
}
