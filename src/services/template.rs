// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Message templates with `{{key}}` placeholders.
//!
//! Built-in Arabic templates are overlaid with a tenant's own overrides
//! into a [`TemplateSet`] that handlers receive explicitly.

use crate::models::TenantSettings;
use chrono::NaiveDateTime;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

pub const HELP: &str = "help";
pub const DISMISSAL_CONFIRMATION: &str = "dismissal_confirmation";
pub const DISMISSAL_UNKNOWN_STUDENT: &str = "dismissal_unknown_student";
pub const DISMISSAL_AMBIGUOUS_STUDENT: &str = "dismissal_ambiguous_student";

const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    (
        HELP,
        "مرحباً بكم في {{nurseryName}} 🌷\nلطلب استئذان لطفلك أرسل: استئذان اسم الطالب الوقت السبب\nمثال: استئذان سارة 12:30 موعد طبيب",
    ),
    (
        DISMISSAL_CONFIRMATION,
        "تم استلام طلب الاستئذان للطالب {{studentName}} الساعة {{pickupTime}} ✅\nرمز الاستلام: {{pin}}\n{{nurseryName}}",
    ),
    (
        DISMISSAL_UNKNOWN_STUDENT,
        "لم نتمكن من التعرف على اسم الطالب \"{{studentName}}\". الرجاء كتابة اسم الطالب كما هو مسجل لدى {{nurseryName}}.",
    ),
    (
        DISMISSAL_AMBIGUOUS_STUDENT,
        "يوجد أكثر من طالب مطابق للاسم \"{{studentName}}\": {{candidates}}\nالرجاء إرسال الاسم الكامل.",
    ),
];

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_re() -> &'static Regex {
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").unwrap())
}

/// Values available to every template without the caller passing them.
#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub now: NaiveDateTime,
    pub nursery_name: String,
}

/// Render `template`, replacing `{{key}}` with `vars[key]`.
///
/// `currentTime`, `currentDate` and `nurseryName` come from `ctx` unless the
/// caller supplied them. Unknown placeholders render as empty strings.
pub fn render_template(
    template: &str,
    vars: &HashMap<String, String>,
    ctx: &TemplateContext,
) -> String {
    placeholder_re()
        .replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            if let Some(value) = vars.get(key) {
                return value.clone();
            }
            match key {
                "currentTime" => ctx.now.format("%H:%M").to_string(),
                "currentDate" => ctx.now.format("%Y-%m-%d").to_string(),
                "nurseryName" => ctx.nursery_name.clone(),
                _ => String::new(),
            }
        })
        .into_owned()
}

/// Named templates for one tenant.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    templates: HashMap<String, String>,
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self {
            templates: DEFAULT_TEMPLATES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl TemplateSet {
    /// Built-in templates overlaid with the tenant's overrides.
    pub fn for_tenant(settings: &TenantSettings) -> Self {
        let mut set = Self::default();
        for (name, body) in &settings.templates {
            if !body.trim().is_empty() {
                set.templates.insert(name.clone(), body.clone());
            }
        }
        set
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }

    /// Render a named template; a missing template renders as `None`.
    pub fn render(
        &self,
        name: &str,
        vars: &HashMap<String, String>,
        ctx: &TemplateContext,
    ) -> Option<String> {
        self.get(name).map(|t| render_template(t, vars, ctx))
    }
}

/// Build a variables map from string pairs.
pub fn vars<const N: usize>(pairs: [(&str, String); N]) -> HashMap<String, String> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ctx() -> TemplateContext {
        TemplateContext {
            now: NaiveDate::from_ymd_opt(2026, 3, 10)
                .unwrap()
                .and_hms_opt(9, 5, 0)
                .unwrap(),
            nursery_name: "روضة النور".to_string(),
        }
    }

    #[test]
    fn replaces_supplied_values() {
        let out = render_template(
            "Hello {{name}}, class {{ class }}",
            &vars([("name", "Sara".to_string()), ("class", "KG1".to_string())]),
            &ctx(),
        );
        assert_eq!(out, "Hello Sara, class KG1");
    }

    #[test]
    fn unknown_placeholders_become_empty() {
        let out = render_template("[{{missing}}]", &HashMap::new(), &ctx());
        assert_eq!(out, "[]");
    }

    #[test]
    fn implicit_placeholders() {
        let out = render_template(
            "{{currentDate}} {{currentTime}} {{nurseryName}}",
            &HashMap::new(),
            &ctx(),
        );
        assert_eq!(out, "2026-03-10 09:05 روضة النور");
    }

    #[test]
    fn caller_overrides_implicit_values() {
        let out = render_template(
            "{{nurseryName}}",
            &vars([("nurseryName", "Other".to_string())]),
            &ctx(),
        );
        assert_eq!(out, "Other");
    }

    #[test]
    fn no_nested_rendering() {
        let out = render_template(
            "{{a}}",
            &vars([("a", "{{b}}".to_string()), ("b", "x".to_string())]),
            &ctx(),
        );
        assert_eq!(out, "{{b}}");
    }

    #[test]
    fn tenant_overrides_builtin() {
        let settings = TenantSettings {
            tenant_id: "t1".to_string(),
            slug: "alnoor".to_string(),
            nursery_name: "Al Noor".to_string(),
            webhook_secret: None,
            templates: HashMap::from([
                (HELP.to_string(), "Custom help for {{nurseryName}}".to_string()),
                (DISMISSAL_CONFIRMATION.to_string(), "  ".to_string()),
            ]),
            whatsapp: None,
            marketing_webhook_url: None,
            marketing_webhook_secret: None,
        };

        let set = TemplateSet::for_tenant(&settings);
        assert_eq!(set.get(HELP), Some("Custom help for {{nurseryName}}"));
        // Blank overrides keep the built-in text
        assert!(set.get(DISMISSAL_CONFIRMATION).unwrap().contains("{{pin}}"));
    }
}
