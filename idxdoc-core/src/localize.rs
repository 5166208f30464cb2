use crate::report::Diagnostic;
use fluent_bundle::{FluentArgs, FluentBundle, FluentResource, FluentValue};
use tracing::warn;
use unic_langid::LanguageIdentifier;

const EN_GB: &str = include_str!("../i18n/en-GB.ftl");

/// Fluent-based localizer with built-in resources.
pub struct FluentLoc {
    bundle: FluentBundle<FluentResource>,
}

impl FluentLoc {
    /// Create a localizer using built-in `.ftl` strings (see ../i18n).
    pub fn builtin(lang: &str) -> Self {
        let fallback = LanguageIdentifier::from_bytes(b"en-GB").unwrap_or_default();
        let langid: LanguageIdentifier = lang.parse().unwrap_or(fallback);

        // Only en-GB ships today; every request falls back to it.
        let ftl_src = EN_GB;

        let mut bundle = FluentBundle::new(vec![langid]);
        // Plain terminal output; no bidi isolation marks around arguments.
        bundle.set_use_isolating(false);
        match FluentResource::try_new(ftl_src.to_owned()) {
            Ok(res) => {
                if let Err(errs) = bundle.add_resource(res) {
                    warn!(?errs, "duplicate messages in built-in FTL");
                }
            }
            Err((_, errs)) => warn!(?errs, "built-in FTL failed to parse"),
        }
        Self { bundle }
    }

    /// Format a message by code with named args (("name","value"), ...).
    /// Returns the code itself if not found.
    pub fn msg(&self, code: &str, args: &[(&str, &str)]) -> String {
        let Some(msg) = self.bundle.get_message(code) else {
            return code.to_string();
        };
        let Some(pattern) = msg.value() else {
            return code.to_string();
        };

        let mut fa = FluentArgs::new();
        for (k, v) in args {
            fa.set(*k, FluentValue::from(*v));
        }

        let mut errs = vec![];
        let s = self.bundle.format_pattern(pattern, Some(&fa), &mut errs).to_string();

        if errs.is_empty() {
            s
        } else {
            code.to_string()
        }
    }

    pub fn render(&self, d: &Diagnostic) -> String {
        let args: Vec<(&str, &str)> = d.args.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        self.msg(&d.code, &args)
    }
}
