use crate::dist_info::InspectError;
use crate::record::RecordError;
use crate::verify::Discrepancy;
use fluent_bundle::{FluentArgs, FluentBundle, FluentResource, FluentValue};
use unic_langid::LanguageIdentifier;

const EN_GB: &str = include_str!("../i18n/en-GB.ftl");

/// Message lookup by stable code with named string arguments.
pub trait Localize {
    /// Returns the code itself if there is no such message.
    fn msg(&self, code: &str, args: &[(&str, &str)]) -> String;

    fn discrepancy(&self, d: &Discrepancy) -> String {
        let args: Vec<(&str, String)> = match d {
            Discrepancy::Missing { path }
            | Discrepancy::UndeclaredPath { path }
            | Discrepancy::NullEntry { path } => vec![("path", path.clone())],
            Discrepancy::TypeMismatch { path, record_type, actual_type } => vec![
                ("path", path.clone()),
                ("record_type", record_type.to_string()),
                ("actual_type", actual_type.to_string()),
            ],
            Discrepancy::SizeMismatch { path, record_size, actual_size } => vec![
                ("path", path.clone()),
                ("record_size", record_size.to_string()),
                ("actual_size", actual_size.to_string()),
            ],
            Discrepancy::DigestMismatch { path, algorithm, record_digest, actual_digest } => vec![
                ("path", path.clone()),
                ("algorithm", algorithm.to_string()),
                ("record_digest", record_digest.clone()),
                ("actual_digest", actual_digest.clone()),
            ],
        };
        let args: Vec<(&str, &str)> = args.iter().map(|(k, v)| (*k, v.as_str())).collect();
        self.msg(d.kind(), &args)
    }

    /// Malformed-RECORD errors get a localised line; everything else keeps
    /// its own message.
    fn error(&self, e: &InspectError) -> String {
        let InspectError::Record(re) = e else {
            return e.to_string();
        };
        if matches!(re, RecordError::Csv(_) | RecordError::RowLength { .. }) {
            return re.to_string();
        }
        let detail = re.to_string();
        let path = re.path().unwrap_or("");
        self.msg("MalformedRecord", &[("path", path), ("detail", detail.as_str())])
    }
}

/// Fluent-based localizer with built-in resources.
pub struct FluentLoc {
    bundle: FluentBundle<FluentResource>,
}

impl FluentLoc {
    /// Create a localizer using built-in `.ftl` strings (see ../i18n).
    /// Unknown languages fall back to en-GB.
    pub fn builtin(lang: &str) -> Self {
        let langid: LanguageIdentifier =
            lang.parse().unwrap_or_else(|_| "en-GB".parse().expect("static language id"));

        let ftl_src = match lang {
            "en-GB" | "en" => EN_GB,
            _ => EN_GB,
        };

        let res = FluentResource::try_new(ftl_src.to_owned())
            .expect("invalid FTL resource (en-GB.ftl)");

        let mut bundle = FluentBundle::new(vec![langid]);
        // Paths and digests are printed to terminals; no bidi marks.
        bundle.set_use_isolating(false);
        bundle.add_resource(res).expect("failed to add FTL resource");
        Self { bundle }
    }
}

impl Localize for FluentLoc {
    fn msg(&self, code: &str, args: &[(&str, &str)]) -> String {
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
}

/// A no-op localizer you can use in tests.
pub struct NoopLoc;

impl Localize for NoopLoc {
    fn msg(&self, code: &str, _args: &[(&str, &str)]) -> String {
        code.to_string()
    }
}
