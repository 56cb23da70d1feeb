use regex::Regex;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

const PROJECT_VERSION: &str = r"[A-Za-z0-9](?:[A-Za-z0-9._]*[A-Za-z0-9])?-[A-Za-z0-9_.!+]+";

/// Files in dist-info that sign RECORD and so cannot be listed in it.
pub const SIGNATURE_FILES: [&str; 2] = ["RECORD.jws", "RECORD.p7s"];

/// The two top-level directories named `{project}-{version}{suffix}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpecialDir {
    DistInfo,
    Data,
}

impl SpecialDir {
    pub fn suffix(self) -> &'static str {
        match self {
            SpecialDir::DistInfo => ".dist-info",
            SpecialDir::Data => ".data",
        }
    }

    fn regex(self) -> &'static Regex {
        static DIST_INFO: OnceLock<Regex> = OnceLock::new();
        static DATA: OnceLock<Regex> = OnceLock::new();
        let cell = match self {
            SpecialDir::DistInfo => &DIST_INFO,
            SpecialDir::Data => &DATA,
        };
        cell.get_or_init(|| {
            let pat = format!(r"^{PROJECT_VERSION}{}/?$", regex::escape(self.suffix()));
            Regex::new(&pat).expect("static special-dir regex")
        })
    }

    pub fn matches(self, name: &str) -> bool {
        self.regex().is_match(name)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SpecialDirError {
    #[error("No *{suffix} directory in wheel")]
    Missing { suffix: &'static str },
    #[error("Wheel contains multiple *{suffix} directories")]
    Multiple { suffix: &'static str },
    #[error(
        "Project & version of wheel's *{suffix} directory do not match wheel name: {dirname:?} vs. '{wheel_name}'"
    )]
    NameMismatch { suffix: &'static str, dirname: String, wheel_name: String },
}

pub fn is_dist_info_dir(name: &str) -> bool {
    !name.ends_with('/') && SpecialDir::DistInfo.matches(name)
}

pub fn is_data_dir(name: &str) -> bool {
    !name.ends_with('/') && SpecialDir::Data.matches(name)
}

/// `path` is `{X}.dist-info/{name}` for some dist-info directory `X`.
pub fn is_dist_info_path(path: &str, name: &str) -> bool {
    match path.split_once('/') {
        Some((pre, post)) => is_dist_info_dir(pre) && post == name,
        None => false,
    }
}

pub fn is_signature_file(path: &str) -> bool {
    SIGNATURE_FILES.iter().any(|sig| is_dist_info_path(path, sig))
}

/// Paths a verifier accepts with neither digest nor size.
pub fn filedata_is_optional(path: &str) -> bool {
    is_dist_info_path(path, "RECORD") || is_signature_file(path)
}

/// The unique top-level directory of kind `which`, without trailing slash.
pub fn find_special_dir<I, S>(
    which: SpecialDir,
    dirnames: I,
    wheel_name: Option<&WheelName>,
    required: bool,
) -> Result<Option<String>, SpecialDirError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let suffix = which.suffix();
    let mut candidates = dirnames
        .into_iter()
        .filter(|n| which.matches(n.as_ref()))
        .map(|n| n.as_ref().trim_end_matches('/').to_string());
    let Some(winner) = candidates.next() else {
        return if required { Err(SpecialDirError::Missing { suffix }) } else { Ok(None) };
    };
    if candidates.next().is_some() {
        return Err(SpecialDirError::Multiple { suffix });
    }
    if let Some(wn) = wheel_name {
        let stem = &winner[..winner.len() - suffix.len()];
        let (project, version) = stem.split_once('-').unwrap_or((stem, ""));
        if canonicalize_name(project) != canonicalize_name(&wn.project)
            || canonicalize_version(version) != canonicalize_version(&wn.version)
        {
            return Err(SpecialDirError::NameMismatch {
                suffix,
                dirname: winner,
                wheel_name: wn.to_string(),
            });
        }
    }
    Ok(Some(winner))
}

pub fn canonicalize_name(name: &str) -> String {
    static SEP: OnceLock<Regex> = OnceLock::new();
    let sep = SEP.get_or_init(|| Regex::new(r"[-_.]+").expect("static separator regex"));
    sep.replace_all(name, "-").to_ascii_lowercase()
}

// Loose: enough to compare a directory name with a wheel filename.
pub fn canonicalize_version(version: &str) -> String {
    static RELEASE: OnceLock<Regex> = OnceLock::new();
    static POST: OnceLock<Regex> = OnceLock::new();
    let release =
        RELEASE.get_or_init(|| Regex::new(r"^(\d+(?:\.\d+)*)(.*)$").expect("static release regex"));
    let post = POST.get_or_init(|| Regex::new(r"-(\d+)$").expect("static post regex"));

    let lower = version.to_ascii_lowercase().replace('_', "-");
    let v = lower.strip_prefix('v').unwrap_or(&lower);
    let v = post.replace(v, ".post$1");
    let Some(caps) = release.captures(&v) else {
        return v.to_string();
    };
    let mut nums: Vec<&str> = caps[1].split('.').collect();
    while nums.len() > 1 && nums.last().is_some_and(|n| n.trim_start_matches('0').is_empty()) {
        nums.pop();
    }
    let nums: Vec<String> = nums
        .iter()
        .map(|n| {
            let t = n.trim_start_matches('0');
            if t.is_empty() { "0".to_string() } else { t.to_string() }
        })
        .collect();
    format!("{}{}", nums.join("."), &caps[2])
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid wheel filename: {0:?}")]
pub struct InvalidWheelName(pub String);

/// `{project}-{version}(-{build})?-{python}-{abi}-{platform}.whl`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelName {
    pub project: String,
    pub version: String,
    pub build: Option<String>,
    pub python_tags: String,
    pub abi_tags: String,
    pub platform_tags: String,
}

impl WheelName {
    /// Parse the final component of `path`.
    pub fn from_path(path: &Path) -> Result<Self, InvalidWheelName> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| InvalidWheelName(path.display().to_string()))?;
        name.parse()
    }
}

impl FromStr for WheelName {
    type Err = InvalidWheelName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || InvalidWheelName(s.to_string());
        let stem = s.strip_suffix(".whl").ok_or_else(bad)?;
        let fields: Vec<&str> = stem.split('-').collect();
        let (project, version, build, rest) = match fields.as_slice() {
            [p, v, py, abi, plat] => (*p, *v, None, [*py, *abi, *plat]),
            [p, v, b, py, abi, plat] => (*p, *v, Some(b.to_string()), [*py, *abi, *plat]),
            _ => return Err(bad()),
        };
        if fields.iter().any(|f| f.is_empty()) {
            return Err(bad());
        }
        Ok(WheelName {
            project: project.to_string(),
            version: version.to_string(),
            build,
            python_tags: rest[0].to_string(),
            abi_tags: rest[1].to_string(),
            platform_tags: rest[2].to_string(),
        })
    }
}

impl fmt::Display for WheelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.project, self.version)?;
        if let Some(b) = &self.build {
            write!(f, "-{b}")?;
        }
        write!(f, "-{}-{}-{}.whl", self.python_tags, self.abi_tags, self.platform_tags)
    }
}
