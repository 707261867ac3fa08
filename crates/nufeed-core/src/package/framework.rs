//! Target-framework derivation from archive entry paths.
//!
//! Library entries live under `lib/<framework>/...`. A package with no
//! recognizable framework folders is treated as supporting every framework;
//! that permissive fallback also covers unreadable archives.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

/// Frameworks a package can target, by library folder name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TargetFramework {
    Net11,
    Net20,
    Net35,
    Net40,
    Net45,
    Sl4,
    Sl5,
}

impl TargetFramework {
    pub const ALL: [TargetFramework; 7] = [
        TargetFramework::Net11,
        TargetFramework::Net20,
        TargetFramework::Net35,
        TargetFramework::Net40,
        TargetFramework::Net45,
        TargetFramework::Sl4,
        TargetFramework::Sl5,
    ];

    /// The full framework set, used as the permissive fallback.
    pub fn all() -> BTreeSet<TargetFramework> {
        Self::ALL.into_iter().collect()
    }

    /// Resolves a `lib/` folder name, case-insensitively.
    pub fn by_folder_name(name: &str) -> Option<TargetFramework> {
        let folded = name.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|fw| fw.folder_name() == folded)
    }

    pub fn folder_name(&self) -> &'static str {
        match self {
            TargetFramework::Net11 => "net11",
            TargetFramework::Net20 => "net20",
            TargetFramework::Net35 => "net35",
            TargetFramework::Net40 => "net40",
            TargetFramework::Net45 => "net45",
            TargetFramework::Sl4 => "sl4",
            TargetFramework::Sl5 => "sl5",
        }
    }
}

impl fmt::Display for TargetFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder_name())
    }
}

/// Derives the supported frameworks from archive entry paths.
///
/// Unrecognized framework folders are ignored with a warning. Zero matches
/// yield the full set.
pub fn from_entry_paths<'a, I>(paths: I) -> BTreeSet<TargetFramework>
where
    I: IntoIterator<Item = &'a str>,
{
    static LIB_FOLDER_RE: OnceLock<Regex> = OnceLock::new();
    let re = LIB_FOLDER_RE.get_or_init(|| Regex::new(r"(?i)^lib/(.+?)/.+").unwrap());

    let mut frameworks = BTreeSet::new();
    for path in paths {
        let Some(caps) = re.captures(path) else {
            continue;
        };
        let folder = &caps[1];
        match TargetFramework::by_folder_name(folder) {
            Some(framework) => {
                frameworks.insert(framework);
            }
            None => warn!("Unknown target framework folder '{folder}' in '{path}'"),
        }
    }

    if frameworks.is_empty() {
        return TargetFramework::all();
    }
    frameworks
}
