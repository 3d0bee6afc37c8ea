//! RB-001: Recipe format versions and the construct gate table.
//!
//! Every instruction and substitution token has a minimum format version.
//! The parser and the substitution engine both consult the tables here
//! instead of carrying their own version conditionals.

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

const FRACTION_DIGITS: usize = 9;
const FRACTION_SCALE: u32 = 1_000_000_000;

/// A two-part recipe format number such as `0.4`.
///
/// The fractional part is stored scaled to nine decimal digits so that
/// `0.10` and `0.1` compare equal, the way a float would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormatVersion {
    major: u32,
    fraction: u32,
}

pub const V0_1: FormatVersion = FormatVersion::from_tenths(1);
pub const V0_2: FormatVersion = FormatVersion::from_tenths(2);
pub const V0_3: FormatVersion = FormatVersion::from_tenths(3);
pub const V0_4: FormatVersion = FormatVersion::from_tenths(4);

/// Newest format this crate understands.
pub const NEWEST_FORMAT: FormatVersion = V0_4;

impl FormatVersion {
    const fn from_tenths(tenths: u32) -> Self {
        Self {
            major: 0,
            fraction: tenths * (FRACTION_SCALE / 10),
        }
    }

    /// Build a version from its integer digits and fractional digits.
    /// Returns None if either part is not a plain digit run.
    pub fn from_parts(major: &str, fraction: &str) -> Option<Self> {
        if major.is_empty() || !major.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let major = major.parse().ok()?;
        let trimmed = fraction.trim_end_matches('0');
        if trimmed.len() > FRACTION_DIGITS {
            return None;
        }
        let padded = format!("{:0<width$}", trimmed, width = FRACTION_DIGITS);
        let fraction = padded.parse().ok()?;
        Some(Self { major, fraction })
    }

    /// Parse `"0.4"` / `"1"` style text.
    pub fn parse(text: &str) -> Option<Self> {
        match text.split_once('.') {
            Some((major, fraction)) if !fraction.is_empty() => Self::from_parts(major, fraction),
            Some(_) => None,
            None => Self::from_parts(text, ""),
        }
    }

    /// False if this version is newer than anything we can parse.
    pub fn is_supported(&self) -> bool {
        *self <= NEWEST_FORMAT
    }
}

impl Ord for FormatVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.fraction.cmp(&other.fraction))
    }
}

impl PartialOrd for FormatVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fraction == 0 {
            return write!(f, "{}", self.major);
        }
        let digits = format!("{:0width$}", self.fraction, width = FRACTION_DIGITS);
        write!(f, "{}.{}", self.major, digits.trim_end_matches('0'))
    }
}

impl Serialize for FormatVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The instruction keywords a recipe line can start with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstructionKind {
    Merge,
    Nest,
    NestPart,
    Run,
}

/// Minimum format per instruction, in the order error messages list them.
pub const INSTRUCTION_GATES: &[(InstructionKind, FormatVersion)] = &[
    (InstructionKind::Merge, V0_1),
    (InstructionKind::Nest, V0_1),
    (InstructionKind::NestPart, V0_3),
    (InstructionKind::Run, V0_2),
];

impl InstructionKind {
    /// The keyword as written in a recipe.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Nest => "nest",
            Self::NestPart => "nest-part",
            Self::Run => "run",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        INSTRUCTION_GATES
            .iter()
            .map(|(kind, _)| *kind)
            .find(|kind| kind.keyword() == word)
    }

    /// Lowest recipe format that accepts this instruction.
    pub fn minimum_format(self) -> FormatVersion {
        INSTRUCTION_GATES
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, version)| *version)
            .unwrap_or(NEWEST_FORMAT)
    }

    /// Whether more-indented lines may follow this instruction.
    pub fn opens_scope(self) -> bool {
        matches!(self, Self::Nest | Self::NestPart)
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Instructions legal at `format`, in table order.
pub fn instructions_at(format: &FormatVersion) -> Vec<InstructionKind> {
    INSTRUCTION_GATES
        .iter()
        .filter(|(_, minimum)| minimum <= format)
        .map(|(kind, _)| *kind)
        .collect()
}

/// Render a keyword set as `'a', 'b' or 'c'`.
pub fn describe_options(kinds: &[InstructionKind]) -> String {
    let quoted: Vec<String> = kinds.iter().map(|k| format!("'{}'", k.keyword())).collect();
    match quoted.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} or {}", rest.join(", "), last),
    }
}

/// Placeholder tokens understood inside a `deb-version` template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Token {
    Time,
    Date,
    Revno,
    DebUpstream,
    DebUpstreamBase,
    DebVersion,
}

/// Minimum format per substitution token.
pub const TOKEN_GATES: &[(Token, FormatVersion)] = &[
    (Token::Time, V0_1),
    (Token::Date, V0_4),
    (Token::Revno, V0_1),
    (Token::DebUpstream, V0_1),
    (Token::DebUpstreamBase, V0_4),
    (Token::DebVersion, V0_4),
];

impl Token {
    pub fn name(self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Date => "date",
            Self::Revno => "revno",
            Self::DebUpstream => "debupstream",
            Self::DebUpstreamBase => "debupstream-base",
            Self::DebVersion => "debversion",
        }
    }

    /// Tokens that take an optional `:<branch>` suffix.
    pub fn is_branch_scoped(self) -> bool {
        matches!(self, Self::Revno) || self.is_packaging()
    }

    /// Tokens filled from packaging metadata rather than the VCS.
    pub fn is_packaging(self) -> bool {
        matches!(self, Self::DebUpstream | Self::DebUpstreamBase | Self::DebVersion)
    }

    /// The literal placeholder, e.g. `{revno}` or `{revno:packaging}`.
    pub fn placeholder(self, branch: Option<&str>) -> String {
        match branch {
            Some(name) if self.is_branch_scoped() => format!("{{{}:{}}}", self.name(), name),
            _ => format!("{{{}}}", self.name()),
        }
    }

    pub fn available_in(self, format: &FormatVersion) -> bool {
        TOKEN_GATES
            .iter()
            .any(|(token, minimum)| *token == self && minimum <= format)
    }
}

/// Every placeholder a template may use at `format`, given the plan's
/// branch names.
pub fn available_placeholders<'a>(
    format: &FormatVersion,
    branch_names: impl IntoIterator<Item = &'a str> + Clone,
) -> Vec<String> {
    let mut out = Vec::new();
    for (token, minimum) in TOKEN_GATES {
        if minimum > format {
            continue;
        }
        out.push(token.placeholder(None));
        if token.is_branch_scoped() {
            for name in branch_names.clone() {
                out.push(token.placeholder(Some(name)));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rb001_parse_and_display() {
        assert_eq!(FormatVersion::parse("0.4").unwrap(), V0_4);
        assert_eq!(FormatVersion::parse("0.40").unwrap(), V0_4);
        assert_eq!(FormatVersion::parse("0.4").unwrap().to_string(), "0.4");
        assert_eq!(FormatVersion::parse("1").unwrap().to_string(), "1");
        assert!(FormatVersion::parse("1.").is_none());
        assert!(FormatVersion::parse("foo").is_none());
    }

    #[test]
    fn test_rb001_ordering_is_decimal() {
        let v035 = FormatVersion::parse("0.35").unwrap();
        assert!(V0_3 < v035);
        assert!(v035 < V0_4);
        assert!(V0_4 < FormatVersion::parse("1").unwrap());
        assert!(!FormatVersion::parse("0.5").unwrap().is_supported());
        assert!(V0_1.is_supported());
    }

    #[test]
    fn test_rb001_instruction_gates() {
        assert_eq!(
            instructions_at(&V0_1),
            vec![InstructionKind::Merge, InstructionKind::Nest]
        );
        assert_eq!(instructions_at(&V0_2).len(), 3);
        assert_eq!(instructions_at(&V0_4).len(), 4);
        assert_eq!(InstructionKind::Run.minimum_format(), V0_2);
        assert_eq!(InstructionKind::from_keyword("nest-part"), Some(InstructionKind::NestPart));
        assert_eq!(InstructionKind::from_keyword("pull"), None);
    }

    #[test]
    fn test_rb001_describe_options() {
        assert_eq!(describe_options(&instructions_at(&V0_1)), "'merge' or 'nest'");
        assert_eq!(
            describe_options(&instructions_at(&V0_4)),
            "'merge', 'nest', 'nest-part' or 'run'"
        );
    }

    #[test]
    fn test_rb001_token_gates() {
        assert!(Token::Time.available_in(&V0_1));
        assert!(!Token::Date.available_in(&V0_3));
        assert!(Token::Date.available_in(&V0_4));
        assert_eq!(Token::Revno.placeholder(Some("pkg")), "{revno:pkg}");
        assert_eq!(Token::Time.placeholder(Some("pkg")), "{time}");
        assert_eq!(Token::DebUpstreamBase.placeholder(Some("pkg")), "{debupstream-base:pkg}");
    }

    #[test]
    fn test_rb001_available_placeholders() {
        let names = ["pkg"];
        let tokens = available_placeholders(&V0_1, names.iter().copied());
        assert_eq!(
            tokens,
            vec!["{time}", "{revno}", "{revno:pkg}", "{debupstream}", "{debupstream:pkg}"]
        );

        let tokens = available_placeholders(&V0_4, names.iter().copied());
        assert!(tokens.contains(&"{debversion:pkg}".to_string()));
        assert!(tokens.contains(&"{debupstream-base:pkg}".to_string()));
        assert!(!tokens.contains(&"{time:pkg}".to_string()));
    }
}
